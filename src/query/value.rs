//! Best-effort structured values: a query-string leaf is either a JSON
//! fragment or an opaque string, decided once here and tagged.

use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum LooseValue {
    Structured(Value),
    Raw(String),
}

/// Attempt to read `s` as a JSON fragment (object/array/number/boolean/
/// null/string literal); keep the raw string when it is not one.
pub fn loose(s: &str) -> LooseValue {
    match serde_json::from_str::<Value>(s) {
        Ok(value) => LooseValue::Structured(value),
        Err(_) => LooseValue::Raw(s.to_string()),
    }
}

/// As [`loose`], collapsed to a `Value`: raw strings become JSON strings.
pub fn loose_json(s: &str) -> Value {
    match loose(s) {
        LooseValue::Structured(value) => value,
        LooseValue::Raw(raw) => Value::String(raw),
    }
}
