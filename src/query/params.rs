//! Query-string normalization: raw `key=value` pairs into per-key values,
//! honoring the bracket conventions (`k[]`, `k[0]`, `k[0][1]`, `k[name]`)
//! and repeated plain keys.
//!
//! Duplicate-key policy: repeated plain keys accumulate into a list in
//! arrival order; a repeated bracketed index overwrites (last write wins).

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use url::form_urlencoded;

/// A normalized query-string value.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryValue {
    Scalar(String),
    List(Vec<QueryValue>),
    Map(BTreeMap<String, QueryValue>),
}

impl QueryValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            QueryValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to JSON, applying best-effort structured parsing at scalar
    /// leaves ([`crate::query::value::loose_json`]).
    pub fn to_json_loose(&self) -> Value {
        match self {
            QueryValue::Scalar(s) => crate::query::value::loose_json(s),
            QueryValue::List(items) => {
                Value::Array(items.iter().map(QueryValue::to_json_loose).collect())
            }
            QueryValue::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json_loose()))
                    .collect(),
            ),
        }
    }
}

/// The normalized parameters of one request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawParams {
    entries: HashMap<String, QueryValue>,
}

impl RawParams {
    /// Parse a raw query string (without the leading `?`).
    pub fn parse(query: &str) -> Self {
        let mut slots: HashMap<String, Slot> = HashMap::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let (name, path) = split_key(&key);
            if name.is_empty() {
                continue;
            }
            let slot = slots.entry(name.to_string()).or_insert(Slot::Empty);
            insert(slot, &path, value.into_owned());
        }
        let entries = slots
            .into_iter()
            .filter_map(|(k, slot)| slot.finalize().map(|v| (k, v)))
            .collect();
        RawParams { entries }
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &QueryValue)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One step of a bracketed key path.
#[derive(Debug)]
enum PathSeg {
    /// `k[]`: append.
    Append,
    /// `k[2]`: positional.
    Index(usize),
    /// `k[model]`: named.
    Name(String),
}

fn split_key(key: &str) -> (&str, Vec<PathSeg>) {
    let Some(open) = key.find('[') else {
        return (key, Vec::new());
    };
    let name = &key[..open];
    let mut path = Vec::new();
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            // unbalanced bracket: treat the remainder as a named segment
            path.push(PathSeg::Name(stripped.to_string()));
            break;
        };
        let seg = &stripped[..close];
        if seg.is_empty() {
            path.push(PathSeg::Append);
        } else if let Ok(index) = seg.parse::<usize>() {
            path.push(PathSeg::Index(index));
        } else {
            path.push(PathSeg::Name(seg.to_string()));
        }
        rest = &stripped[close + 1..];
    }
    (name, path)
}

/// Build-time shape of a key's value, before finalization.
enum Slot {
    Empty,
    Scalar(String),
    Seq(Vec<Slot>),
    Indexed(BTreeMap<usize, Slot>),
    Named(BTreeMap<String, Slot>),
}

fn insert(slot: &mut Slot, path: &[PathSeg], value: String) {
    match path.first() {
        None => match slot {
            Slot::Empty => *slot = Slot::Scalar(value),
            // repeated plain key: promote to a list, keep arrival order
            Slot::Scalar(prev) => {
                let prev = std::mem::take(prev);
                *slot = Slot::Seq(vec![Slot::Scalar(prev), Slot::Scalar(value)]);
            }
            Slot::Seq(items) => items.push(Slot::Scalar(value)),
            Slot::Indexed(_) | Slot::Named(_) => {
                // plain write over a bracketed structure: drop the scalar
            }
        },
        Some(PathSeg::Append) => {
            if !matches!(slot, Slot::Seq(_)) {
                *slot = Slot::Seq(match std::mem::replace(slot, Slot::Empty) {
                    Slot::Scalar(s) => vec![Slot::Scalar(s)],
                    _ => Vec::new(),
                });
            }
            if let Slot::Seq(items) = slot {
                let mut child = Slot::Empty;
                insert(&mut child, &path[1..], value);
                items.push(child);
            }
        }
        Some(PathSeg::Index(index)) => {
            if !matches!(slot, Slot::Indexed(_)) {
                *slot = Slot::Indexed(BTreeMap::new());
            }
            if let Slot::Indexed(entries) = slot {
                if path.len() == 1 {
                    // duplicate index: last write wins
                    let mut child = Slot::Empty;
                    insert(&mut child, &path[1..], value);
                    entries.insert(*index, child);
                } else {
                    let child = entries.entry(*index).or_insert(Slot::Empty);
                    insert(child, &path[1..], value);
                }
            }
        }
        Some(PathSeg::Name(name)) => {
            if !matches!(slot, Slot::Named(_)) {
                *slot = Slot::Named(BTreeMap::new());
            }
            if let Slot::Named(entries) = slot {
                let child = entries.entry(name.clone()).or_insert(Slot::Empty);
                insert(child, &path[1..], value);
            }
        }
    }
}

impl Slot {
    fn finalize(self) -> Option<QueryValue> {
        match self {
            Slot::Empty => None,
            Slot::Scalar(s) => Some(QueryValue::Scalar(s)),
            Slot::Seq(items) => Some(QueryValue::List(
                items.into_iter().filter_map(Slot::finalize).collect(),
            )),
            Slot::Indexed(entries) => Some(QueryValue::List(
                entries
                    .into_values()
                    .filter_map(Slot::finalize)
                    .collect(),
            )),
            Slot::Named(entries) => Some(QueryValue::Map(
                entries
                    .into_iter()
                    .filter_map(|(k, v)| v.finalize().map(|v| (k, v)))
                    .collect(),
            )),
        }
    }
}
