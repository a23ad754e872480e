//! The four parse operations: where, include, order, limit/offset.

use crate::error::AppError;
use crate::model::ModelRegistry;
use crate::query::params::{QueryValue, RawParams};
use crate::query::value::{loose, loose_json, LooseValue};
use crate::query::{Include, JsonMap, OrderAtom, OrderTerm};
use serde_json::Value;

/// Keys consumed by the other parse operations, never where filters.
const RESERVED_KEYS: [&str; 4] = ["include", "order", "limit", "offset"];

/// Everything that is not a reserved key becomes a filter. Scalar values go
/// through best-effort structured parsing; list and map values convert
/// structurally with loose leaves. Key names are not validated here; that
/// is the schema composer's concern, upstream of the handler.
pub fn parse_where(params: &RawParams) -> JsonMap {
    let mut where_clause = JsonMap::new();
    for (key, value) in params.iter() {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        where_clause.insert(key.clone(), value.to_json_loose());
    }
    where_clause
}

fn models_or_not_implemented(
    models: Option<&ModelRegistry>,
) -> Result<&ModelRegistry, AppError> {
    models.ok_or_else(|| {
        AppError::NotImplemented(
            "model registry is not reachable from this request; \
             register models before mounting crud routes"
                .into(),
        )
    })
}

/// Normalize the `include` parameter (absent, scalar, or list) into a
/// sequence of resolved entries. Scalar entries resolve by singular or
/// plural form; structured fragments carrying a `model` field resolve that
/// field in place; entries that resolve to nothing are dropped.
pub fn parse_include(
    params: &RawParams,
    models: Option<&ModelRegistry>,
) -> Result<Vec<Include>, AppError> {
    let models = models_or_not_implemented(models)?;

    let entries: Vec<&QueryValue> = match params.get("include") {
        None => Vec::new(),
        Some(QueryValue::List(items)) => items.iter().collect(),
        Some(single) => vec![single],
    };

    let mut include = Vec::new();
    for entry in entries {
        match entry {
            QueryValue::Scalar(name) => match loose(name) {
                LooseValue::Raw(name) => {
                    if let Some(model) = models.resolve(&name) {
                        include.push(Include::Model(model.clone()));
                    }
                }
                LooseValue::Structured(value) => {
                    if let Some(fragment) = resolve_fragment(&value, models) {
                        include.push(fragment);
                    }
                }
            },
            QueryValue::Map(_) => {
                if let Some(fragment) = resolve_fragment(&entry.to_json_loose(), models) {
                    include.push(fragment);
                }
            }
            QueryValue::List(_) => {}
        }
    }
    Ok(include)
}

/// `{"model": "X", ...}` with a resolvable model name; the remaining keys
/// ride along unchanged.
fn resolve_fragment(value: &Value, models: &ModelRegistry) -> Option<Include> {
    let object = value.as_object()?;
    let name = object.get("model")?.as_str()?;
    let model = models.resolve(name)?.clone();
    let rest: JsonMap = object
        .iter()
        .filter(|(k, _)| k.as_str() != "model")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if rest.is_empty() {
        Some(Include::Model(model))
    } else {
        Some(Include::Fragment { model, rest })
    }
}

/// Parse the `order` parameter. Absent input yields `None`, never an empty
/// sequence. A single string splits on whitespace into one term; a flat
/// array collapses into one term; an array containing arrays maps
/// element-wise to terms, recursing losslessly.
pub fn parse_order(
    params: &RawParams,
    models: Option<&ModelRegistry>,
) -> Result<Option<Vec<OrderTerm>>, AppError> {
    let Some(order) = params.get("order") else {
        return Ok(None);
    };
    let models = models_or_not_implemented(models)?;

    let terms = match order {
        QueryValue::Scalar(s) => {
            vec![OrderTerm(
                s.split_whitespace()
                    .map(|part| OrderAtom::Name(part.to_string()))
                    .collect(),
            )]
        }
        QueryValue::List(items) => {
            let has_nested = items.iter().any(|item| matches!(item, QueryValue::List(_)));
            if has_nested {
                items
                    .iter()
                    .map(|item| match parse_order_atom(item, models) {
                        OrderAtom::Nested(atoms) => OrderTerm(atoms),
                        atom => OrderTerm(vec![atom]),
                    })
                    .collect()
            } else {
                vec![OrderTerm(
                    items
                        .iter()
                        .map(|item| parse_order_atom(item, models))
                        .collect(),
                )]
            }
        }
        QueryValue::Map(_) => {
            vec![OrderTerm(vec![parse_order_atom(order, models)])]
        }
    };
    Ok(Some(terms))
}

fn parse_order_atom(value: &QueryValue, models: &ModelRegistry) -> OrderAtom {
    match value {
        QueryValue::List(items) => OrderAtom::Nested(
            items
                .iter()
                .map(|item| parse_order_atom(item, models))
                .collect(),
        ),
        QueryValue::Map(_) => structured_order_atom(value.to_json_loose(), models),
        QueryValue::Scalar(s) => match loose(s) {
            LooseValue::Raw(name) => OrderAtom::Name(name),
            LooseValue::Structured(parsed) => structured_order_atom(parsed, models),
        },
    }
}

/// A structured order leaf: `{"model": "X"}` resolves against the registry
/// in place; anything else passes through verbatim for the storage layer to
/// accept or reject.
fn structured_order_atom(parsed: Value, models: &ModelRegistry) -> OrderAtom {
    if let Some(name) = parsed.get("model").and_then(Value::as_str) {
        if let Some(model) = models.resolve(name) {
            return OrderAtom::Model(model.clone());
        }
    }
    OrderAtom::Json(parsed)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageBounds {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Read `limit`/`offset` when present and coerce to non-negative integers.
/// Absent keys stay absent so the storage layer can distinguish "no limit
/// requested" from "limit of zero". Present-but-non-numeric values are
/// malformed structural input.
pub fn parse_limit_and_offset(params: &RawParams) -> Result<PageBounds, AppError> {
    let mut bounds = PageBounds::default();
    bounds.limit = numeric_param(params, "limit")?;
    bounds.offset = numeric_param(params, "offset")?;
    Ok(bounds)
}

fn numeric_param(params: &RawParams, key: &str) -> Result<Option<u64>, AppError> {
    let Some(value) = params.get(key) else {
        return Ok(None);
    };
    value
        .as_scalar()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Some)
        .ok_or_else(|| AppError::BadRequest(format!("`{key}` must be a non-negative integer")))
}
