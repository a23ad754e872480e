//! Query-to-filter translation: raw query-string parameters into a
//! structured where/include/order/pagination specification.

pub mod params;
pub mod parse;
pub mod value;

pub use params::{QueryValue, RawParams};
pub use parse::{parse_include, parse_limit_and_offset, parse_order, parse_where, PageBounds};
pub use value::{loose, loose_json, LooseValue};

use crate::error::AppError;
use crate::model::{ModelDescriptor, ModelRegistry};
use serde_json::Value;
use std::sync::Arc;

pub type JsonMap = serde_json::Map<String, Value>;

/// One resolved `include` entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Include {
    Model(Arc<ModelDescriptor>),
    /// A structured fragment whose `model` field resolved; the remaining
    /// keys (e.g. a nested where or scope) ride along untouched.
    Fragment {
        model: Arc<ModelDescriptor>,
        rest: JsonMap,
    },
}

impl Include {
    pub fn model(&self) -> &Arc<ModelDescriptor> {
        match self {
            Include::Model(model) => model,
            Include::Fragment { model, .. } => model,
        }
    }
}

/// One atom of a sort term: a column or direction name, a resolved model
/// reference, an opaque structured fragment, or a nested grouping.
#[derive(Clone, Debug, PartialEq)]
pub enum OrderAtom {
    Name(String),
    Model(Arc<ModelDescriptor>),
    Json(Value),
    Nested(Vec<OrderAtom>),
}

/// One sort term, e.g. `["name", "DESC"]`.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderTerm(pub Vec<OrderAtom>);

/// The structured result of translating one request's query parameters.
/// Request-scoped; never persisted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedQuery {
    pub where_clause: JsonMap,
    pub include: Vec<Include>,
    /// `None` when no ordering was requested, distinct from an explicit
    /// empty sequence.
    pub order: Option<Vec<OrderTerm>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl ParsedQuery {
    /// Derive the full query from normalized parameters. `models` is the
    /// registry collaborator; `None` means the request has no way to
    /// discover registered models and include/order resolution fails with
    /// `NotImplemented`.
    pub fn parse(params: &RawParams, models: Option<&ModelRegistry>) -> Result<Self, AppError> {
        let include = parse_include(params, models)?;
        let order = parse_order(params, models)?;
        let bounds = parse_limit_and_offset(params)?;
        Ok(ParsedQuery {
            where_clause: parse_where(params),
            include,
            order,
            limit: bounds.limit,
            offset: bounds.offset,
        })
    }

    /// Add (or overwrite) one where filter, e.g. a path-supplied id.
    pub fn with_filter(mut self, key: &str, value: Value) -> Self {
        self.where_clause.insert(key.to_string(), value);
        self
    }
}
