//! HTTP handlers for the generated CRUD, association, and associate routes.

pub mod associate;
pub mod crud;
pub mod related;

use crate::error::AppError;
use crate::model::{ModelDescriptor, SegmentForm};
use crate::query::JsonMap;
use crate::service::{Method, RouteSpec};
use crate::state::AppState;
use serde_json::Value;
use std::sync::Arc;

/// Resolve a path segment to a registered model, or 404.
pub(crate) fn resolve_segment(
    state: &AppState,
    segment: &str,
) -> Result<(Arc<ModelDescriptor>, SegmentForm), AppError> {
    state
        .registry
        .resolve_segment(segment)
        .map(|(model, form)| (model.clone(), form))
        .ok_or_else(|| AppError::NotFound(segment.to_string()))
}

/// The pre-composed spec for a (model, method) pair. A missing entry means
/// the method is not permitted for the model, which presents as an
/// unregistered route.
pub(crate) fn spec_for(
    state: &AppState,
    model: &ModelDescriptor,
    method: Method,
) -> Result<Arc<RouteSpec>, AppError> {
    state
        .specs
        .get(&model.name, method)
        .cloned()
        .ok_or_else(|| AppError::NotFound(model.names.singular.clone()))
}

pub(crate) fn body_to_map(value: Value) -> Result<JsonMap, AppError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}
