//! GET `/associate/{aSingular}/{aid}/{bSingular}/{bid}`: link two existing
//! records through the owning side's association capability.

use crate::error::AppError;
use crate::model::{ModelDescriptor, SegmentForm};
use crate::query::{loose_json, ParsedQuery};
use crate::state::AppState;
use crate::store::Record;
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

pub async fn associate(
    State(state): State<AppState>,
    Path((a_segment, aid, b_segment, bid)): Path<(String, String, String, String)>,
) -> Result<Json<Value>, AppError> {
    let (a_model, a_form) = super::resolve_segment(&state, &a_segment)?;
    if a_form != SegmentForm::Singular {
        return Err(AppError::NotFound(a_segment));
    }
    let (assoc, _) = a_model
        .association_for(&b_segment)
        .ok_or_else(|| AppError::NotFound(b_segment.clone()))?;
    let b_model = state
        .registry
        .get(&assoc.target)
        .cloned()
        .ok_or_else(|| AppError::NotFound(assoc.target.clone()))?;

    let a_record = load_by_id(&state, &a_model, &aid).await?;
    let b_record = load_by_id(&state, &b_model, &bid).await?;

    let ops = state
        .store
        .association(&a_model, assoc)
        .ok_or_else(|| AppError::NotImplemented(format!("no accessor for `{}`", assoc.name)))?;
    // first verb in the capability's preference order ("add" before "set")
    let verb = *ops.attach_verbs().first().ok_or_else(|| {
        AppError::NotImplemented(format!("`{}` supports no attach verb", assoc.name))
    })?;

    tracing::debug!(a = %a_model.name, b = %b_model.name, ?verb, "associate");
    ops.attach(verb, &a_record, &b_record).await?;

    Ok(Json(Value::Array(vec![
        a_record.to_json(),
        b_record.to_json(),
    ])))
}

pub(crate) async fn load_by_id(
    state: &AppState,
    model: &ModelDescriptor,
    id: &str,
) -> Result<Record, AppError> {
    let query = ParsedQuery::default().with_filter(&model.primary_key, loose_json(id));
    state
        .store
        .find_one(model, &query)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{id} not found.")))
}
