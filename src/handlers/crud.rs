//! CRUD verb handlers. Routes are registered as wildcard segment patterns;
//! each handler resolves the segment against the registry (plural form for
//! collection verbs, singular for item verbs) and sequences
//! parse → validate → storage call → response shaping. Failures classify
//! through the error module before leaving.

use crate::error::AppError;
use crate::model::{ModelDescriptor, SegmentForm};
use crate::query::{loose_json, ParsedQuery, RawParams};
use crate::response::{serialize_many, serialize_one, serialize_one_or_many};
use crate::service::{Method, RequestValidator};
use crate::state::AppState;
use axum::{
    extract::{Path, RawQuery, State},
    Json,
};
use futures::future::try_join_all;
use serde_json::Value;

fn params_of(query: Option<String>) -> RawParams {
    RawParams::parse(query.as_deref().unwrap_or(""))
}

/// GET `/{plural}` → list; GET `/{singular}` → get without id.
pub async fn get_collection(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    let (model, form) = super::resolve_segment(&state, &segment)?;
    let params = params_of(query);
    match form {
        SegmentForm::Plural => list(&state, &model, &params).await,
        SegmentForm::Singular => get(&state, &model, None, &params).await,
    }
}

/// POST `/{singular}` → create.
pub async fn post_collection(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let (model, form) = super::resolve_segment(&state, &segment)?;
    match form {
        SegmentForm::Singular => create(&state, &model, body).await,
        SegmentForm::Plural => Err(AppError::NotFound(segment)),
    }
}

/// DELETE `/{plural}` → destroyAll; DELETE `/{singular}` → destroy by
/// parsed filters.
pub async fn delete_collection(
    State(state): State<AppState>,
    Path(segment): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    let (model, form) = super::resolve_segment(&state, &segment)?;
    let params = params_of(query);
    match form {
        SegmentForm::Plural => destroy_all(&state, &model, &params).await,
        SegmentForm::Singular => destroy(&state, &model, None, &params).await,
    }
}

/// GET `/{plural}/{scope}` → scoped list; GET `/{singular}/{id}` → get.
pub async fn get_item(
    State(state): State<AppState>,
    Path((segment, arg)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    let (model, form) = super::resolve_segment(&state, &segment)?;
    let params = params_of(query);
    match form {
        SegmentForm::Plural => scope(&state, &model, &arg, &params).await,
        SegmentForm::Singular => get(&state, &model, Some(arg.as_str()), &params).await,
    }
}

/// PUT `/{singular}/{id}` → update.
pub async fn put_item(
    State(state): State<AppState>,
    Path((segment, arg)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let (model, form) = super::resolve_segment(&state, &segment)?;
    match form {
        SegmentForm::Singular => update(&state, &model, &arg, body).await,
        SegmentForm::Plural => Err(AppError::NotFound(segment)),
    }
}

/// DELETE `/{plural}/{scope}` → destroyScope; DELETE `/{singular}/{id}` →
/// destroy by id.
pub async fn delete_item(
    State(state): State<AppState>,
    Path((segment, arg)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    let (model, form) = super::resolve_segment(&state, &segment)?;
    let params = params_of(query);
    match form {
        SegmentForm::Plural => destroy_scope(&state, &model, &arg, &params).await,
        SegmentForm::Singular => destroy(&state, &model, Some(arg.as_str()), &params).await,
    }
}

async fn list(
    state: &AppState,
    model: &ModelDescriptor,
    params: &RawParams,
) -> Result<Json<Value>, AppError> {
    let spec = super::spec_for(state, model, Method::List)?;
    RequestValidator::validate_query(params, &spec.query)?;
    let query = ParsedQuery::parse(params, Some(state.registry.as_ref()))?;

    tracing::debug!(model = %model.name, "list");
    let records = state.store.find_all(model, &query).await?;
    if records.is_empty() {
        return Err(AppError::NotFound("Nothing found.".into()));
    }
    Ok(Json(serialize_many(&records)))
}

async fn get(
    state: &AppState,
    model: &ModelDescriptor,
    id: Option<&str>,
    params: &RawParams,
) -> Result<Json<Value>, AppError> {
    let spec = super::spec_for(state, model, Method::Get)?;
    RequestValidator::validate_query(params, &spec.query)?;
    if let Some(id) = id {
        RequestValidator::validate_param("id", id, &spec.params)?;
    }
    let mut query = ParsedQuery::parse(params, Some(state.registry.as_ref()))?;
    if let Some(id) = id {
        query = query.with_filter(&model.primary_key, loose_json(id));
    }

    tracing::debug!(model = %model.name, id = ?id, "get");
    let record = state
        .store
        .find_one(model, &query)
        .await?
        .ok_or_else(|| AppError::NotFound(not_found_message(id)))?;
    Ok(Json(serialize_one(&record)))
}

async fn scope(
    state: &AppState,
    model: &ModelDescriptor,
    scope: &str,
    params: &RawParams,
) -> Result<Json<Value>, AppError> {
    let spec = super::spec_for(state, model, Method::Scope)?;
    RequestValidator::validate_query(params, &spec.query)?;
    if !model.has_scope(scope) {
        return Err(AppError::BadRequest("Invalid scope.".into()));
    }
    let query = ParsedQuery::parse(params, Some(state.registry.as_ref()))?;

    tracing::debug!(model = %model.name, scope = %scope, "scoped list");
    let records = state.store.find_all_scoped(model, scope, &query).await?;
    if records.is_empty() {
        return Err(AppError::NotFound("Nothing found.".into()));
    }
    Ok(Json(serialize_many(&records)))
}

async fn create(
    state: &AppState,
    model: &ModelDescriptor,
    body: Value,
) -> Result<Json<Value>, AppError> {
    let spec = super::spec_for(state, model, Method::Create)?;
    let body = super::body_to_map(body)?;
    RequestValidator::validate_payload(&body, &spec.payload)?;

    tracing::debug!(model = %model.name, "create");
    let record = state.store.create(model, &body).await?;
    Ok(Json(serialize_one(&record)))
}

async fn update(
    state: &AppState,
    model: &ModelDescriptor,
    id: &str,
    body: Value,
) -> Result<Json<Value>, AppError> {
    let spec = super::spec_for(state, model, Method::Update)?;
    RequestValidator::validate_param("id", id, &spec.params)?;
    let body = super::body_to_map(body)?;
    RequestValidator::validate_payload(&body, &spec.payload)?;

    let query = ParsedQuery::default().with_filter(&model.primary_key, loose_json(id));
    let record = state
        .store
        .find_one(model, &query)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{id} not found.")))?;

    tracing::debug!(model = %model.name, id = %id, "update");
    let updated = state.store.update(model, &record, &body).await?;
    Ok(Json(serialize_one(&updated)))
}

async fn destroy(
    state: &AppState,
    model: &ModelDescriptor,
    id: Option<&str>,
    params: &RawParams,
) -> Result<Json<Value>, AppError> {
    let spec = super::spec_for(state, model, Method::Destroy)?;
    RequestValidator::validate_query(params, &spec.query)?;
    let mut query = ParsedQuery::parse(params, Some(state.registry.as_ref()))?;
    if let Some(id) = id {
        query = query.with_filter(&model.primary_key, loose_json(id));
    }

    let records = state.store.find_all(model, &query).await?;
    if records.is_empty() {
        return Err(AppError::NotFound(not_found_message(id)));
    }

    tracing::debug!(model = %model.name, count = records.len(), "destroy");
    destroy_records(state, model, &records).await?;
    Ok(Json(serialize_one_or_many(&records)))
}

async fn destroy_all(
    state: &AppState,
    model: &ModelDescriptor,
    params: &RawParams,
) -> Result<Json<Value>, AppError> {
    let spec = super::spec_for(state, model, Method::DestroyAll)?;
    RequestValidator::validate_query(params, &spec.query)?;
    let query = ParsedQuery::parse(params, Some(state.registry.as_ref()))?;

    let records = state.store.find_all(model, &query).await?;
    if records.is_empty() {
        return Err(AppError::NotFound("Nothing found.".into()));
    }

    tracing::debug!(model = %model.name, count = records.len(), "destroy all");
    destroy_records(state, model, &records).await?;
    Ok(Json(serialize_one_or_many(&records)))
}

async fn destroy_scope(
    state: &AppState,
    model: &ModelDescriptor,
    scope: &str,
    params: &RawParams,
) -> Result<Json<Value>, AppError> {
    let spec = super::spec_for(state, model, Method::DestroyScope)?;
    RequestValidator::validate_query(params, &spec.query)?;
    if !model.has_scope(scope) {
        return Err(AppError::BadRequest("Invalid scope.".into()));
    }
    let query = ParsedQuery::parse(params, Some(state.registry.as_ref()))?;

    let records = state.store.find_all_scoped(model, scope, &query).await?;
    if records.is_empty() {
        return Err(AppError::NotFound("Nothing found.".into()));
    }

    tracing::debug!(model = %model.name, scope = %scope, count = records.len(), "destroy scope");
    destroy_records(state, model, &records).await?;
    Ok(Json(serialize_one_or_many(&records)))
}

/// Fire all deletions concurrently and await the full set. No ordering
/// between individual deletions, no partial-failure recovery: a failure
/// propagates and leaves whatever partial state the storage produced.
pub(crate) async fn destroy_records(
    state: &AppState,
    model: &ModelDescriptor,
    records: &[crate::store::Record],
) -> Result<(), AppError> {
    try_join_all(
        records
            .iter()
            .map(|record| state.store.destroy(model, record)),
    )
    .await?;
    Ok(())
}

fn not_found_message(id: Option<&str>) -> String {
    match id {
        Some(id) => format!("{id} not found."),
        None => "Nothing found.".into(),
    }
}
