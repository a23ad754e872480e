//! Association sub-routes: one-to-one and one-to-many CRUD under
//! `/{aSingular}/{aid}/{bSingular|bPlural}[/{arg}]`, plus the scope-scope
//! listing under `/{aPlural}/{scopeA}/{bPlural}/{scopeB}`.
//!
//! These routes carry the caller's base rules only (no composed spec);
//! query validation is limited to scope-name checks.

use crate::error::AppError;
use crate::model::{AssociationDescriptor, ModelDescriptor, SegmentForm};
use crate::query::{loose_json, Include, JsonMap, ParsedQuery, RawParams};
use crate::response::{serialize_many, serialize_one};
use crate::state::AppState;
use crate::store::{AssociationOps, Record};
use axum::{
    extract::{Path, RawQuery, State},
    Json,
};
use futures::future::try_join_all;
use serde_json::Value;
use std::sync::Arc;

struct RelatedRoute {
    owner_model: Arc<ModelDescriptor>,
    owner: Record,
    assoc: AssociationDescriptor,
    target: Arc<ModelDescriptor>,
    form: SegmentForm,
    ops: Arc<dyn AssociationOps>,
}

/// Resolve `/{aSingular}/{aid}/{bSegment}` down to the owner record and the
/// association capability.
async fn resolve_related(
    state: &AppState,
    a_segment: &str,
    aid: &str,
    b_segment: &str,
) -> Result<RelatedRoute, AppError> {
    let (owner_model, a_form) = super::resolve_segment(state, a_segment)?;
    if a_form != SegmentForm::Singular {
        return Err(AppError::NotFound(a_segment.to_string()));
    }
    let (assoc, form) = owner_model
        .association_for(b_segment)
        .map(|(assoc, form)| (assoc.clone(), form))
        .ok_or_else(|| AppError::NotFound(b_segment.to_string()))?;
    let target = state
        .registry
        .get(&assoc.target)
        .cloned()
        .ok_or_else(|| AppError::NotFound(assoc.target.clone()))?;
    let ops = state
        .store
        .association(&owner_model, &assoc)
        .ok_or_else(|| AppError::NotImplemented(format!("no accessor for `{}`", assoc.name)))?;
    let owner = super::associate::load_by_id(state, &owner_model, aid).await?;
    Ok(RelatedRoute {
        owner_model,
        owner,
        assoc,
        target,
        form,
        ops,
    })
}

fn params_of(query: Option<String>) -> RawParams {
    RawParams::parse(query.as_deref().unwrap_or(""))
}

/// GET `/{aSingular}/{aid}/{bSingular}` → the single related record;
/// GET `/{aSingular}/{aid}/{bPlural}` → the related list (possibly empty).
pub async fn get_related(
    State(state): State<AppState>,
    Path((a_segment, aid, b_segment)): Path<(String, String, String)>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    let route = resolve_related(&state, &a_segment, &aid, &b_segment).await?;
    let params = params_of(query);
    let mut parsed = ParsedQuery::parse(&params, Some(state.registry.as_ref()))?;

    tracing::debug!(owner = %route.owner_model.name, assoc = %route.assoc.name, "related fetch");
    match route.form {
        SegmentForm::Singular => {
            parsed.limit = Some(1);
            let records = route.ops.fetch(&route.owner, None, &parsed).await?;
            let record = records
                .first()
                .ok_or_else(|| AppError::NotFound("Nothing found.".into()))?;
            Ok(Json(serialize_one(record)))
        }
        SegmentForm::Plural => {
            let records = route.ops.fetch(&route.owner, None, &parsed).await?;
            Ok(Json(serialize_many(&records)))
        }
    }
}

/// POST `/{aSingular}/{aid}/{bSingular}` → create the related record.
pub async fn post_related(
    State(state): State<AppState>,
    Path((a_segment, aid, b_segment)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let route = resolve_related(&state, &a_segment, &aid, &b_segment).await?;
    if route.form != SegmentForm::Singular {
        return Err(AppError::NotFound(b_segment));
    }
    let body = super::body_to_map(body)?;

    tracing::debug!(owner = %route.owner_model.name, assoc = %route.assoc.name, "related create");
    let record = route.ops.create(&route.owner, &body).await?;
    Ok(Json(serialize_one(&record)))
}

/// PUT `/{aSingular}/{aid}/{bPlural}` → partial-update every matched
/// related record.
pub async fn put_related(
    State(state): State<AppState>,
    Path((a_segment, aid, b_segment)): Path<(String, String, String)>,
    RawQuery(query): RawQuery,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let route = resolve_related(&state, &a_segment, &aid, &b_segment).await?;
    if route.form != SegmentForm::Plural {
        return Err(AppError::NotFound(b_segment));
    }
    let body = super::body_to_map(body)?;
    let parsed = ParsedQuery::parse(&params_of(query), Some(state.registry.as_ref()))?;

    let records = route.ops.fetch(&route.owner, None, &parsed).await?;
    tracing::debug!(owner = %route.owner_model.name, count = records.len(), "related update");
    let updated = update_records(&state, &route.target, &records, &body).await?;
    Ok(Json(serialize_many(&updated)))
}

/// DELETE `/{aSingular}/{aid}/{bPlural}` → destroy every matched related
/// record.
pub async fn delete_related(
    State(state): State<AppState>,
    Path((a_segment, aid, b_segment)): Path<(String, String, String)>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    let route = resolve_related(&state, &a_segment, &aid, &b_segment).await?;
    if route.form != SegmentForm::Plural {
        return Err(AppError::NotFound(b_segment));
    }
    let parsed = ParsedQuery::parse(&params_of(query), Some(state.registry.as_ref()))?;

    let records = route.ops.fetch(&route.owner, None, &parsed).await?;
    tracing::debug!(owner = %route.owner_model.name, count = records.len(), "related destroy");
    super::crud::destroy_records(&state, &route.target, &records).await?;
    Ok(Json(serialize_many(&records)))
}

/// GET on four segments: `/{aPlural}/{scopeA}/{bPlural}/{scopeB}` when the
/// head is plural (scope-scope listing); otherwise
/// `/{aSingular}/{aid}/{bSingular}/{bid}` (related record by id) or
/// `/{aSingular}/{aid}/{bPlural}/{scope}` (scoped related list).
pub async fn get_related_item(
    State(state): State<AppState>,
    Path((a_segment, a_arg, b_segment, b_arg)): Path<(String, String, String, String)>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    let (a_model, a_form) = super::resolve_segment(&state, &a_segment)?;
    if a_form == SegmentForm::Plural {
        return scope_scope(&state, &a_model, &a_arg, &b_segment, &b_arg, query).await;
    }

    let route = resolve_related(&state, &a_segment, &a_arg, &b_segment).await?;
    let mut parsed = ParsedQuery::parse(&params_of(query), Some(state.registry.as_ref()))?;
    match route.form {
        SegmentForm::Singular => {
            parsed = parsed.with_filter(&route.target.primary_key, loose_json(&b_arg));
            parsed.limit = Some(1);
            let records = route.ops.fetch(&route.owner, None, &parsed).await?;
            let record = records
                .first()
                .ok_or_else(|| AppError::NotFound(format!("{b_arg} not found.")))?;
            Ok(Json(serialize_one(record)))
        }
        SegmentForm::Plural => {
            if !route.target.has_scope(&b_arg) {
                return Err(AppError::BadRequest("Invalid scope.".into()));
            }
            let records = route
                .ops
                .fetch(&route.owner, Some(b_arg.as_str()), &parsed)
                .await?;
            Ok(Json(serialize_many(&records)))
        }
    }
}

/// PUT `/{aSingular}/{aid}/{bSingular}/{bid}` → update the related record.
pub async fn put_related_item(
    State(state): State<AppState>,
    Path((a_segment, aid, b_segment, bid)): Path<(String, String, String, String)>,
    RawQuery(query): RawQuery,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let route = resolve_related(&state, &a_segment, &aid, &b_segment).await?;
    if route.form != SegmentForm::Singular {
        return Err(AppError::NotFound(b_segment));
    }
    let body = super::body_to_map(body)?;
    let mut parsed = ParsedQuery::parse(&params_of(query), Some(state.registry.as_ref()))?;
    parsed = parsed.with_filter(&route.target.primary_key, loose_json(&bid));
    parsed.limit = Some(1);

    let records = route.ops.fetch(&route.owner, None, &parsed).await?;
    let record = records
        .first()
        .ok_or_else(|| AppError::NotFound(format!("{bid} not found.")))?;
    let updated = state.store.update(&route.target, record, &body).await?;
    Ok(Json(serialize_one(&updated)))
}

/// DELETE on four segments: related record by id (singular) or scoped
/// related destroy (plural).
pub async fn delete_related_item(
    State(state): State<AppState>,
    Path((a_segment, aid, b_segment, b_arg)): Path<(String, String, String, String)>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    let route = resolve_related(&state, &a_segment, &aid, &b_segment).await?;
    let mut parsed = ParsedQuery::parse(&params_of(query), Some(state.registry.as_ref()))?;
    match route.form {
        SegmentForm::Singular => {
            parsed = parsed.with_filter(&route.target.primary_key, loose_json(&b_arg));
            parsed.limit = Some(1);
            let records = route.ops.fetch(&route.owner, None, &parsed).await?;
            let record = records
                .first()
                .ok_or_else(|| AppError::NotFound(format!("{b_arg} not found.")))?;
            state.store.destroy(&route.target, record).await?;
            Ok(Json(serialize_one(record)))
        }
        SegmentForm::Plural => {
            if !route.target.has_scope(&b_arg) {
                return Err(AppError::BadRequest("Invalid scope.".into()));
            }
            let records = route
                .ops
                .fetch(&route.owner, Some(b_arg.as_str()), &parsed)
                .await?;
            super::crud::destroy_records(&state, &route.target, &records).await?;
            Ok(Json(serialize_many(&records)))
        }
    }
}

/// `/{aPlural}/{scopeA}/{bPlural}/{scopeB}`: model B under scopeB, with an
/// include fragment referencing model A under scopeA.
async fn scope_scope(
    state: &AppState,
    a_model: &Arc<ModelDescriptor>,
    scope_a: &str,
    b_segment: &str,
    scope_b: &str,
    query: Option<String>,
) -> Result<Json<Value>, AppError> {
    let (b_model, b_form) = super::resolve_segment(state, b_segment)?;
    if b_form != SegmentForm::Plural {
        return Err(AppError::NotFound(b_segment.to_string()));
    }
    if !a_model.has_scope(scope_a) || !b_model.has_scope(scope_b) {
        return Err(AppError::BadRequest("Invalid scope.".into()));
    }

    let mut parsed = ParsedQuery::parse(&params_of(query), Some(state.registry.as_ref()))?;
    let mut rest = JsonMap::new();
    rest.insert("scope".into(), Value::String(scope_a.to_string()));
    parsed.include.push(Include::Fragment {
        model: a_model.clone(),
        rest,
    });

    tracing::debug!(a = %a_model.name, b = %b_model.name, "scope-scope list");
    let records = state.store.find_all_scoped(&b_model, scope_b, &parsed).await?;
    Ok(Json(serialize_many(&records)))
}

async fn update_records(
    state: &AppState,
    target: &ModelDescriptor,
    records: &[Record],
    body: &JsonMap,
) -> Result<Vec<Record>, AppError> {
    let updated = try_join_all(
        records
            .iter()
            .map(|record| state.store.update(target, record, body)),
    )
    .await?;
    Ok(updated)
}
