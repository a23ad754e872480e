//! Route registration: wildcard segment patterns dispatched against the
//! model registry, plus the static associate head. Spec composition happens
//! here, once, before the router exists.

use crate::error::ConfigError;
use crate::handlers::{associate, crud, related};
use crate::model::{ModelRegistry, Permissions};
use crate::service::{RouteSpec, SpecIndex};
use crate::state::AppState;
use crate::store::ModelStore;
use axum::{routing::get, Router};
use std::collections::HashMap;
use std::sync::Arc;

/// Registration options: the permission allow-list and caller-supplied
/// validation rules merged into every composed spec.
#[derive(Clone, Debug, Default)]
pub struct CrudConfig {
    pub permissions: Permissions,
    /// Base rules every method spec starts from.
    pub base: RouteSpec,
    /// Per-model replacements for `base`.
    pub model_overrides: HashMap<String, RouteSpec>,
}

/// Build the shared state: validates permissions and composes every route
/// spec, failing fast on configuration errors.
pub fn build_state(
    registry: Arc<ModelRegistry>,
    store: Arc<dyn ModelStore>,
    config: &CrudConfig,
) -> Result<AppState, ConfigError> {
    let specs = SpecIndex::build(
        &registry,
        &config.permissions,
        &config.base,
        &config.model_overrides,
    )?;
    tracing::info!(
        models = registry.len(),
        specs = specs.len(),
        "registered crud routes"
    );
    Ok(AppState {
        store,
        registry,
        specs: Arc::new(specs),
    })
}

/// The generated HTTP surface. Nest under a prefix to mount, e.g.
/// `Router::new().nest("/api/v1", crud_routes(state))`.
pub fn crud_routes(state: AppState) -> Router {
    Router::new()
        .route("/associate/:a/:b/:c/:d", get(associate::associate))
        .route(
            "/:a",
            get(crud::get_collection)
                .post(crud::post_collection)
                .delete(crud::delete_collection),
        )
        .route(
            "/:a/:b",
            get(crud::get_item)
                .put(crud::put_item)
                .delete(crud::delete_item),
        )
        .route(
            "/:a/:b/:c",
            get(related::get_related)
                .post(related::post_related)
                .put(related::put_related)
                .delete(related::delete_related),
        )
        .route(
            "/:a/:b/:c/:d",
            get(related::get_related_item)
                .put(related::put_related_item)
                .delete(related::delete_related_item),
        )
        .with_state(state)
}
