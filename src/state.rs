//! Shared application state for all generated routes. Everything here is
//! immutable after registration and safe for concurrent reuse.

use crate::model::ModelRegistry;
use crate::service::SpecIndex;
use crate::store::ModelStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ModelStore>,
    pub registry: Arc<ModelRegistry>,
    /// Route validation specs, composed once per (model, method) pair.
    pub specs: Arc<SpecIndex>,
}
