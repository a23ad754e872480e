//! Crudkit: auto-generated RESTful CRUD routes over runtime-declared data
//! models, with query-string-to-filter translation.

pub mod error;
pub mod handlers;
pub mod model;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;

pub use error::{classify, AppError, ConfigError};
pub use model::{
    resolve_registry, AssociationConfig, AssociationKindConfig, MethodAccess, ModelConfig,
    ModelDescriptor, ModelRegistry, Permissions,
};
pub use query::{ParsedQuery, RawParams};
pub use routes::{build_state, common_routes, crud_routes, CrudConfig};
pub use service::{
    compose_for_method, Method, RequestValidator, RouteSpec, SchemaRules, SpecIndex, ValueRule,
};
pub use state::AppState;
pub use store::{AssociationOps, AttachVerb, MemStore, ModelStore, Record, StoreError};
