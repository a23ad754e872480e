//! Route-spec composition and request validation.

pub mod spec;
pub mod validation;

pub use spec::{compose_for_method, Method, RouteSpec, SchemaRules, SpecIndex, OPERATOR_TOKENS};
pub use validation::{RequestValidator, ValueFormat, ValueRule};
