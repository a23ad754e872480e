//! The storage collaborator contract: the narrow interface the route
//! handlers consume. Engines implement [`ModelStore`] plus one
//! [`AssociationOps`] capability per declared association.

pub mod memory;

pub use memory::MemStore;

use crate::model::{AssociationDescriptor, ModelDescriptor};
use crate::query::{JsonMap, ParsedQuery};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// A stored entity instance: its model name plus column values.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub model: String,
    pub values: JsonMap,
}

impl Record {
    pub fn new(model: &str, values: JsonMap) -> Self {
        Record {
            model: model.to_string(),
            values,
        }
    }

    /// The primary-key value under the descriptor's key field.
    pub fn primary_key(&self, descriptor: &ModelDescriptor) -> Option<&Value> {
        self.values.get(&descriptor.primary_key)
    }

    /// The serialized form returned to clients.
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

/// Failures raised by a storage engine. [`crate::error::classify`] maps
/// every variant onto the HTTP-facing taxonomy.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A failure carrying the driver's original cause: vendor error code
    /// plus optional detail and hint text.
    #[error("{message}")]
    Backend {
        code: String,
        message: String,
        detail: Option<String>,
        hint: Option<String>,
    },
    #[error("validation: {0}")]
    Validation(String),
    #[error("unique constraint: {0}")]
    UniqueViolation(String),
    #[error("foreign key constraint: {0}")]
    ForeignKeyViolation(String),
    #[error("exclusion constraint: {0}")]
    ExclusionViolation(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("host unreachable: {0}")]
    HostUnreachable(String),
    #[error("connection: {0}")]
    Connection(String),
    #[error("{0}")]
    Other(String),
}

/// How an association attaches a target record to its owner. Engines list
/// the verbs they support in preference order; `Add` wins over `Set` when
/// both exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachVerb {
    Add,
    Set,
}

/// The relationship accessors and mutators an engine exposes for one
/// declared association.
#[async_trait]
pub trait AssociationOps: Send + Sync {
    /// Supported attach verbs, most preferred first.
    fn attach_verbs(&self) -> &[AttachVerb] {
        &[AttachVerb::Add, AttachVerb::Set]
    }

    async fn attach(
        &self,
        verb: AttachVerb,
        owner: &Record,
        target: &Record,
    ) -> Result<(), StoreError>;

    /// Related records of `owner`, optionally under a named scope, filtered
    /// by the parsed query.
    async fn fetch(
        &self,
        owner: &Record,
        scope: Option<&str>,
        query: &ParsedQuery,
    ) -> Result<Vec<Record>, StoreError>;

    /// Create a related record attached to `owner`.
    async fn create(&self, owner: &Record, payload: &JsonMap) -> Result<Record, StoreError>;
}

/// The storage engine contract.
#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn find_one(
        &self,
        model: &ModelDescriptor,
        query: &ParsedQuery,
    ) -> Result<Option<Record>, StoreError>;

    async fn find_all(
        &self,
        model: &ModelDescriptor,
        query: &ParsedQuery,
    ) -> Result<Vec<Record>, StoreError>;

    /// Apply the named scope's predicate before the parsed filters.
    async fn find_all_scoped(
        &self,
        model: &ModelDescriptor,
        scope: &str,
        query: &ParsedQuery,
    ) -> Result<Vec<Record>, StoreError>;

    async fn create(
        &self,
        model: &ModelDescriptor,
        payload: &JsonMap,
    ) -> Result<Record, StoreError>;

    /// Partial update: merge `payload` into the stored record.
    async fn update(
        &self,
        model: &ModelDescriptor,
        record: &Record,
        payload: &JsonMap,
    ) -> Result<Record, StoreError>;

    async fn destroy(&self, model: &ModelDescriptor, record: &Record) -> Result<(), StoreError>;

    /// The capability interface for one declared association, or `None`
    /// when the engine exposes no accessors for it.
    fn association(
        &self,
        model: &ModelDescriptor,
        association: &AssociationDescriptor,
    ) -> Option<Arc<dyn AssociationOps>>;

    /// Readiness probe; engines override when they have a connection to
    /// check.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
