//! Storage failures surfacing through the full router: every kind maps to
//! its HTTP status and nothing leaks through unclassified.

use async_trait::async_trait;
use axum::http::StatusCode;
use crudkit::{
    build_state, crud_routes, resolve_registry, AppState, AssociationOps, CrudConfig,
    ModelDescriptor, ModelStore, ParsedQuery, Record, StoreError,
};
use serde_json::json;
use std::sync::Arc;

mod common;
use common::{fixture_configs, get};

/// A store whose every operation fails with a configured error.
struct FailingStore {
    make: Box<dyn Fn() -> StoreError + Send + Sync>,
}

impl FailingStore {
    fn new(make: impl Fn() -> StoreError + Send + Sync + 'static) -> Self {
        FailingStore {
            make: Box::new(make),
        }
    }
}

#[async_trait]
impl ModelStore for FailingStore {
    async fn find_one(
        &self,
        _model: &ModelDescriptor,
        _query: &ParsedQuery,
    ) -> Result<Option<Record>, StoreError> {
        Err((self.make)())
    }

    async fn find_all(
        &self,
        _model: &ModelDescriptor,
        _query: &ParsedQuery,
    ) -> Result<Vec<Record>, StoreError> {
        Err((self.make)())
    }

    async fn find_all_scoped(
        &self,
        _model: &ModelDescriptor,
        _scope: &str,
        _query: &ParsedQuery,
    ) -> Result<Vec<Record>, StoreError> {
        Err((self.make)())
    }

    async fn create(
        &self,
        _model: &ModelDescriptor,
        _payload: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Record, StoreError> {
        Err((self.make)())
    }

    async fn update(
        &self,
        _model: &ModelDescriptor,
        _record: &Record,
        _payload: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Record, StoreError> {
        Err((self.make)())
    }

    async fn destroy(
        &self,
        _model: &ModelDescriptor,
        _record: &Record,
    ) -> Result<(), StoreError> {
        Err((self.make)())
    }

    fn association(
        &self,
        _model: &ModelDescriptor,
        _association: &crudkit::model::AssociationDescriptor,
    ) -> Option<Arc<dyn AssociationOps>> {
        None
    }
}

fn failing_state(make: impl Fn() -> StoreError + Send + Sync + 'static) -> AppState {
    let registry = Arc::new(resolve_registry(&fixture_configs()).unwrap());
    build_state(
        registry,
        Arc::new(FailingStore::new(make)),
        &CrudConfig::default(),
    )
    .unwrap()
}

async fn status_for(make: impl Fn() -> StoreError + Send + Sync + 'static) -> StatusCode {
    let app = crud_routes(failing_state(make));
    let (status, _) = get(&app, "/players").await;
    status
}

#[tokio::test]
async fn unique_conflict_is_409() {
    assert_eq!(
        status_for(|| StoreError::UniqueViolation("dup".into())).await,
        StatusCode::CONFLICT
    );
}

#[tokio::test]
async fn foreign_key_violation_is_417() {
    assert_eq!(
        status_for(|| StoreError::ForeignKeyViolation("fk".into())).await,
        StatusCode::EXPECTATION_FAILED
    );
}

#[tokio::test]
async fn storage_validation_is_422() {
    assert_eq!(
        status_for(|| StoreError::Validation("bad".into())).await,
        StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn timeout_unavailable_and_connection_kinds() {
    assert_eq!(
        status_for(|| StoreError::Timeout("slow".into())).await,
        StatusCode::GATEWAY_TIMEOUT
    );
    assert_eq!(
        status_for(|| StoreError::HostUnreachable("down".into())).await,
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
        status_for(|| StoreError::Connection("refused".into())).await,
        StatusCode::BAD_GATEWAY
    );
}

#[tokio::test]
async fn unrecognized_failure_is_500() {
    assert_eq!(
        status_for(|| StoreError::Other("mystery".into())).await,
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[tokio::test]
async fn backend_cause_carries_detail_and_hint_text() {
    let app = crud_routes(failing_state(|| StoreError::Backend {
        code: "23503".into(),
        message: "violates foreign key".into(),
        detail: Some("Key (team_id)=(9) is missing".into()),
        hint: Some("Create the team first.".into()),
    }));
    let (status, body) = get(&app, "/players").await;
    assert_eq!(status, StatusCode::NOT_ACCEPTABLE);
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("Key (team_id)=(9) is missing"));
    assert!(message.contains("Hint: Create the team first."));
    assert_eq!(body["error"]["code"], json!("not_acceptable"));
}

#[tokio::test]
async fn backend_syntax_class_is_422_and_other_codes_502() {
    let app = crud_routes(failing_state(|| StoreError::Backend {
        code: "42703".into(),
        message: "no such column".into(),
        detail: None,
        hint: None,
    }));
    let (status, _) = get(&app, "/players").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let app = crud_routes(failing_state(|| StoreError::Backend {
        code: "57014".into(),
        message: "canceled".into(),
        detail: None,
        hint: None,
    }));
    let (status, _) = get(&app, "/players").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}
