//! Shared fixture for the integration tests: a city/team/player registry,
//! a seeded in-memory store, and request helpers that drive the generated
//! router end to end.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use crudkit::{
    build_state, crud_routes, resolve_registry, CrudConfig, MemStore, ModelConfig, ModelRegistry,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    pub app: Router,
    pub store: MemStore,
    pub registry: Arc<ModelRegistry>,
}

pub fn fixture_configs() -> Vec<ModelConfig> {
    serde_json::from_value(json!([
        {
            "name": "City",
            "attributes": ["id", "name"],
            "associations": [
                {"target": "Team", "kind": "oneToMany"}
            ]
        },
        {
            "name": "Team",
            "attributes": ["id", "name", "cityId"],
            "associations": [
                {"target": "City", "kind": "oneToOne"},
                {"target": "Player", "kind": "oneToMany"}
            ]
        },
        {
            "name": "Player",
            "attributes": ["id", "name", "teamId", "active"],
            "scopes": ["returnsOne", "returnsNone", "returnsAll"],
            "associations": [
                {"target": "Team", "kind": "oneToOne"}
            ]
        }
    ]))
    .expect("fixture configs are well-formed")
}

fn rows(value: Value) -> Vec<serde_json::Map<String, Value>> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row.as_object().unwrap().clone())
        .collect()
}

pub fn seed(store: &MemStore) {
    store.seed("City", rows(json!([{"id": 1, "name": "Springfield"}])));
    store.seed(
        "Team",
        rows(json!([
            {"id": 1, "name": "Baseball", "cityId": 1},
            {"id": 2, "name": "Chess", "cityId": 1}
        ])),
    );
    store.seed(
        "Player",
        rows(json!([
            {"id": 1, "name": "Pinot", "teamId": 1, "active": true},
            {"id": 2, "name": "Syrah", "teamId": 2, "active": false}
        ])),
    );
    store.register_scope("Player", "returnsOne", |row| {
        row.get("active") == Some(&json!(true))
    });
    store.register_scope("Player", "returnsNone", |row| {
        row.get("name") == Some(&json!("notaname"))
    });
    store.register_scope("Player", "returnsAll", |row| {
        row.get("name") != Some(&json!("notaname"))
    });
}

pub fn setup() -> TestApp {
    setup_with_config(CrudConfig::default())
}

pub fn setup_with_config(config: CrudConfig) -> TestApp {
    let registry = Arc::new(resolve_registry(&fixture_configs()).unwrap());
    let store = MemStore::new(registry.clone());
    seed(&store);
    let state = build_state(registry.clone(), Arc::new(store.clone()), &config).unwrap();
    TestApp {
        app: crud_routes(state),
        store,
        registry,
    }
}

pub async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => {
            builder = builder.header("content-type", "application/json");
            builder.body(Body::from(body.to_string())).unwrap()
        }
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    request(app, "GET", uri, None).await
}

pub async fn delete(app: &Router, uri: &str) -> (StatusCode, Value) {
    request(app, "DELETE", uri, None).await
}
