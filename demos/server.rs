//! Example server: loads model declarations from MODELS_PATH (JSON) or
//! falls back to a built-in sample, seeds the in-memory store, and mounts
//! common + crud routes under /api/v1.

use crudkit::{
    build_state, common_routes, crud_routes, resolve_registry, CrudConfig, MemStore, ModelConfig,
};
use axum::Router;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("crudkit=debug")),
        )
        .init();

    let configs = match std::env::var("MODELS_PATH") {
        Ok(path) => serde_json::from_str::<Vec<ModelConfig>>(
            &tokio::fs::read_to_string(&path).await?,
        )?,
        Err(_) => sample_models(),
    };
    let registry = Arc::new(resolve_registry(&configs)?);

    let store = MemStore::new(registry.clone());
    seed_sample_rows(&store);

    let state = build_state(registry, Arc::new(store), &CrudConfig::default())?;

    let app = Router::new()
        .merge(common_routes(state.clone()))
        .nest("/api/v1", crud_routes(state))
        .layer(RequestBodyLimitLayer::new(1024 * 1024));

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

fn sample_models() -> Vec<ModelConfig> {
    serde_json::from_value(json!([
        {
            "name": "Team",
            "attributes": ["id", "name", "cityId"],
            "associations": [
                {"target": "Player", "kind": "oneToMany"}
            ]
        },
        {
            "name": "Player",
            "attributes": ["id", "name", "teamId", "active"],
            "scopes": ["active"],
            "associations": [
                {"target": "Team", "kind": "oneToOne"}
            ]
        }
    ]))
    .expect("sample models are well-formed")
}

fn seed_sample_rows(store: &MemStore) {
    let rows = |value: serde_json::Value| -> Vec<serde_json::Map<String, serde_json::Value>> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row.as_object().unwrap().clone())
            .collect()
    };
    store.seed(
        "Team",
        rows(json!([{"id": 1, "name": "Baseball"}, {"id": 2, "name": "Chess"}])),
    );
    store.seed(
        "Player",
        rows(json!([
            {"id": 1, "name": "Pinot", "teamId": 1, "active": true},
            {"id": 2, "name": "Syrah", "teamId": 2, "active": false}
        ])),
    );
    store.register_scope("Player", "active", |row| {
        row.get("active") == Some(&serde_json::Value::Bool(true))
    });
}
