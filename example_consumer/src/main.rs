//! Example consumer: a separate Rust project that uses crudkit as a
//! dependency.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Or from this directory: `cargo run`

use crudkit::{
    build_state, common_routes, crud_routes, resolve_registry, CrudConfig, MemStore, ModelConfig,
    Permissions,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crudkit=info")),
        )
        .init();

    let configs: Vec<ModelConfig> = serde_json::from_value(serde_json::json!([
        {
            "name": "Note",
            "attributes": ["id", "title", "body"]
        }
    ]))?;
    let registry = Arc::new(resolve_registry(&configs)?);
    let store = MemStore::new(registry.clone());

    let config = CrudConfig {
        permissions: Permissions::ModelList(vec!["Note".into()]),
        ..CrudConfig::default()
    };
    let state = build_state(registry, Arc::new(store), &config)?;

    let app = axum::Router::new()
        .merge(common_routes(state.clone()))
        .nest("/api/v1", crud_routes(state));

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
