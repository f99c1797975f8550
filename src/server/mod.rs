//! HTTP surface - REST routes and the streaming channel
//!
//! Routes:
//! - `POST /api/script/execute`
//! - `GET  /api/script/languages`
//! - `GET  /api/script/permissions/{sandbox,permissive}`
//! - `GET  /api/script/health`
//! - `GET  /api/script/engine`
//! - `GET  /ws/script` (WebSocket upgrade)

pub mod routes;
pub mod stream;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::runner::ScriptRunner;
use stream::SessionRegistry;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<dyn ScriptRunner>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(runner: Arc<dyn ScriptRunner>) -> Self {
        Self {
            runner,
            sessions: Arc::new(SessionRegistry::default()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/script/execute", post(routes::execute))
        .route("/api/script/languages", get(routes::languages))
        .route("/api/script/permissions/sandbox", get(routes::sandbox_permissions))
        .route(
            "/api/script/permissions/permissive",
            get(routes::permissive_permissions),
        )
        .route("/api/script/health", get(routes::health))
        .route("/api/script/engine", get(routes::engine))
        .route("/ws/script", get(stream::ws_handler))
        .with_state(state)
}

/// Bind `addr` and serve until the process stops
pub async fn start_server(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Script runner listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .await
        .context("Server terminated")?;

    Ok(())
}
