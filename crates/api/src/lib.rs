//! `api` crate — HTTP REST layer over the trigger/dispatch core.
//!
//! Exposes:
//!   GET    /api/v1/heartbeat
//!   POST   /api/v1/functions/{func}/run
//!   GET    /api/v1/instances/{id}
//!   POST   /api/v1/instances/{id}/status
//!   POST   /api/v1/scan
//!
//! Thin request/response marshaling only; all decisions live in the engine
//! and dispatch crates.

pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use capabilities::FunctionRegistry;
use dispatch::{Dispatcher, StatusStore};
use engine::{TriggerPump, TriggerSubscription};

/// Shared handler state: the core's collaborators, all explicitly injected.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub tracker: Arc<dyn StatusStore>,
    pub registry: Arc<dyn FunctionRegistry>,
    pub pump: Arc<TriggerPump>,
    pub subscriptions: Arc<Vec<TriggerSubscription>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/heartbeat", get(handlers::heartbeat))
        .route("/api/v1/functions/:func/run", post(handlers::invocations::run))
        .route("/api/v1/instances/:id", get(handlers::invocations::status))
        .route(
            "/api/v1/instances/:id/status",
            post(handlers::invocations::update_status),
        )
        .route("/api/v1/scan", post(handlers::scan::scan))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(bind: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("API listening on {bind}");
    axum::serve(listener, router(state)).await
}
