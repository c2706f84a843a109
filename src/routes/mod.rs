//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the room socket and the small HTTP API under a single
//! Axum router. Snapshot bodies are capped by `DefaultBodyLimit`; everything
//! else is stateless or goes through the socket.

pub mod hostinfo;
pub mod snapshots;
pub mod ws;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// All routes with CORS, request tracing and the snapshot body cap applied.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = DefaultBodyLimit::max(state.config.snapshot_max_bytes);

    Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/api/snapshots", post(snapshots::create_snapshot))
        .route("/api/snapshots/{code}", get(snapshots::get_snapshot))
        .route("/api/hostinfo", get(hostinfo::get_hostinfo))
        .route("/healthz", get(healthz))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
