//! Liveness of the credential store.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::error;

use crate::session::SessionRepository;

pub fn router(sessions: Arc<SessionRepository>) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(sessions)
}

async fn health(State(sessions): State<Arc<SessionRepository>>) -> (StatusCode, Json<Value>) {
    match sessions.store().ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
