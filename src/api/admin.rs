//! Admin API endpoints.
//!
//! The session gate already restricts these paths to admins; the extractors
//! repeat the check so the handlers stay safe if the path patterns change.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get},
};
use serde::Serialize;
use tracing::info;

use super::error::{ApiError, ResultExt};
use crate::auth::{AdminOnly, Auth, SessionContext};
use crate::claims::SubjectId;
use crate::db::{Database, UserFilter};
use crate::session::Revocation;

/// State for admin endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/sessions/{user_id}", delete(revoke_sessions))
        .with_state(state)
}

/// List all users.
async fn list_users(
    State(state): State<AdminState>,
    _auth: Auth<AdminOnly>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state
        .db
        .users()
        .list(&UserFilter {
            limit: i64::MAX,
            ..Default::default()
        })
        .await
        .db_err("Failed to list users")?;

    Ok(Json(users))
}

#[derive(Serialize)]
struct RevokeResponse {
    user_id: SubjectId,
    revoked: usize,
}

/// Force logout of every session of a user.
async fn revoke_sessions(
    auth: Auth<AdminOnly>,
    session: SessionContext,
    Path(user_id): Path<SubjectId>,
) -> Result<Json<RevokeResponse>, ApiError> {
    let revoked = match session.revoke(Some(user_id)).await? {
        Revocation::Subject { count, .. } => count,
        Revocation::Presented => 1,
    };

    info!(
        user_id,
        revoked,
        by = auth.payload.user_id(),
        "Sessions revoked by admin"
    );
    Ok(Json(RevokeResponse { user_id, revoked }))
}
