//! Registration, login and logout.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::error::{ApiError, ResultExt, validate_password, validate_username};
use crate::auth::SessionContext;
use crate::claims::Payload;
use crate::db::{Database, User, UserRole};
use crate::password::{spawn_hash, spawn_verify};
use crate::rate_limit::{RateLimitConfig, rate_limit_credentials};

#[derive(Clone)]
pub struct AccountsState {
    pub db: Database,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

pub fn router(state: AccountsState) -> Router {
    let limited = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config,
            rate_limit_credentials,
        ));

    Router::new()
        .route("/logout", get(logout))
        .merge(limited)
}

#[derive(Deserialize)]
struct CredentialsRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

async fn register(
    State(state): State<AccountsState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = request.username.trim();
    validate_username(username)?;
    validate_password(&request.password)?;

    let available = state
        .db
        .users()
        .is_username_available(username)
        .await
        .db_err("Failed to check username availability")?;
    if !available {
        return Err(ApiError::conflict("Username is already taken"));
    }

    let hashed = spawn_hash(request.password).await.map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to hash password")
    })?;
    let id = state
        .db
        .users()
        .create(username, &hashed, UserRole::User)
        .await
        .db_err("Failed to create user")?;
    let user = state
        .db
        .users()
        .find_by_id(id)
        .await
        .db_err("Failed to load created user")?
        .ok_or_else(|| ApiError::internal("Created user vanished"))?;

    info!(user_id = id, username = %username, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AccountsState>,
    session: SessionContext,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .db
        .users()
        .find_by_username(request.username.trim())
        .await
        .db_err("Failed to look up user")?;

    let digest = user.as_ref().map(|u| u.hashed_password.clone());
    let verified = spawn_verify(request.password, digest).await.map_err(|e| {
        error!(error = %e, "Failed to verify password");
        ApiError::internal("Failed to verify password")
    })?;
    let Some(user) = user.filter(|_| verified) else {
        debug!(username = %request.username, "Login failed");
        return Err(ApiError::unauthorized("Authorization failed."));
    };

    let payload = Payload::new(user.id, user.role).map_err(|e| {
        error!(user_id = user.id, error = %e, "Stored user has an illegal role");
        ApiError::internal("Invalid user record")
    })?;
    session.login(payload).await?;

    info!(user_id = user.id, "User logged in");
    Ok(Json(user))
}

async fn logout(session: SessionContext) -> Result<Json<MessageResponse>, ApiError> {
    let user_id = session.payload().user_id();
    session.logout().await?;
    debug!(user_id, "User logged out");
    Ok(Json(MessageResponse {
        message: "Logged out successfully.",
    }))
}
