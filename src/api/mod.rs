mod accounts;
mod admin;
mod error;
mod health;
mod movies;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::rate_limit::RateLimitConfig;
use crate::session::SessionRepository;

pub use error::ApiError;
pub use users::USERS_PATH;

/// Create the API router. Paths are absolute; the session gate wraps it in `create_app`.
pub fn create_api_router(
    db: Database,
    sessions: Arc<SessionRepository>,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let accounts_state = accounts::AccountsState {
        db: db.clone(),
        rate_limit_config,
    };
    let users_state = users::UsersState { db: db.clone() };
    let movies_state = movies::MoviesState { db: db.clone() };
    let admin_state = admin::AdminState { db };

    Router::new()
        .nest("/api/v1/auth", accounts::router(accounts_state))
        .nest(USERS_PATH, users::router(users_state))
        .nest("/api/v1/movies", movies::router(movies_state))
        .nest("/api/v1/admin", admin::router(admin_state))
        .nest("/api/internal", health::router(sessions))
}
