//! User profile endpoints.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::error::{ApiError, ResultExt, validate_password};
use crate::auth::{AdminOnly, Auth, Member, Owned, SessionContext, UserResource};
use crate::claims::{GUEST_ID, Payload};
use crate::db::{Database, User, UserFilter, UserRole, UserSortKey, UserUpdate};
use crate::impl_has_database;
use crate::password::spawn_hash;

/// Mount point of this router; `/me` redirects below it.
pub const USERS_PATH: &str = "/api/v1/users";

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
}

impl_has_database!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/me", get(me).put(me).delete(me))
        .route("/all", get(list_users))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .with_state(state)
}

fn guest_record() -> User {
    User {
        id: GUEST_ID,
        username: "guest".to_string(),
        hashed_password: String::new(),
        role: UserRole::Guest,
        created_at: String::new(),
        updated_at: String::new(),
    }
}

/// Redirect to the caller's own record, keeping the method.
async fn me(auth: Auth) -> Redirect {
    Redirect::temporary(&format!("{}/{}", USERS_PATH, auth.payload.user_id()))
}

#[derive(Deserialize)]
struct ListUsersQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
    #[serde(default, alias = "username-contains")]
    username_contains: Option<String>,
    #[serde(default)]
    role: Option<UserRole>,
    #[serde(default, alias = "sort-by")]
    sort_by: UserSortKey,
}

pub(crate) fn default_limit() -> i64 {
    10
}

/// Check paging bounds shared by the list endpoints.
pub(crate) fn check_paging(limit: i64, offset: i64) -> Result<(), ApiError> {
    if !(1..=100).contains(&limit) {
        return Err(ApiError::bad_request("limit must be between 1 and 100"));
    }
    if offset < 0 {
        return Err(ApiError::bad_request("offset cannot be negative"));
    }
    Ok(())
}

async fn list_users(
    State(state): State<UsersState>,
    _auth: Auth<AdminOnly>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    check_paging(query.limit, query.offset)?;

    let users = state
        .db
        .users()
        .list(&UserFilter {
            limit: query.limit,
            offset: query.offset,
            username_contains: query.username_contains,
            role: query.role,
            sort_by: query.sort_by,
        })
        .await
        .db_err("Failed to list users")?;

    Ok(Json(users))
}

async fn get_user(
    State(state): State<UsersState>,
    owned: Owned<UserResource>,
) -> Result<Json<User>, ApiError> {
    if owned.id == GUEST_ID {
        return Ok(Json(guest_record()));
    }

    let user = state
        .db
        .users()
        .find_by_id(owned.id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user))
}

#[derive(Deserialize)]
struct UpdateUserRequest {
    password: String,
    #[serde(default)]
    role: Option<UserRole>,
}

#[derive(Serialize)]
struct UpdateUserResponse {
    message: &'static str,
    user: User,
}

async fn update_user(
    State(state): State<UsersState>,
    auth: Auth<Member>,
    owned: Owned<UserResource>,
    session: SessionContext,
    Json(request): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_password(&request.password)?;

    if let Some(role) = request.role {
        if !auth.payload.is_admin() {
            return Err(ApiError::forbidden("Only admins can change roles"));
        }
        if role == UserRole::Guest {
            return Err(ApiError::bad_request("Cannot assign the guest role"));
        }
    }

    let hashed = spawn_hash(request.password).await.map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to hash password")
    })?;
    let user = state
        .db
        .users()
        .update(
            owned.id,
            &UserUpdate {
                hashed_password: Some(hashed),
                role: request.role,
            },
        )
        .await
        .db_err("Failed to update user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let payload = Payload::new(user.id, user.role)
        .map_err(|_| ApiError::internal("Invalid user record"))?;
    session.update_identity(payload).await?;

    info!(user_id = user.id, by = auth.payload.user_id(), "User updated");
    Ok(Json(UpdateUserResponse {
        message: "User has been updated successfully.",
        user,
    }))
}

#[derive(Serialize)]
struct DeleteUserResponse {
    message: &'static str,
    user: User,
}

async fn delete_user(
    State(state): State<UsersState>,
    auth: Auth<Member>,
    owned: Owned<UserResource>,
    session: SessionContext,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .delete(owned.id)
        .await
        .db_err("Failed to delete user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    session.revoke_all(user.id).await?;

    info!(user_id = user.id, by = auth.payload.user_id(), "User deleted");
    Ok(Json(DeleteUserResponse {
        message: "User has been removed successfully.",
        user,
    }))
}
