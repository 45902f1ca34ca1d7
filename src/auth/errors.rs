//! Authentication and authorization error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::jwt::JwtError;
use crate::refresh_key::RefreshKeyError;
use crate::store::StoreError;

/// Every way the session gate or an authorization guard can refuse a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credential")]
    InvalidCredential,
    #[error("expired or revoked credential")]
    ExpiredCredential,
    #[error("insufficient role")]
    InsufficientRole,
    #[error("resource is owned by another user")]
    ResourceOwnership,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    ResourceNotFound(&'static str),
    #[error("credential store unavailable")]
    StoreUnavailable,
    #[error("internal error")]
    Internal,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredential | AuthError::ExpiredCredential => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::InsufficientRole | AuthError::ResourceOwnership => StatusCode::FORBIDDEN,
            AuthError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AuthError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            AuthError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Both credential failures read the same.
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredential | AuthError::ExpiredCredential => {
                "Could not validate credentials"
            }
            AuthError::InsufficientRole => "Insufficient permissions",
            AuthError::ResourceOwnership => "You do not own this resource",
            AuthError::MethodNotAllowed => "Method not allowed",
            AuthError::ResourceNotFound(msg) => msg,
            AuthError::StoreUnavailable => "Service temporarily unavailable",
            AuthError::Internal => "Internal server error",
        }
    }

    /// Whether the presented credentials themselves were rejected.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredential | AuthError::ExpiredCredential
        )
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        error!(error = %e, "Credential store failure");
        AuthError::StoreUnavailable
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::Expired => AuthError::ExpiredCredential,
            JwtError::Decoding(_) | JwtError::WrongTokenType => AuthError::InvalidCredential,
            JwtError::Encoding(e) => {
                error!(error = %e, "Failed to sign token");
                AuthError::Internal
            }
        }
    }
}

impl From<RefreshKeyError> for AuthError {
    fn from(e: RefreshKeyError) -> Self {
        match e {
            RefreshKeyError::Encrypt => {
                error!("Failed to seal refresh key");
                AuthError::Internal
            }
            _ => AuthError::InvalidCredential,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
