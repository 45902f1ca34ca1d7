//! Session gate middleware.
//!
//! Runs once per request: extract the credential cookies, resolve them to an
//! identity (rotating off the refresh credential when needed), attach a
//! [`SessionContext`], enforce admin-only paths, run the handler, then write
//! back whatever happened to the credential pair.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use globset::GlobSet;
use tracing::{debug, error};

use super::context::SessionContext;
use super::cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_session_cookies, get_cookie, set_cookie,
};
use super::errors::AuthError;
use crate::claims::Payload;
use crate::config::{AuthConfig, ConfigError};
use crate::session::{Credentials, SessionRepository};

pub struct SessionGate {
    sessions: Arc<SessionRepository>,
    admin_paths: GlobSet,
    secure_cookies: bool,
}

impl SessionGate {
    pub fn new(config: &AuthConfig, sessions: Arc<SessionRepository>) -> Result<Self, ConfigError> {
        Ok(Self {
            sessions,
            admin_paths: config.admin_matcher()?,
            secure_cookies: config.secure_cookies,
        })
    }

    fn presented(request: &Request) -> Credentials {
        let headers = request.headers();
        Credentials {
            access: get_cookie(headers, ACCESS_COOKIE_NAME)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            refresh: get_cookie(headers, REFRESH_COOKIE_NAME)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        }
    }

    /// Turn presented credentials into an identity and the pair the request holds.
    async fn resolve(&self, presented: &Credentials) -> Result<(Payload, Credentials), AuthError> {
        match (presented.access.as_deref(), presented.refresh.as_deref()) {
            (None, None) => Ok((Payload::guest(), Credentials::default())),
            // Access credentials are never issued without a refresh partner.
            (Some(_), None) => Err(AuthError::InvalidCredential),
            (None, Some(_)) => self.rotate(presented).await,
            (Some(access), Some(_)) => match self.sessions.decode_access(access) {
                Ok(payload) => Ok((payload, presented.clone())),
                Err(AuthError::ExpiredCredential) => self.rotate(presented).await,
                Err(e) => Err(e),
            },
        }
    }

    async fn rotate(&self, presented: &Credentials) -> Result<(Payload, Credentials), AuthError> {
        let refresh = presented
            .refresh
            .as_deref()
            .ok_or(AuthError::InvalidCredential)?;
        let payload = self.sessions.resolve(refresh).await?;
        let pair = self.sessions.rotate(presented, &payload).await?;
        Ok((payload, pair.into()))
    }

    fn requires_admin(&self, path: &str) -> bool {
        self.admin_paths.is_match(path)
    }

    /// Write the post-handler credential pair back to the client if it changed.
    async fn persist(&self, presented: &Credentials, current: &Credentials, response: &mut Response) {
        if presented == current {
            return;
        }

        if let Some(old) = presented.refresh.as_deref()
            && current.refresh.as_deref() != Some(old)
            && let Err(e) = self.sessions.delete_refresh(old).await
        {
            error!(error = %e, "Failed to delete replaced refresh entry");
        }

        let headers = response.headers_mut();
        match (current.access.as_deref(), current.refresh.as_deref()) {
            (Some(access), Some(refresh)) => {
                set_cookie(
                    headers,
                    ACCESS_COOKIE_NAME,
                    access,
                    self.sessions.access_ttl(),
                    self.secure_cookies,
                );
                set_cookie(
                    headers,
                    REFRESH_COOKIE_NAME,
                    refresh,
                    self.sessions.refresh_ttl(),
                    self.secure_cookies,
                );
            }
            _ => clear_session_cookies(headers, self.secure_cookies),
        }
    }

    fn reject(&self, err: AuthError) -> Response {
        let clear = err.is_credential_failure();
        let mut response = err.into_response();
        if clear {
            clear_session_cookies(response.headers_mut(), self.secure_cookies);
        }
        response
    }
}

/// Middleware entry point, installed with `middleware::from_fn_with_state`.
pub async fn session_gate(
    State(gate): State<Arc<SessionGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = SessionGate::presented(&request);

    let (payload, credentials) = match gate.resolve(&presented).await {
        Ok(resolved) => resolved,
        Err(e) => {
            debug!(path = %request.uri().path(), error = %e, "Rejected session credentials");
            return gate.reject(e);
        }
    };

    let context = SessionContext::new(gate.sessions.clone(), payload, credentials);
    request.extensions_mut().insert(context.clone());

    let mut response = if gate.requires_admin(request.uri().path()) && !payload.is_admin() {
        debug!(
            path = %request.uri().path(),
            user_id = payload.user_id(),
            "Admin path denied"
        );
        AuthError::InsufficientRole.into_response()
    } else {
        next.run(request).await
    };

    gate.persist(&presented, &context.credentials(), &mut response)
        .await;
    response
}
