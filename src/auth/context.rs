//! Request-scoped session state shared between the gate and handlers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::AuthError;
use crate::claims::{Payload, SubjectId, is_owner};
use crate::session::{Credentials, Revocation, SessionRepository};

struct SessionState {
    payload: Payload,
    credentials: Credentials,
}

/// Identity and credential pair of the current request.
///
/// The gate attaches one to every request. Handlers change it through
/// [`login`](Self::login), [`update_identity`](Self::update_identity) and
/// [`revoke`](Self::revoke); the gate writes the result back as cookies.
#[derive(Clone)]
pub struct SessionContext {
    sessions: Arc<SessionRepository>,
    state: Arc<Mutex<SessionState>>,
}

impl SessionContext {
    pub fn new(sessions: Arc<SessionRepository>, payload: Payload, credentials: Credentials) -> Self {
        Self {
            sessions,
            state: Arc::new(Mutex::new(SessionState {
                payload,
                credentials,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace(&self, payload: Payload, credentials: Credentials) {
        let mut state = self.lock();
        state.payload = payload;
        state.credentials = credentials;
    }

    pub fn payload(&self) -> Payload {
        self.lock().payload
    }

    pub fn credentials(&self) -> Credentials {
        self.lock().credentials.clone()
    }

    /// Start a session for `payload`, replacing whatever the request held.
    pub async fn login(&self, payload: Payload) -> Result<(), AuthError> {
        let pair = self.sessions.issue(&payload).await?;
        let previous = self.credentials();
        self.replace(payload, pair.into());

        if let Some(refresh) = previous.refresh.as_deref() {
            self.sessions.delete_refresh(refresh).await?;
        }
        Ok(())
    }

    /// Apply a changed identity.
    ///
    /// If the caller changed themselves their pair is rotated onto the new
    /// payload. Otherwise the target is logged out everywhere so its next
    /// request picks up the change.
    pub async fn update_identity(&self, payload: Payload) -> Result<(), AuthError> {
        let current = self.payload();
        if is_owner(&current, payload.user_id()) {
            let pair = self
                .sessions
                .rotate(&self.credentials(), &payload)
                .await?;
            self.replace(payload, pair.into());
        } else {
            self.sessions.revoke_subject(payload.user_id()).await?;
        }
        Ok(())
    }

    /// Revoke sessions; see [`SessionRepository::revoke`].
    ///
    /// When the caller's own pair is revoked the request continues as guest
    /// and the gate clears the cookies.
    pub async fn revoke(&self, subject_id: Option<SubjectId>) -> Result<Revocation, AuthError> {
        let outcome = self
            .sessions
            .revoke(&self.credentials(), &self.payload(), subject_id)
            .await?;
        if outcome == Revocation::Presented {
            self.replace(Payload::guest(), Credentials::default());
        }
        Ok(outcome)
    }

    /// Revoke every session of `subject_id`, the caller's included.
    ///
    /// Used once the subject's account is gone. If that is the caller, the
    /// request continues as guest.
    pub async fn revoke_all(&self, subject_id: SubjectId) -> Result<usize, AuthError> {
        let count = self.sessions.revoke_subject(subject_id).await?;
        if is_owner(&self.payload(), subject_id) {
            self.replace(Payload::guest(), Credentials::default());
        }
        Ok(count)
    }

    /// Log the caller out.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.revoke(None).await.map(|_| ())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for SessionContext {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<SessionContext>().cloned().ok_or_else(|| {
            tracing::error!("Session context missing; is the session gate installed?");
            AuthError::Internal
        })
    }
}
