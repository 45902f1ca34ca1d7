//! Session repository: issues, resolves, rotates and revokes credential pairs.
//!
//! The access half of a pair is a stateless signed token. The refresh half is
//! a sealed lookup key; the store entry behind it holds the signed refresh
//! claims and is the only thing revocation has to touch.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::auth::AuthError;
use crate::claims::{Payload, SubjectId, TokenClaims, TokenKind, is_owner};
use crate::config::AuthConfig;
use crate::jwt::JwtConfig;
use crate::refresh_key::RefreshKeyCipher;
use crate::store::CredentialStore;

/// Credentials as presented by a client or held by a request. Either half may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPair {
    pub access: String,
    pub refresh: String,
}

impl From<SessionPair> for Credentials {
    fn from(pair: SessionPair) -> Self {
        Self {
            access: Some(pair.access),
            refresh: Some(pair.refresh),
        }
    }
}

/// What a revocation removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revocation {
    /// The presented pair was dropped.
    Presented,
    /// Every session of another subject was dropped.
    Subject { subject_id: SubjectId, count: usize },
}

fn subject_index(subject_id: SubjectId) -> String {
    format!("subject:{subject_id}")
}

pub struct SessionRepository {
    jwt: JwtConfig,
    cipher: RefreshKeyCipher,
    store: Arc<dyn CredentialStore>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionRepository {
    pub fn new(config: &AuthConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            jwt: JwtConfig::new(&config.jwt_secret, config.algorithm),
            cipher: RefreshKeyCipher::new(&config.refresh_secret),
            store,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    /// Verify an access credential without touching the store.
    pub fn decode_access(&self, access: &str) -> Result<Payload, AuthError> {
        Ok(self.jwt.decode_access(access)?.payload)
    }

    /// Mint a new pair for `payload` and store its refresh entry.
    pub async fn issue(&self, payload: &Payload) -> Result<SessionPair, AuthError> {
        if payload.is_guest() {
            tracing::error!("Refusing to issue a session for the guest identity");
            return Err(AuthError::Internal);
        }

        let access = self.jwt.encode_access(&TokenClaims::new(
            *payload,
            TokenKind::Access,
            self.access_ttl,
        ))?;
        let stored = self.jwt.encode(&TokenClaims::new(
            *payload,
            TokenKind::Refresh,
            self.refresh_ttl,
        ))?;
        let refresh = self.cipher.encrypt_refresh_key(payload.user_id())?;

        self.store.put(&refresh, &stored, self.refresh_ttl).await?;
        self.store
            .add_member(&subject_index(payload.user_id()), &refresh, self.refresh_ttl)
            .await?;

        debug!(user_id = payload.user_id(), "Issued session pair");
        Ok(SessionPair { access, refresh })
    }

    /// Look up the identity behind a refresh credential.
    ///
    /// A malformed key is `InvalidCredential`; a missing, revoked or expired
    /// entry is `ExpiredCredential`.
    pub async fn resolve(&self, refresh: &str) -> Result<Payload, AuthError> {
        let subject_id = self.cipher.decrypt_refresh_key(refresh)?;
        let stored = self
            .store
            .get(refresh)
            .await?
            .ok_or(AuthError::ExpiredCredential)?;
        let payload = self.jwt.decode_refresh(&stored)?;

        if payload.user_id() != subject_id {
            return Err(AuthError::InvalidCredential);
        }
        Ok(payload)
    }

    /// Replace the presented pair with a new one for `payload`.
    ///
    /// The old refresh entry is consumed atomically before the new pair is
    /// issued, so of two concurrent rotations of the same credential only
    /// one succeeds; the other gets `ExpiredCredential`.
    pub async fn rotate(
        &self,
        old: &Credentials,
        payload: &Payload,
    ) -> Result<SessionPair, AuthError> {
        if let Some(refresh) = old.refresh.as_deref() {
            let subject_id = self.cipher.decrypt_refresh_key(refresh)?;
            self.store
                .take(refresh)
                .await?
                .ok_or(AuthError::ExpiredCredential)?;
            self.store
                .remove_member(&subject_index(subject_id), refresh)
                .await?;
        }

        let pair = self.issue(payload).await?;
        debug!(user_id = payload.user_id(), "Rotated session pair");
        Ok(pair)
    }

    /// Revoke sessions on behalf of `claim`.
    ///
    /// Without a subject, or when `claim` owns the subject, only the presented
    /// pair goes. Otherwise every session of the subject goes and the
    /// presented pair is left alone.
    pub async fn revoke(
        &self,
        presented: &Credentials,
        claim: &Payload,
        subject_id: Option<SubjectId>,
    ) -> Result<Revocation, AuthError> {
        match subject_id {
            Some(subject_id) if !is_owner(claim, subject_id) => {
                let count = self.revoke_subject(subject_id).await?;
                Ok(Revocation::Subject { subject_id, count })
            }
            _ => {
                if let Some(refresh) = presented.refresh.as_deref() {
                    self.delete_refresh(refresh).await?;
                }
                Ok(Revocation::Presented)
            }
        }
    }

    /// Drop every live session of `subject_id`. Returns how many were dropped.
    pub async fn revoke_subject(&self, subject_id: SubjectId) -> Result<usize, AuthError> {
        let keys = self.store.take_members(&subject_index(subject_id)).await?;

        let mut count = 0;
        for key in &keys {
            if self.store.delete(key).await? {
                count += 1;
            }
        }

        debug!(user_id = subject_id, count, "Revoked all sessions of subject");
        Ok(count)
    }

    /// Delete one refresh entry. Unknown or malformed keys are ignored.
    pub async fn delete_refresh(&self, refresh: &str) -> Result<bool, AuthError> {
        let removed = self.store.delete(refresh).await?;
        if let Ok(subject_id) = self.cipher.decrypt_refresh_key(refresh) {
            self.store
                .remove_member(&subject_index(subject_id), refresh)
                .await?;
        }
        Ok(removed)
    }
}
