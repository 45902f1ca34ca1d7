//! Identity claims carried by session credentials.
//!
//! A [`Payload`] answers "who is asking": the subject id and its role.
//! A [`TokenClaims`] is a payload stamped with a token kind and a validity
//! window, which is what actually gets signed.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::db::UserRole;

/// Subject identifier (the user's database id).
pub type SubjectId = i64;

/// Subject id reserved for unauthenticated callers.
pub const GUEST_ID: SubjectId = 0;

/// Illegal combinations of subject id and role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    #[error("guest subject id requires the guest role")]
    GuestWithRole,
    #[error("guest role cannot carry a real subject id")]
    RoleWithoutGuestId,
}

/// Verified identity attached to a request.
///
/// Immutable: a change of role or subject is always a new payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPayload", into = "RawPayload")]
pub struct Payload {
    user_id: SubjectId,
    role: UserRole,
}

#[derive(Serialize, Deserialize)]
struct RawPayload {
    user_id: SubjectId,
    user_role: UserRole,
}

impl TryFrom<RawPayload> for Payload {
    type Error = ClaimError;

    fn try_from(raw: RawPayload) -> Result<Self, Self::Error> {
        Payload::new(raw.user_id, raw.user_role)
    }
}

impl From<Payload> for RawPayload {
    fn from(payload: Payload) -> Self {
        Self {
            user_id: payload.user_id,
            user_role: payload.role,
        }
    }
}

impl Payload {
    pub fn new(user_id: SubjectId, role: UserRole) -> Result<Self, ClaimError> {
        match (user_id == GUEST_ID, role == UserRole::Guest) {
            (true, false) => Err(ClaimError::GuestWithRole),
            (false, true) => Err(ClaimError::RoleWithoutGuestId),
            _ => Ok(Self { user_id, role }),
        }
    }

    pub const fn guest() -> Self {
        Self {
            user_id: GUEST_ID,
            role: UserRole::Guest,
        }
    }

    pub fn user_id(&self) -> SubjectId {
        self.user_id
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn is_guest(&self) -> bool {
        self.role == UserRole::Guest
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Whether `claim` belongs to `subject_id`.
///
/// Every "is this my own session/resource" decision goes through here.
pub fn is_owner(claim: &Payload, subject_id: SubjectId) -> bool {
    claim.user_id == subject_id
}

/// Token kind for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived, stateless, travels in the `access_token` cookie.
    Access,
    /// Long-lived, stored server side under the refresh key.
    Refresh,
}

/// Signed claims: payload plus token kind and validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(flatten)]
    pub payload: Payload,
    /// Token kind
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl TokenClaims {
    /// Claims issued now, expiring after `ttl`.
    pub fn new(payload: Payload, kind: TokenKind, ttl: Duration) -> Self {
        Self::issued_at(payload, kind, ttl, unix_now())
    }

    /// Claims issued at an explicit Unix timestamp.
    pub fn issued_at(payload: Payload, kind: TokenKind, ttl: Duration, iat: u64) -> Self {
        Self {
            payload,
            kind,
            iat,
            exp: iat + ttl.as_secs(),
        }
    }

    pub fn expires_at(&self) -> u64 {
        self.exp
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_sentinel_requires_guest_role() {
        assert_eq!(
            Payload::new(GUEST_ID, UserRole::Admin),
            Err(ClaimError::GuestWithRole)
        );
        assert_eq!(
            Payload::new(GUEST_ID, UserRole::User),
            Err(ClaimError::GuestWithRole)
        );
        assert_eq!(Payload::new(GUEST_ID, UserRole::Guest), Ok(Payload::guest()));
    }

    #[test]
    fn test_guest_role_requires_sentinel() {
        assert_eq!(
            Payload::new(7, UserRole::Guest),
            Err(ClaimError::RoleWithoutGuestId)
        );
    }

    #[test]
    fn test_is_owner() {
        let claim = Payload::new(7, UserRole::User).unwrap();
        assert!(is_owner(&claim, 7));
        assert!(!is_owner(&claim, 8));
    }

    #[test]
    fn test_expires_at_is_iat_plus_ttl() {
        let payload = Payload::new(1, UserRole::User).unwrap();
        let claims =
            TokenClaims::issued_at(payload, TokenKind::Access, Duration::from_secs(60), 1_000);
        assert_eq!(claims.expires_at(), 1_060);
    }

    #[test]
    fn test_serialized_shape() {
        let payload = Payload::new(3, UserRole::Admin).unwrap();
        let claims = TokenClaims::issued_at(payload, TokenKind::Refresh, Duration::from_secs(5), 10);
        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value["user_id"], 3);
        assert_eq!(value["user_role"], "admin");
        assert_eq!(value["typ"], "refresh");
        assert_eq!(value["exp"], 15);
    }

    #[test]
    fn test_deserialize_rejects_illegal_payload() {
        let raw = serde_json::json!({
            "user_id": 0,
            "user_role": "admin",
            "typ": "access",
            "iat": 0,
            "exp": 10,
        });
        assert!(serde_json::from_value::<TokenClaims>(raw).is_err());
    }
}
