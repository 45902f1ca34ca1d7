//! Axum extractors for role and ownership checks.
//!
//! Both read the identity the session gate attached; neither looks at
//! credentials again.

use std::future::Future;
use std::marker::PhantomData;

use axum::{
    extract::{FromRequestParts, Path},
    http::{Method, request::Parts},
    response::{IntoResponse, Response},
};
use tracing::error;

use super::context::SessionContext;
use super::errors::AuthError;
use super::state::HasDatabase;
use crate::claims::{Payload, SubjectId, is_owner};
use crate::db::UserRole;

/// Check `claim` against an allow-set of roles. Admins always pass.
pub fn check_role(allowed: &[UserRole], claim: &Payload) -> Result<(), AuthError> {
    if claim.is_admin() || allowed.contains(&claim.role()) {
        Ok(())
    } else {
        Err(AuthError::InsufficientRole)
    }
}

/// Check that `claim` may touch a resource owned by `owner_id`.
///
/// Creation requests are refused before ownership is considered, since a
/// resource that does not exist yet has no owner.
pub fn check_ownership(
    method: &Method,
    claim: &Payload,
    owner_id: SubjectId,
) -> Result<(), AuthError> {
    if method == Method::POST {
        return Err(AuthError::MethodNotAllowed);
    }
    if claim.is_admin() || is_owner(claim, owner_id) {
        Ok(())
    } else {
        Err(AuthError::ResourceOwnership)
    }
}

/// Trait for role constraints on the [`Auth`] extractor.
pub trait RoleConstraint: Send + Sync + 'static {
    const ALLOWED: &'static [UserRole];
}

/// Anyone, guests included.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    const ALLOWED: &'static [UserRole] = &[UserRole::Guest, UserRole::User];
}

/// Signed-in users (and admins).
pub struct Member;

impl RoleConstraint for Member {
    const ALLOWED: &'static [UserRole] = &[UserRole::User];
}

/// Admins only.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    const ALLOWED: &'static [UserRole] = &[];
}

/// The caller's identity, checked against a role constraint.
pub struct Auth<R: RoleConstraint = AnyRole> {
    pub payload: Payload,
    _role: PhantomData<R>,
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: Send + Sync,
    R: RoleConstraint,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let payload = SessionContext::from_request_parts(parts, state)
            .await?
            .payload();
        check_role(R::ALLOWED, &payload)?;
        Ok(Self {
            payload,
            _role: PhantomData,
        })
    }
}

/// A kind of resource that has an owning user.
pub trait OwnedResource: Send + Sync + 'static {
    /// Message for a lookup miss.
    const NOT_FOUND: &'static str;

    /// Owner of resource `id`, or `None` if it does not exist.
    fn owner<S: HasDatabase + Sync>(
        state: &S,
        id: i64,
    ) -> impl Future<Output = Result<Option<SubjectId>, AuthError>> + Send;
}

/// A user record; every user owns itself.
pub struct UserResource;

impl OwnedResource for UserResource {
    const NOT_FOUND: &'static str = "User not found";

    fn owner<S: HasDatabase + Sync>(
        _state: &S,
        id: i64,
    ) -> impl Future<Output = Result<Option<SubjectId>, AuthError>> + Send {
        std::future::ready(Ok(Some(id)))
    }
}

pub struct MovieResource;

impl OwnedResource for MovieResource {
    const NOT_FOUND: &'static str = "Movie not found";

    fn owner<S: HasDatabase + Sync>(
        state: &S,
        id: i64,
    ) -> impl Future<Output = Result<Option<SubjectId>, AuthError>> + Send {
        let movies = state.db().movies();
        async move {
            movies.owner_of(id).await.map_err(|e| {
                error!(movie_id = id, error = %e, "Failed to look up movie owner");
                AuthError::Internal
            })
        }
    }
}

/// Path id of a resource the caller is allowed to touch.
pub struct Owned<K: OwnedResource> {
    pub id: i64,
    pub payload: Payload,
    _kind: PhantomData<K>,
}

impl<S, K> FromRequestParts<S> for Owned<K>
where
    S: HasDatabase + Send + Sync,
    K: OwnedResource,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let payload = SessionContext::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?
            .payload();

        if parts.method == Method::POST {
            return Err(AuthError::MethodNotAllowed.into_response());
        }

        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        let owner = K::owner(state, id)
            .await
            .map_err(IntoResponse::into_response)?
            .ok_or(AuthError::ResourceNotFound(K::NOT_FOUND))
            .map_err(IntoResponse::into_response)?;

        check_ownership(&parts.method, &payload, owner).map_err(IntoResponse::into_response)?;

        Ok(Self {
            id,
            payload,
            _kind: PhantomData,
        })
    }
}
