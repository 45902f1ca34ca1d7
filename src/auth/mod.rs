//! Session authentication with role and ownership authorization.
//!
//! Paired credentials: a short-lived signed access token (stateless) and a
//! long-lived refresh key backed by the credential store. The session gate
//! resolves them to an identity on every request and rotates the pair when
//! the access token has run out.

mod context;
mod cookie;
mod errors;
mod extractors;
mod gate;
mod state;

pub use context::SessionContext;
pub use cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_cookie};
pub use errors::AuthError;
pub use extractors::{
    AdminOnly, AnyRole, Auth, Member, MovieResource, Owned, OwnedResource, RoleConstraint,
    UserResource, check_ownership, check_role,
};
pub use gate::{SessionGate, session_gate};
pub use state::HasDatabase;
