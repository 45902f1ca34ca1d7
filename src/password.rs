//! Password hashing with Argon2id.
//!
//! Request handlers go through [`spawn_hash`] and [`spawn_verify`], which run
//! Argon2 on the blocking pool instead of a runtime worker.

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

#[derive(Debug, thiserror::Error)]
#[error("failed to hash password: {0}")]
pub struct PasswordError(String);

/// Hash a plaintext password into a PHC string.
pub fn hash_password(plaintext: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError(e.to_string()))
}

/// Check a plaintext password against a stored digest.
///
/// A malformed digest never verifies.
pub fn verify_password(plaintext: &str, digest: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        return false;
    };
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

/// Digest checked when the account does not exist, so a miss costs one
/// Argon2 verification like a wrong password does.
static ABSENT_ACCOUNT_DIGEST: LazyLock<String> =
    LazyLock::new(|| hash_password("absent-account").unwrap_or_default());

/// Hash on the blocking pool.
pub async fn spawn_hash(plaintext: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&plaintext))
        .await
        .map_err(|e| PasswordError(format!("spawn password hashing task: {e}")))?
}

/// Verify on the blocking pool. `None` stands for an unknown account and
/// never verifies.
pub async fn spawn_verify(
    plaintext: String,
    digest: Option<String>,
) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || match digest {
        Some(digest) => verify_password(&plaintext, &digest),
        None => {
            verify_password(&plaintext, &ABSENT_ACCOUNT_DIGEST);
            false
        }
    })
    .await
    .map_err(|e| PasswordError(format!("spawn password verification task: {e}")))
}
