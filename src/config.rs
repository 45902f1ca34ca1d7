//! Session and authorization settings, validated once at startup.

use std::str::FromStr;
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use jsonwebtoken::Algorithm;

pub const MIN_SECRET_LENGTH: usize = 32;
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(12 * 60 * 60);
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_ADMIN_PATH: &str = "/api/v1/admin/*";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is shorter than {MIN_SECRET_LENGTH} characters")]
    SecretTooShort(&'static str),
    #[error("signing secret and refresh secret must differ")]
    SharedSecret,
    #[error("unsupported algorithm {0:?}, expected HS256, HS384 or HS512")]
    UnsupportedAlgorithm(String),
    #[error("access TTL must be shorter than refresh TTL")]
    TtlOrder,
    #[error("invalid admin path pattern: {0}")]
    InvalidPattern(#[from] globset::Error),
}

/// Everything the session gate needs to sign, encrypt and authorize.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
    pub algorithm: Algorithm,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Shell-style patterns; matching paths require the admin role.
    pub admin_paths: Vec<String>,
    /// Set the `Secure` attribute on session cookies.
    pub secure_cookies: bool,
}

impl AuthConfig {
    /// Config with default algorithm, TTLs and admin paths.
    pub fn new(jwt_secret: impl Into<Vec<u8>>, refresh_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            refresh_secret: refresh_secret.into(),
            algorithm: Algorithm::HS256,
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            admin_paths: vec![DEFAULT_ADMIN_PATH.to_string()],
            secure_cookies: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::SecretTooShort("signing secret"));
        }
        if self.refresh_secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::SecretTooShort("refresh secret"));
        }
        if self.jwt_secret == self.refresh_secret {
            return Err(ConfigError::SharedSecret);
        }
        if self.access_ttl >= self.refresh_ttl {
            return Err(ConfigError::TtlOrder);
        }
        self.admin_matcher()?;
        Ok(())
    }

    /// Compile the admin path patterns.
    pub fn admin_matcher(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.admin_paths {
            builder.add(Glob::new(pattern)?);
        }
        Ok(builder.build()?)
    }
}

/// Parse an algorithm name. Only the HMAC family fits a shared secret.
pub fn parse_algorithm(name: &str) -> Result<Algorithm, ConfigError> {
    match Algorithm::from_str(&name.to_ascii_uppercase()) {
        Ok(alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => Ok(alg),
        _ => Err(ConfigError::UnsupportedAlgorithm(name.to_string())),
    }
}
