//! Signed token encoding and validation.
//!
//! Access credentials are JWTs verified with the shared signing secret
//! only. The same signer produces the claims stored behind refresh keys.

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind,
};

use crate::claims::{Payload, TokenClaims, TokenKind};

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given HMAC secret and algorithm.
    pub fn new(secret: &[u8], algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Sign `claims`. Deterministic for identical claims.
    pub fn encode(&self, claims: &TokenClaims) -> Result<String, JwtError> {
        jsonwebtoken::encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Sign claims of kind [`TokenKind::Access`].
    pub fn encode_access(&self, claims: &TokenClaims) -> Result<String, JwtError> {
        if claims.kind != TokenKind::Access {
            return Err(JwtError::WrongTokenType);
        }
        self.encode(claims)
    }

    /// Verify signature, algorithm and expiry, then check the token kind.
    pub fn decode(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        let token_data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Decoding(e),
            })?;

        if token_data.claims.kind != kind {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }

    /// Validate an access token and return its payload.
    pub fn decode_access(&self, token: &str) -> Result<TokenClaims, JwtError> {
        self.decode(token, TokenKind::Access)
    }

    /// Validate a stored refresh token and return its payload.
    pub fn decode_refresh(&self, token: &str) -> Result<Payload, JwtError> {
        self.decode(token, TokenKind::Refresh).map(|c| c.payload)
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("failed to decode token: {0}")]
    Decoding(jsonwebtoken::errors::Error),
    #[error("token has expired")]
    Expired,
    /// Wrong token type (e.g., a refresh claim presented as access)
    #[error("wrong token type")]
    WrongTokenType,
}
