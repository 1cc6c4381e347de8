//! Session token issuance and verification
//!
//! Tokens are HS256-signed JWTs carrying the subject id and role. They are
//! self-contained: verification only recomputes the signature and checks the
//! issuer and expiry, with no store lookup. Expiry is a hard boundary (zero
//! leeway).

use accounts_core::{AuthConfig, Role, UserId};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - user ID
    pub sub: String,
    /// User's role
    pub role: Role,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
    /// JWT ID, only used to correlate log lines
    pub jti: String,
}

/// Token generation and validation errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to encode token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token")]
    Invalid,

    #[error("Token has expired")]
    Expired,

    #[error("Token lifetime overflows the expiry timestamp")]
    ExpiryOverflow,

    #[error("System time error: {0}")]
    SystemTime(#[from] std::time::SystemTimeError),
}

/// A freshly issued token and its lifetime in seconds
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: u64,
}

/// Issues and verifies session tokens
///
/// The signing key is derived once from configuration and never changes.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl_secs: u64,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            ttl_secs: config.token_ttl_secs,
        }
    }

    /// Token lifetime in seconds
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Issue a token valid from now for the configured lifetime
    pub fn issue(&self, user_id: UserId, role: Role) -> Result<IssuedToken, TokenError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        self.issue_at(user_id, role, now)
    }

    /// Issue a token as if the current time were `issued_at` (Unix seconds)
    pub fn issue_at(
        &self,
        user_id: UserId,
        role: Role,
        issued_at: u64,
    ) -> Result<IssuedToken, TokenError> {
        let exp = issued_at
            .checked_add(self.ttl_secs)
            .ok_or(TokenError::ExpiryOverflow)?;

        let claims = Claims {
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            role,
            iat: issued_at,
            exp,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(IssuedToken {
            token,
            expires_in: self.ttl_secs,
        })
    }

    /// Validate a token and return its claims
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    /// Validate a token and return the subject id and role
    pub fn verify(&self, token: &str) -> Result<(UserId, Role), TokenError> {
        let claims = self.decode(token)?;
        let user_id = claims.sub.parse().map_err(|_| TokenError::Invalid)?;
        Ok((user_id, claims.role))
    }
}
