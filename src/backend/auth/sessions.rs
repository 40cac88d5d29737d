/**
 * Session Management and JWT Tokens
 *
 * This module issues and verifies the bearer tokens used by every protected
 * route and by live connections. Tokens are HS256-signed with the configured
 * shared secret and carry the user id as `sub`.
 */
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::store::StoreError;
use crate::shared::{User, UserId};

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Username at issue time, informational only
    pub username: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

impl Claims {
    pub fn user_id(&self) -> Result<UserId, AuthError> {
        self.sub
            .parse()
            .map_err(|_| AuthError::Invalid(format!("bad subject '{}'", self.sub)))
    }
}

/// Why a caller could not be identified.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    Missing,
    #[error("malformed authorization header")]
    Malformed,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("account inactive or unknown")]
    Inactive,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Verifies a bearer token and returns its claims.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError>;
}

/// A freshly issued token.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// HS256 token issuer and verifier.
#[derive(Clone)]
pub struct JwtSessions {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtSessions {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Create a token for `user` valid for the configured lifetime.
    pub fn create_token(&self, user: &User) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            exp: unix_seconds(expires_at),
            iat: unix_seconds(now),
        };
        Ok(IssuedToken {
            token: self.sign(&claims)?,
            expires_at,
        })
    }

    /// Sign arbitrary claims with the session key.
    pub fn sign(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::Invalid(e.to_string()))
    }
}

#[async_trait]
impl CredentialVerifier for JwtSessions {
    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.decode_claims(token)
    }
}

fn unix_seconds(at: DateTime<Utc>) -> u64 {
    u64::try_from(at.timestamp()).unwrap_or_default()
}
