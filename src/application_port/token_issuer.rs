use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("token issuer misconfigured: {0}")]
    Misconfigured(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub email: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub typ: TokenKind,
}

impl TokenClaims {
    pub fn subject_id(&self) -> Result<SubjectId, TokenError> {
        self.sub.parse::<SubjectId>().map_err(|_| TokenError::Invalid)
    }

    pub fn token_id(&self) -> TokenId {
        TokenId(self.jti.clone())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Mints and checks signed token pairs. No I/O.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, subject_id: SubjectId, email: &str) -> Result<TokenPair, TokenError>;
    fn verify_access(&self, token: &AccessToken) -> Result<TokenClaims, TokenError>;
    fn verify_refresh(&self, token: &RefreshToken) -> Result<TokenClaims, TokenError>;
    /// Reads claims without checking signature or expiry.
    fn decode(&self, token: &str) -> Option<TokenClaims>;
    fn access_ttl(&self) -> Duration;
    fn refresh_ttl(&self) -> Duration;
}
