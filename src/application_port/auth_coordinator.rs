use crate::application_port::{OAuthError, TokenError};
use crate::domain_model::*;
use crate::domain_port::{IdentityError, StoreError};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("subject already exists")]
    SubjectExists,
    #[error("subject not found")]
    SubjectNotFound,
    #[error("link session not found or expired")]
    LinkSessionNotFound,
    #[error("unknown oauth provider: {0}")]
    UnknownProvider(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired | TokenError::Invalid => AuthError::InvalidToken,
            TokenError::Signing(e) | TokenError::Misconfigured(e) => AuthError::Internal(e),
        }
    }
}

impl From<IdentityError> for AuthError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Conflict => AuthError::SubjectExists,
            IdentityError::Rejected(e) => AuthError::Validation(e),
            IdentityError::NotFound => AuthError::SubjectNotFound,
            IdentityError::Unavailable(e) => AuthError::UpstreamUnavailable(e),
            IdentityError::Internal(e) => AuthError::Internal(e),
        }
    }
}

impl From<OAuthError> for AuthError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::UnknownProvider(p) => AuthError::UnknownProvider(p),
            OAuthError::Provider(e) => AuthError::UpstreamUnavailable(e),
            other => AuthError::Validation(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub password: String,
    pub device_info: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub identifier: String,
    pub password: String,
    pub device_info: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: Subject,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccessValidation {
    Valid(Subject),
    Invalid,
}

impl AccessValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, AccessValidation::Valid(_))
    }
}

#[derive(Debug, Clone)]
pub enum OAuthOutcome {
    Authenticated(AuthResponse),
    SelectAccount { session_id: LinkSessionId },
}

#[async_trait::async_trait]
pub trait AuthCoordinator: Send + Sync {
    async fn register(&self, input: RegisterInput) -> Result<AuthResponse, AuthError>;
    async fn login(&self, input: LoginInput) -> Result<AuthResponse, AuthError>;
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenPair, AuthError>;
    async fn validate_access(&self, access_token: &AccessToken) -> AccessValidation;
    async fn logout(&self, refresh_token: &RefreshToken);
    /// Closes every session of the token's subject. Returns how many were closed.
    async fn logout_all(&self, access_token: &AccessToken) -> Result<usize, AuthError>;

    async fn link_oauth_identity(&self, identity: OAuthIdentity)
    -> Result<OAuthOutcome, AuthError>;
    async fn oauth_candidates(
        &self,
        session_id: &LinkSessionId,
    ) -> Result<EphemeralLinkSession, AuthError>;
    async fn select_oauth_account(
        &self,
        session_id: &LinkSessionId,
        subject_id: SubjectId,
    ) -> Result<AuthResponse, AuthError>;
}
