use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider response is missing `{0}`")]
    MissingField(&'static str),
    #[error("provider reports the email as unverified")]
    UnverifiedEmail,
    #[error("state parameter is invalid or expired")]
    InvalidState,
    #[error("provider exchange failed: {0}")]
    Provider(String),
}

/// One configured provider's authorization-code endpoints.
#[async_trait::async_trait]
pub trait OAuthProviderClient: Send + Sync {
    fn name(&self) -> &str;
    fn authorize_url(&self, state: &str) -> Result<Url, OAuthError>;
    /// Trades the callback `code` for the provider's user profile document.
    async fn exchange_code(&self, code: &str) -> Result<serde_json::Value, OAuthError>;
}
