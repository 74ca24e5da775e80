use super::StoredTokens;
use crate::domain_model::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    NoRefreshToken,
    #[error("refresh rejected with status {0}")]
    Rejected(u16),
    #[error("refresh request failed: {0}")]
    Transport(String),
    #[error("refresh abandoned before completion")]
    Abandoned,
}

/// Performs the network half of a refresh. One call per rotation.
#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<StoredTokens, RefreshError>;
}

/// Notified when a failed refresh has cleared the stored credentials.
pub trait SessionListener: Send + Sync {
    fn signed_out(&self, reason: &RefreshError);
}

pub struct NoopSessionListener;

impl SessionListener for NoopSessionListener {
    fn signed_out(&self, _reason: &RefreshError) {}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnvelopeError {
    pub code: String,
    pub message: String,
}

pub struct HttpTokenRefresher {
    client: Client,
    refresh_url: Url,
}

impl HttpTokenRefresher {
    pub fn new(client: Client, refresh_url: Url) -> Self {
        Self {
            client,
            refresh_url,
        }
    }
}

#[async_trait::async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<StoredTokens, RefreshError> {
        let response = self
            .client
            .post(self.refresh_url.clone())
            .json(&RefreshRequest {
                refresh_token: &refresh_token.0,
            })
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RefreshError::Rejected(response.status().as_u16()));
        }
        let body: Envelope<TokenPair> = response
            .json()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;
        body.data
            .map(StoredTokens::from)
            .ok_or_else(|| RefreshError::Transport("refresh response carried no tokens".to_string()))
    }
}
