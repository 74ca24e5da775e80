use crate::application_port::*;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: Url,
    pub token_url: Url,
    pub userinfo_url: Url,
    pub redirect_url: Url,
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
}

/// Authorization-code exchange against a standard OAuth 2 provider.
pub struct HttpOAuthProviderClient {
    cfg: OAuthProviderConfig,
    client: Client,
}

impl HttpOAuthProviderClient {
    pub fn new(cfg: OAuthProviderConfig, timeout: Duration) -> Result<Self, OAuthError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("turnstile/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OAuthError::Provider(e.to_string()))?;
        Ok(Self { cfg, client })
    }
}

#[async_trait::async_trait]
impl OAuthProviderClient for HttpOAuthProviderClient {
    fn name(&self) -> &str {
        &self.cfg.name
    }

    fn authorize_url(&self, state: &str) -> Result<Url, OAuthError> {
        let mut url = self.cfg.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.cfg.client_id)
            .append_pair("redirect_uri", self.cfg.redirect_url.as_str())
            .append_pair("scope", &self.cfg.scopes.join(" "))
            .append_pair("state", state);
        Ok(url)
    }

    async fn exchange_code(&self, code: &str) -> Result<serde_json::Value, OAuthError> {
        let response = self
            .client
            .post(self.cfg.token_url.clone())
            .header(ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.cfg.redirect_url.as_str()),
                ("client_id", self.cfg.client_id.as_str()),
                ("client_secret", self.cfg.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| OAuthError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::Provider(format!(
                "token endpoint: {} - {}",
                status, body
            )));
        }
        let token: TokenEndpointResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::Provider(e.to_string()))?;

        let response = self
            .client
            .get(self.cfg.userinfo_url.clone())
            .header(ACCEPT, "application/json")
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| OAuthError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(OAuthError::Provider(format!("userinfo endpoint: {}", status)));
        }
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| OAuthError::Provider(e.to_string()))
    }
}
