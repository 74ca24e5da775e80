use super::refresher::Envelope;
use super::*;
use crate::application_port::AuthResponse;
use crate::domain_model::AccessToken;
use crate::logger::*;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub refresh_path: String,
    /// Path prefixes that never trigger a refresh on 401.
    pub credential_paths: Vec<String>,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        ClientConfig {
            base_url,
            timeout: Duration::from_secs(10),
            refresh_path: "/api/v1/refresh".to_string(),
            credential_paths: vec![
                "/api/v1/login".to_string(),
                "/api/v1/register".to_string(),
                "/api/v1/password".to_string(),
            ],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Refresh(#[from] RefreshError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bad url: {0}")]
    Url(#[from] url::ParseError),
    #[error("{status}: {code} {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("request body could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("response carried no data")]
    Empty,
}

/// HTTP client that attaches the stored access token and recovers from
/// expiry by refreshing once and replaying the request.
pub struct ApiClient {
    http: Client,
    config: ClientConfig,
    storage: Arc<dyn TokenStorage>,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(
        config: ClientConfig,
        storage: Arc<dyn TokenStorage>,
        listener: Arc<dyn SessionListener>,
    ) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        let refresh_url = config.base_url.join(&config.refresh_path)?;
        let refresher = Arc::new(HttpTokenRefresher::new(http.clone(), refresh_url));
        Ok(Self::with_refresher(http, config, storage, refresher, listener))
    }

    pub fn with_refresher(
        http: Client,
        config: ClientConfig,
        storage: Arc<dyn TokenStorage>,
        refresher: Arc<dyn TokenRefresher>,
        listener: Arc<dyn SessionListener>,
    ) -> Self {
        let coordinator = RefreshCoordinator::new(storage.clone(), refresher, listener);
        Self {
            http,
            config,
            storage,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    fn triggers_refresh(&self, path: &str) -> bool {
        path != self.config.refresh_path
            && !self
                .config
                .credential_paths
                .iter()
                .any(|p| path.starts_with(p.as_str()))
    }

    async fn dispatch(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
        token: Option<&AccessToken>,
    ) -> Result<Response, ClientError> {
        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token.0));
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Sends one request, refreshing and replaying it once if the access token was rejected.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Response, ClientError> {
        let url = self.config.base_url.join(path)?;
        let sent_with = self.storage.load().map(|t| t.access_token);
        let response = self
            .dispatch(&method, &url, body.as_ref(), sent_with.as_ref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED
            || sent_with.is_none()
            || !self.triggers_refresh(path)
        {
            return Ok(response);
        }

        debug!(path, "access token rejected, refreshing");
        let token = self
            .coordinator
            .fresh_access_token(sent_with.as_ref())
            .await?;
        self.dispatch(&method, &url, body.as_ref(), Some(&token))
            .await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        let envelope: Envelope<T> = response.json().await?;
        if !status.is_success() {
            let (code, message) = envelope
                .error
                .map(|e| (e.code, e.message))
                .unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }
        envelope.data.ok_or(ClientError::Empty)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        Self::parse(self.send(Method::GET, path, None).await?).await
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_value(body)?;
        Self::parse(self.send(Method::POST, path, Some(body)).await?).await
    }

    /// Logs in and keeps the issued pair for subsequent requests.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let response: AuthResponse = self
            .post_json(
                "/api/v1/login",
                &json!({ "identifier": identifier, "password": password }),
            )
            .await?;
        self.storage.store(response.tokens.clone().into());
        Ok(response)
    }

    /// Ends the stored session server-side and forgets it locally.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if let Some(tokens) = self.storage.load() {
            self.send(
                Method::POST,
                "/api/v1/logout",
                Some(json!({ "refreshToken": tokens.refresh_token.0 })),
            )
            .await?;
        }
        self.storage.clear();
        Ok(())
    }
}
