use super::{OAuthStateSigner, verify_oauth_identity};
use crate::application_port::*;
use crate::logger::*;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum CallbackError {
    #[error("provider denied the request: {0}")]
    Denied(String),
    #[error(transparent)]
    OAuth(#[from] OAuthError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl CallbackError {
    fn code(&self) -> &'static str {
        match self {
            CallbackError::Denied(_) => "access_denied",
            CallbackError::OAuth(OAuthError::InvalidState) => "invalid_state",
            CallbackError::OAuth(OAuthError::UnknownProvider(_)) => "unknown_provider",
            CallbackError::OAuth(OAuthError::UnverifiedEmail) => "unverified_email",
            CallbackError::OAuth(OAuthError::MissingField(_)) => "incomplete_profile",
            CallbackError::OAuth(OAuthError::Provider(_)) => "provider_error",
            CallbackError::Auth(AuthError::UpstreamUnavailable(_)) => "upstream_unavailable",
            CallbackError::Auth(_) => "oauth_failed",
        }
    }
}

/// Browser-facing half of the OAuth login: redirect out, then turn the
/// provider's callback into a redirect back to the frontend.
pub struct OAuthFlow {
    coordinator: Arc<dyn AuthCoordinator>,
    providers: HashMap<String, Arc<dyn OAuthProviderClient>>,
    state_signer: OAuthStateSigner,
    frontend_redirect: Url,
}

impl OAuthFlow {
    pub fn new(
        coordinator: Arc<dyn AuthCoordinator>,
        providers: Vec<Arc<dyn OAuthProviderClient>>,
        state_signer: OAuthStateSigner,
        frontend_redirect: Url,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();
        Self {
            coordinator,
            providers,
            state_signer,
            frontend_redirect,
        }
    }

    fn provider(&self, name: &str) -> Result<&Arc<dyn OAuthProviderClient>, OAuthError> {
        self.providers
            .get(name)
            .ok_or_else(|| OAuthError::UnknownProvider(name.to_string()))
    }

    pub fn authorization_url(&self, provider: &str) -> Result<Url, AuthError> {
        let client = self.provider(provider)?;
        let state = self.state_signer.issue(provider)?;
        Ok(client.authorize_url(&state)?)
    }

    /// Always yields a frontend URL; failures travel as an `error` query parameter.
    pub async fn callback(&self, provider: &str, params: CallbackParams) -> Url {
        let mut url = self.frontend_redirect.clone();
        match self.complete(provider, params).await {
            Ok(OAuthOutcome::Authenticated(response)) => {
                url.query_pairs_mut()
                    .append_pair("accessToken", &response.tokens.access_token.0)
                    .append_pair("refreshToken", &response.tokens.refresh_token.0);
            }
            Ok(OAuthOutcome::SelectAccount { session_id }) => {
                url.query_pairs_mut()
                    .append_pair("selectAccount", "true")
                    .append_pair("sessionId", session_id.as_str());
            }
            Err(e) => {
                warn!(provider, error = %e, "oauth callback failed");
                url.query_pairs_mut().append_pair("error", e.code());
            }
        }
        url
    }

    async fn complete(
        &self,
        provider: &str,
        params: CallbackParams,
    ) -> Result<OAuthOutcome, CallbackError> {
        if let Some(error) = params.error {
            return Err(CallbackError::Denied(error));
        }
        let client = self.provider(provider)?;
        let state = params.state.unwrap_or_default();
        self.state_signer.verify(provider, &state)?;

        let code = params
            .code
            .filter(|c| !c.is_empty())
            .ok_or(OAuthError::MissingField("code"))?;
        let profile = client.exchange_code(&code).await?;
        let identity = verify_oauth_identity(provider, &profile)?;

        debug!(provider, provider_id = %identity.provider_id, "oauth identity verified");
        Ok(self.coordinator.link_oauth_identity(identity).await?)
    }
}
