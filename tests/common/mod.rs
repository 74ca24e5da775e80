#![allow(dead_code)]

use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use turnstile::application_impl::*;
use turnstile::application_port::*;
use turnstile::domain_model::*;
use turnstile::infra_memory::*;
use turnstile::server::Server;
use url::Url;

pub const PASSWORD: &str = "secret1";

pub struct FakeProvider {
    profile: Mutex<Value>,
}

impl FakeProvider {
    pub fn set_profile(&self, profile: Value) {
        if let Ok(mut lock) = self.profile.lock() {
            *lock = profile;
        }
    }
}

#[async_trait::async_trait]
impl OAuthProviderClient for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn authorize_url(&self, state: &str) -> Result<Url, OAuthError> {
        let mut url = Url::parse("https://provider.test/authorize").unwrap();
        url.query_pairs_mut().append_pair("state", state);
        Ok(url)
    }

    async fn exchange_code(&self, code: &str) -> Result<Value, OAuthError> {
        if code != "good-code" {
            return Err(OAuthError::Provider("bad code".to_string()));
        }
        Ok(self.profile.lock().unwrap().clone())
    }
}

pub struct TestApp {
    pub server: Arc<Server>,
    pub identity: Arc<MemoryIdentityBridge>,
    pub issuer: Arc<JwtTokenIssuer>,
    pub provider: Arc<FakeProvider>,
}

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        issuer: "turnstile.test".to_string(),
        audience: "turnstile-test-client".to_string(),
        access_ttl: Duration::from_secs(900),
        refresh_ttl: Duration::from_secs(3600),
        access_secret: b"test-access-signing-key".to_vec(),
        refresh_secret: b"test-refresh-signing-key".to_vec(),
    }
}

pub fn app() -> TestApp {
    let issuer = Arc::new(JwtTokenIssuer::try_new(jwt_config()).unwrap());
    let identity = Arc::new(MemoryIdentityBridge::with_low_cost());
    let coordinator: Arc<dyn AuthCoordinator> = Arc::new(RealAuthCoordinator::new(
        issuer.clone(),
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryRevocationStore::new()),
        Arc::new(MemoryLinkSessionStore::new()),
        identity.clone(),
        identity.clone(),
    ));
    let provider = Arc::new(FakeProvider {
        profile: Mutex::new(json!({ "sub": "p-1", "email": "oauth@x.com" })),
    });
    let oauth_flow = Arc::new(OAuthFlow::new(
        coordinator.clone(),
        vec![provider.clone() as Arc<dyn OAuthProviderClient>],
        OAuthStateSigner::new(b"test-oauth-state-key".to_vec(), Duration::from_secs(600)),
        Url::parse("http://app.test/auth/callback").unwrap(),
    ));

    TestApp {
        server: Arc::new(Server::new(coordinator, oauth_flow)),
        identity,
        issuer,
        provider,
    }
}

impl TestApp {
    pub async fn register(&self, email: &str, username: &str) -> AuthResponse {
        self.server
            .auth_coordinator
            .register(RegisterInput {
                email: email.to_string(),
                username: username.to_string(),
                password: PASSWORD.to_string(),
                device_info: None,
            })
            .await
            .unwrap()
    }

    /// A pair for `subject` whose access token expired five minutes ago.
    pub fn expired_pair(&self, subject: &Subject) -> TokenPair {
        let past = chrono::Utc::now() - chrono::Duration::minutes(20);
        self.issuer
            .issue_at(subject.id, &subject.email, past)
            .unwrap()
    }
}
