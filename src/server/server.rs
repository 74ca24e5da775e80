use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_http::*;
use crate::infra_memory::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{self, Settings};
use anyhow::anyhow;
use nanoid::nanoid;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

impl From<&settings::Jwt> for JwtConfig {
    fn from(jwt: &settings::Jwt) -> Self {
        JwtConfig {
            issuer: jwt.issuer.clone(),
            audience: jwt.audience.clone(),
            access_ttl: Duration::from_secs(jwt.access_ttl_secs),
            refresh_ttl: Duration::from_secs(jwt.refresh_ttl_secs),
            access_secret: jwt.access_secret.clone().into_bytes(),
            refresh_secret: jwt.refresh_secret.clone().into_bytes(),
        }
    }
}

type Stores = (
    Arc<dyn SessionStore>,
    Arc<dyn RevocationStore>,
    Arc<dyn LinkSessionStore>,
);

pub struct Server {
    pub auth_coordinator: Arc<dyn AuthCoordinator>,
    pub oauth_flow: Arc<OAuthFlow>,
    purge_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Server {
    /// Assembles a server from ready-made parts, with no background tasks.
    pub fn new(auth_coordinator: Arc<dyn AuthCoordinator>, oauth_flow: Arc<OAuthFlow>) -> Self {
        Self {
            auth_coordinator,
            oauth_flow,
            purge_handle: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let token_issuer: Arc<dyn TokenIssuer> =
            Arc::new(JwtTokenIssuer::try_new(JwtConfig::from(&settings.jwt))?);

        let mut purge_targets: Vec<Arc<dyn Purgeable>> = Vec::new();
        let (session_store, revocation_store, link_session_store): Stores =
            match settings.store.backend.as_str() {
                "redis" => {
                    let redis_client = redis::Client::open(settings.store.redis_dsn.as_str())?;
                    let redis_manager = redis_client.get_connection_manager().await?;
                    (
                        Arc::new(RedisSessionStore::new(redis_manager.clone(), "session")),
                        Arc::new(RedisRevocationStore::new(redis_manager.clone(), "revoked")),
                        Arc::new(RedisLinkSessionStore::new(redis_manager, "oauth")),
                    )
                }
                "memory" => {
                    let sessions = Arc::new(MemorySessionStore::new());
                    let revocations = Arc::new(MemoryRevocationStore::new());
                    let links = Arc::new(MemoryLinkSessionStore::new());
                    purge_targets.push(sessions.clone());
                    purge_targets.push(revocations.clone());
                    purge_targets.push(links.clone());
                    (sessions, revocations, links)
                }
                other => return Err(anyhow!("Unknown store backend: {}", other)),
            };

        let timeout = Duration::from_secs(settings.identity.timeout_secs);
        let (identity_bridge, subject_directory): (
            Arc<dyn IdentityBridge>,
            Arc<dyn SubjectDirectory>,
        ) = match settings.identity.backend.as_str() {
            "http" => {
                let bridge = Arc::new(HttpIdentityBridge::new(
                    &settings.identity.base_url,
                    timeout,
                )?);
                (bridge.clone(), bridge)
            }
            "memory" => {
                warn!("memory identity backend in use, accounts are lost on restart");
                let bridge = Arc::new(MemoryIdentityBridge::new());
                (bridge.clone(), bridge)
            }
            other => return Err(anyhow!("Unknown identity backend: {}", other)),
        };

        let auth_coordinator: Arc<dyn AuthCoordinator> = Arc::new(
            RealAuthCoordinator::new(
                token_issuer,
                session_store,
                revocation_store,
                link_session_store,
                identity_bridge,
                subject_directory,
            )
            .with_link_ttl(Duration::from_secs(settings.oauth.link_ttl_secs)),
        );

        let oauth_flow = Arc::new(Self::oauth_flow(
            &settings.oauth,
            auth_coordinator.clone(),
            timeout,
        )?);

        let cancel = CancellationToken::new();
        let purge_handle = if purge_targets.is_empty() {
            None
        } else {
            let task = PurgeTask::new(
                purge_targets,
                Duration::from_secs(settings.store.purge_interval_secs.max(1)),
                cancel.clone(),
            );
            Some(tokio::spawn(async move {
                task.run().await;
            }))
        };

        info!(
            store = %settings.store.backend,
            identity = %settings.identity.backend,
            "server started"
        );

        Ok(Self {
            auth_coordinator,
            oauth_flow,
            purge_handle: Mutex::new(purge_handle),
            cancel,
        })
    }

    fn oauth_flow(
        oauth: &settings::OAuth,
        coordinator: Arc<dyn AuthCoordinator>,
        timeout: Duration,
    ) -> anyhow::Result<OAuthFlow> {
        let mut providers: Vec<Arc<dyn OAuthProviderClient>> = Vec::new();
        for (name, p) in &oauth.providers {
            let cfg = OAuthProviderConfig {
                name: name.clone(),
                client_id: p.client_id.clone(),
                client_secret: p.client_secret.clone(),
                authorize_url: Url::parse(&p.authorize_url)?,
                token_url: Url::parse(&p.token_url)?,
                userinfo_url: Url::parse(&p.userinfo_url)?,
                redirect_url: Url::parse(&p.redirect_url)?,
                scopes: p.scopes.clone(),
            };
            providers.push(Arc::new(HttpOAuthProviderClient::new(cfg, timeout)?));
            info!(provider = %name, "oauth provider configured");
        }

        let state_secret = if oauth.state_secret.is_empty() {
            if !providers.is_empty() {
                return Err(anyhow!("oauth.state_secret is required when providers are configured"));
            }
            nanoid!(32).into_bytes()
        } else {
            oauth.state_secret.clone().into_bytes()
        };

        Ok(OAuthFlow::new(
            coordinator,
            providers,
            OAuthStateSigner::new(state_secret, Duration::from_secs(600)),
            Url::parse(&oauth.frontend_redirect)?,
        ))
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");
        self.cancel.cancel();

        let handle = self.purge_handle.lock().ok().and_then(|mut lock| lock.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("purge task stopped: {:?}", r);
        }
    }
}
