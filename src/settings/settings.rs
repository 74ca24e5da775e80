use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub http: Http,
    pub log: Log,
    pub store: Store,
    pub jwt: Jwt,
    pub identity: Identity,
    #[serde(default)]
    pub oauth: OAuth,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    #[serde(default)]
    pub cert_path: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "redis" or "memory"
    #[serde(default)]
    pub redis_dsn: String,
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

#[derive(Deserialize)]
pub struct Jwt {
    pub issuer: String,
    pub audience: String,
    pub access_secret: String,
    pub refresh_secret: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
}

impl fmt::Debug for Jwt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jwt")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
pub struct Identity {
    pub backend: String, // "http" or "memory"
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Deserialize)]
pub struct OAuth {
    #[serde(default = "default_frontend_redirect")]
    pub frontend_redirect: String,
    #[serde(default)]
    pub state_secret: String,
    #[serde(default = "default_link_ttl_secs")]
    pub link_ttl_secs: u64,
    #[serde(default)]
    pub providers: HashMap<String, OAuthProvider>,
}

impl Default for OAuth {
    fn default() -> Self {
        OAuth {
            frontend_redirect: default_frontend_redirect(),
            state_secret: String::new(),
            link_ttl_secs: default_link_ttl_secs(),
            providers: HashMap::new(),
        }
    }
}

impl fmt::Debug for OAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth")
            .field("frontend_redirect", &self.frontend_redirect)
            .field("link_ttl_secs", &self.link_ttl_secs)
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
pub struct OAuthProvider {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub redirect_url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

fn default_purge_interval_secs() -> u64 {
    30
}

fn default_access_ttl_secs() -> u64 {
    15 * 60
}

fn default_refresh_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_frontend_redirect() -> String {
    "http://localhost:3000/auth/callback".to_string()
}

fn default_link_ttl_secs() -> u64 {
    300
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Loads the TOML file at `path` (or the build profile's default), then
/// applies `TURNSTILE__SECTION__KEY` environment overrides.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix("TURNSTILE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
