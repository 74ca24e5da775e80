use super::Subject;
use chrono::{DateTime, Utc};
use nanoid::nanoid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A verified identity returned by an OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthIdentity {
    pub provider: String,
    pub provider_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Handle for a pending account selection. Shaped `{unix_millis}:{nanoid}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkSessionId(pub String);

impl LinkSessionId {
    pub fn generate(now: DateTime<Utc>) -> Self {
        LinkSessionId(format!("{}:{}", now.timestamp_millis(), nanoid!()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinkSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EphemeralLinkSession {
    pub email: String,
    pub provider: String,
    pub provider_id: String,
    pub candidates: Vec<Subject>,
}

impl EphemeralLinkSession {
    pub fn identity(&self) -> OAuthIdentity {
        OAuthIdentity {
            provider: self.provider.clone(),
            provider_id: self.provider_id.clone(),
            email: self.email.clone(),
            display_name: None,
        }
    }
}
