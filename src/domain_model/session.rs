use super::{SubjectId, TokenId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-side proof that a refresh token id still belongs to an active login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub subject_id: SubjectId,
    pub email: String,
    pub refresh_token_id: TokenId,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
}

impl SessionRecord {
    pub fn new(
        subject_id: SubjectId,
        email: impl Into<String>,
        refresh_token_id: TokenId,
        device_info: Option<String>,
    ) -> Self {
        let now = Utc::now();
        SessionRecord {
            subject_id,
            email: email.into(),
            refresh_token_id,
            created_at: now,
            last_activity: now,
            device_info,
        }
    }

    /// The record that replaces `self` after rotation to `refresh_token_id`.
    pub fn rotated(&self, refresh_token_id: TokenId, email: &str) -> Self {
        SessionRecord {
            subject_id: self.subject_id,
            email: email.to_string(),
            refresh_token_id,
            created_at: self.created_at,
            last_activity: Utc::now(),
            device_info: self.device_info.clone(),
        }
    }
}
