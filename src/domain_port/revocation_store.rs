use super::StoreError;
use crate::domain_model::TokenId;

/// Append-only blacklist of token ids. Entries leave only through expiry.
#[async_trait::async_trait]
pub trait RevocationStore: Send + Sync {
    async fn revoke(&self, token_id: &TokenId, ttl_secs: u64) -> Result<(), StoreError>;
    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool, StoreError>;
}
