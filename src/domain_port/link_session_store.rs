use super::StoreError;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait LinkSessionStore: Send + Sync {
    async fn put(
        &self,
        id: &LinkSessionId,
        session: &EphemeralLinkSession,
        ttl_secs: u64,
    ) -> Result<(), StoreError>;

    async fn get(&self, id: &LinkSessionId) -> Result<Option<EphemeralLinkSession>, StoreError>;

    /// Returns `true` only for the caller that actually removed the entry.
    async fn remove(&self, id: &LinkSessionId) -> Result<bool, StoreError>;
}
