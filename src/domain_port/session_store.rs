use super::StoreError;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Upsert the session for `(subject_id, token_id)`, expiring after `ttl_secs`.
    async fn put(
        &self,
        subject_id: SubjectId,
        token_id: &TokenId,
        record: &SessionRecord,
        ttl_secs: u64,
    ) -> Result<(), StoreError>;

    async fn get(
        &self,
        subject_id: SubjectId,
        token_id: &TokenId,
    ) -> Result<Option<SessionRecord>, StoreError>;

    /// Returns whether a record was removed. Deleting a missing record is not an error.
    async fn delete(&self, subject_id: SubjectId, token_id: &TokenId) -> Result<bool, StoreError>;

    async fn list_by_subject(&self, subject_id: SubjectId) -> Result<Vec<SessionRecord>, StoreError>;
}
