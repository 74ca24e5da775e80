use super::Purgeable;
use super::expiring::ExpiringMap;
use crate::domain_model::*;
use crate::domain_port::*;

pub struct MemorySessionStore {
    sessions: ExpiringMap<SessionRecord>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        MemorySessionStore {
            sessions: ExpiringMap::new(),
        }
    }

    fn key(subject_id: SubjectId, token_id: &TokenId) -> String {
        format!("session:{}:{}", subject_id, token_id)
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(
        &self,
        subject_id: SubjectId,
        token_id: &TokenId,
        record: &SessionRecord,
        ttl_secs: u64,
    ) -> Result<(), StoreError> {
        self.sessions
            .insert(Self::key(subject_id, token_id), record.clone(), ttl_secs);
        Ok(())
    }

    async fn get(
        &self,
        subject_id: SubjectId,
        token_id: &TokenId,
    ) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.sessions.get(&Self::key(subject_id, token_id)))
    }

    async fn delete(&self, subject_id: SubjectId, token_id: &TokenId) -> Result<bool, StoreError> {
        Ok(self.sessions.remove(&Self::key(subject_id, token_id)))
    }

    async fn list_by_subject(&self, subject_id: SubjectId) -> Result<Vec<SessionRecord>, StoreError> {
        let prefix = format!("session:{}:", subject_id);
        Ok(self.sessions.values_with_prefix(&prefix))
    }
}

impl Purgeable for MemorySessionStore {
    fn purge_expired(&self) -> usize {
        self.sessions.purge_expired()
    }
}

pub struct MemoryRevocationStore {
    revoked: ExpiringMap<()>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        MemoryRevocationStore {
            revoked: ExpiringMap::new(),
        }
    }
}

impl Default for MemoryRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, token_id: &TokenId, ttl_secs: u64) -> Result<(), StoreError> {
        self.revoked.insert(format!("revoked:{}", token_id), (), ttl_secs);
        Ok(())
    }

    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        Ok(self.revoked.contains(&format!("revoked:{}", token_id)))
    }
}

impl Purgeable for MemoryRevocationStore {
    fn purge_expired(&self) -> usize {
        self.revoked.purge_expired()
    }
}

pub struct MemoryLinkSessionStore {
    sessions: ExpiringMap<EphemeralLinkSession>,
}

impl MemoryLinkSessionStore {
    pub fn new() -> Self {
        MemoryLinkSessionStore {
            sessions: ExpiringMap::new(),
        }
    }
}

impl Default for MemoryLinkSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LinkSessionStore for MemoryLinkSessionStore {
    async fn put(
        &self,
        id: &LinkSessionId,
        session: &EphemeralLinkSession,
        ttl_secs: u64,
    ) -> Result<(), StoreError> {
        self.sessions
            .insert(format!("oauth:{}", id), session.clone(), ttl_secs);
        Ok(())
    }

    async fn get(&self, id: &LinkSessionId) -> Result<Option<EphemeralLinkSession>, StoreError> {
        Ok(self.sessions.get(&format!("oauth:{}", id)))
    }

    async fn remove(&self, id: &LinkSessionId) -> Result<bool, StoreError> {
        Ok(self.sessions.remove(&format!("oauth:{}", id)))
    }
}

impl Purgeable for MemoryLinkSessionStore {
    fn purge_expired(&self) -> usize {
        self.sessions.purge_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject_id: SubjectId) -> SessionRecord {
        SessionRecord::new(subject_id, "a@x.com", TokenId::generate(), None)
    }

    #[tokio::test]
    async fn sessions_are_listed_per_subject() {
        let store = MemorySessionStore::new();
        let alice = SubjectId::new_random();
        let bob = SubjectId::new_random();

        let a1 = record(alice);
        let a2 = record(alice);
        let b1 = record(bob);
        for r in [&a1, &a2, &b1] {
            store
                .put(r.subject_id, &r.refresh_token_id, r, 60)
                .await
                .unwrap();
        }

        let mut listed = store.list_by_subject(alice).await.unwrap();
        listed.sort_by(|x, y| x.refresh_token_id.0.cmp(&y.refresh_token_id.0));
        let mut expected = vec![a1.clone(), a2.clone()];
        expected.sort_by(|x, y| x.refresh_token_id.0.cmp(&y.refresh_token_id.0));
        assert_eq!(listed, expected);

        assert!(store.delete(alice, &a1.refresh_token_id).await.unwrap());
        assert!(!store.delete(alice, &a1.refresh_token_id).await.unwrap());
        assert_eq!(store.list_by_subject(alice).await.unwrap(), vec![a2]);
    }

    #[tokio::test(start_paused = true)]
    async fn revocations_last_for_their_ttl() {
        let store = MemoryRevocationStore::new();
        let id = TokenId::generate();
        store.revoke(&id, 30).await.unwrap();
        assert!(store.is_revoked(&id).await.unwrap());

        tokio::time::advance(std::time::Duration::from_secs(31)).await;
        assert!(!store.is_revoked(&id).await.unwrap());
    }
}
