use crate::domain_model::*;
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

pub struct RedisLinkSessionStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisLinkSessionStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisLinkSessionStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, id: &LinkSessionId) -> String {
        link_key(&self.prefix, id)
    }
}

fn link_key(prefix: &str, id: &LinkSessionId) -> String {
    format!("{}:{}", prefix, id)
}

#[async_trait::async_trait]
impl LinkSessionStore for RedisLinkSessionStore {
    async fn put(
        &self,
        id: &LinkSessionId,
        session: &EphemeralLinkSession,
        ttl_secs: u64,
    ) -> Result<(), StoreError> {
        let key = self.key(id);
        let json = serde_json::to_string(session).map_err(|e| StoreError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(&key, json, ttl_secs)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, id: &LinkSessionId) -> Result<Option<EphemeralLinkSession>, StoreError> {
        let key = self.key(id);
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        raw.map(|s| {
            serde_json::from_str(&s).map_err(|e| StoreError::Corrupt {
                key: key.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
    }

    async fn remove(&self, id: &LinkSessionId) -> Result<bool, StoreError> {
        let key = self.key(id);
        let mut conn = self.conn.clone();
        // DEL reports the count, so exactly one concurrent caller sees 1
        let removed: i64 = conn
            .del(&key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(removed == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_key_keeps_the_whole_session_id() {
        let id = LinkSessionId("1700000000000:abc".to_string());
        assert_eq!(link_key("oauth", &id), "oauth:1700000000000:abc");
    }
}
