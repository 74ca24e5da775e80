use crate::domain_model::*;
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Sessions live under `{prefix}:{subject}:{jti}`; `{prefix}-index:{subject}`
/// tracks the jtis of one subject for `list_by_subject`.
pub struct RedisSessionStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisSessionStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, subject_id: SubjectId, token_id: &str) -> String {
        session_key(&self.prefix, subject_id, token_id)
    }

    fn index_key(&self, subject_id: SubjectId) -> String {
        index_key(&self.prefix, subject_id)
    }
}

fn session_key(prefix: &str, subject_id: SubjectId, token_id: &str) -> String {
    format!("{}:{}:{}", prefix, subject_id, token_id)
}

fn index_key(prefix: &str, subject_id: SubjectId) -> String {
    format!("{}-index:{}", prefix, subject_id)
}

fn backend(e: redis::RedisError) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn parse_record(key: &str, raw: &str) -> Result<SessionRecord, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(
        &self,
        subject_id: SubjectId,
        token_id: &TokenId,
        record: &SessionRecord,
        ttl_secs: u64,
    ) -> Result<(), StoreError> {
        let key = self.key(subject_id, token_id.as_str());
        let index = self.index_key(subject_id);
        let json = serde_json::to_string(record).map_err(|e| StoreError::Corrupt {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .set_ex(&key, json, ttl_secs)
            .ignore()
            .sadd(&index, token_id.as_str())
            .ignore()
            .expire(&index, ttl_secs as i64)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get(
        &self,
        subject_id: SubjectId,
        token_id: &TokenId,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let key = self.key(subject_id, token_id.as_str());
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await.map_err(backend)?;
        raw.map(|s| parse_record(&key, &s)).transpose()
    }

    async fn delete(&self, subject_id: SubjectId, token_id: &TokenId) -> Result<bool, StoreError> {
        let key = self.key(subject_id, token_id.as_str());
        let index = self.index_key(subject_id);
        let mut conn = self.conn.clone();
        let (removed, _): (i64, i64) = redis::pipe()
            .atomic()
            .del(&key)
            .srem(&index, token_id.as_str())
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(removed > 0)
    }

    async fn list_by_subject(&self, subject_id: SubjectId) -> Result<Vec<SessionRecord>, StoreError> {
        let index = self.index_key(subject_id);
        let mut conn = self.conn.clone();
        let token_ids: Vec<String> = conn.smembers(&index).await.map_err(backend)?;

        let mut records = Vec::with_capacity(token_ids.len());
        let mut stale = Vec::new();
        for token_id in token_ids {
            let key = self.key(subject_id, &token_id);
            let raw: Option<String> = conn.get(&key).await.map_err(backend)?;
            match raw {
                Some(s) => records.push(parse_record(&key, &s)?),
                None => stale.push(token_id),
            }
        }
        if !stale.is_empty() {
            let _: () = conn.srem(&index, &stale).await.map_err(backend)?;
        }
        Ok(records)
    }
}
