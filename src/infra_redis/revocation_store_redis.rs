use crate::domain_model::TokenId;
use crate::domain_port::*;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

pub struct RedisRevocationStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisRevocationStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisRevocationStore {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key(&self, token_id: &TokenId) -> String {
        revocation_key(&self.prefix, token_id)
    }
}

fn revocation_key(prefix: &str, token_id: &TokenId) -> String {
    format!("{}:{}", prefix, token_id)
}

#[async_trait::async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn revoke(&self, token_id: &TokenId, ttl_secs: u64) -> Result<(), StoreError> {
        let key = self.key(token_id);
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(&key, "1", ttl_secs)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool, StoreError> {
        let key = self.key(token_id);
        let mut conn = self.conn.clone();
        let exists: bool = conn
            .exists(&key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revocation_key_is_prefixed_jti() {
        assert_eq!(
            revocation_key("revoked", &TokenId("jti-1".to_string())),
            "revoked:jti-1"
        );
    }
}
