use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

struct Expiring<V> {
    value: V,
    expires_at: Instant,
}

/// Concurrent map whose entries vanish once their TTL has elapsed.
pub(crate) struct ExpiringMap<V> {
    entries: DashMap<String, Expiring<V>>,
}

impl<V: Clone> ExpiringMap<V> {
    pub(crate) fn new() -> Self {
        ExpiringMap {
            entries: DashMap::new(),
        }
    }

    pub(crate) fn insert(&self, key: String, value: V, ttl_secs: u64) {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries.insert(key, Expiring { value, expires_at });
    }

    pub(crate) fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        // the shard guard must be released before removing
        self.entries.remove_if(key, |_, e| e.expires_at <= now);
        None
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Returns whether a live entry was removed.
    pub(crate) fn remove(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .remove(key)
            .is_some_and(|(_, e)| e.expires_at > now)
    }

    pub(crate) fn values_with_prefix(&self, prefix: &str) -> Vec<V> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix) && entry.value().expires_at > now)
            .map(|entry| entry.value().value.clone())
            .collect()
    }

    pub(crate) fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before.saturating_sub(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let map = ExpiringMap::new();
        map.insert("a".to_string(), 1u32, 10);

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(map.get("a"), Some(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(map.get("a"), None);
        assert!(!map.remove("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired_entries() {
        let map = ExpiringMap::new();
        map.insert("short".to_string(), 1u32, 1);
        map.insert("long".to_string(), 2u32, 100);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(map.purge_expired(), 1);
        assert_eq!(map.values_with_prefix(""), vec![2]);
    }

    #[tokio::test]
    async fn remove_reports_live_entries_once() {
        let map = ExpiringMap::new();
        map.insert("k".to_string(), (), 60);
        assert!(map.remove("k"));
        assert!(!map.remove("k"));
    }
}
