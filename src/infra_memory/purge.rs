use crate::logger::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub trait Purgeable: Send + Sync {
    /// Drops expired entries, returning how many were removed.
    fn purge_expired(&self) -> usize;
}

/// Periodically sweeps memory stores so expired sessions do not pile up.
pub struct PurgeTask {
    targets: Vec<Arc<dyn Purgeable>>,
    every: Duration,
    cancellation_token: CancellationToken,
}

impl PurgeTask {
    pub fn new(
        targets: Vec<Arc<dyn Purgeable>>,
        every: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            targets,
            every,
            cancellation_token,
        }
    }

    pub fn purge_once(&self) -> usize {
        self.targets.iter().map(|t| t.purge_expired()).sum()
    }

    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    info!("purge task shutting down...");
                    break;
                }
                _ = interval.tick() => {
                    let purged = self.purge_once();
                    if purged > 0 {
                        debug!(purged, "expired entries purged");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::TokenId;
    use crate::domain_port::RevocationStore;
    use crate::infra_memory::MemoryRevocationStore;

    #[tokio::test(start_paused = true)]
    async fn run_purges_until_cancelled() {
        let store = Arc::new(MemoryRevocationStore::new());
        store.revoke(&TokenId::generate(), 1).await.unwrap();

        let cancel = CancellationToken::new();
        let task = PurgeTask::new(
            vec![store.clone() as Arc<dyn Purgeable>],
            Duration::from_secs(5),
            cancel.clone(),
        );
        let handle = tokio::spawn(async move { task.run().await });

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(store.purge_expired(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }
}
