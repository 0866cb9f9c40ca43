//! Cache refresh loop
//!
//! Refreshes the resource cache right away and then on every tick. Runs as
//! a single task, so two updates never overlap.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use broadcaster_client::Clusters;

use super::cache::ResourceCache;

/// Periodically pulls the clusters' inventory into the cache
pub struct CacheRefresher {
    cache: Arc<ResourceCache>,
    clusters: Arc<Clusters>,
    interval: Duration,
}

impl CacheRefresher {
    pub fn new(cache: Arc<ResourceCache>, clusters: Arc<Clusters>, interval: Duration) -> Self {
        Self {
            cache,
            clusters,
            interval,
        }
    }

    /// Refresh until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval = ?self.interval, "starting resource cache");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.cache.update(&self.clusters) => {
                    if let Err(e) = result {
                        error!("failed to update cache: {}", e);
                    }
                }
            }
        }

        info!("resource cache stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let refresher = CacheRefresher::new(
            Arc::new(ResourceCache::new()),
            Arc::new(Clusters::default()),
            Duration::from_secs(3600),
        );
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(refresher.run(shutdown.clone()));

        // Let the immediate first refresh happen.
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("refresher did not stop")
            .unwrap();
    }
}
