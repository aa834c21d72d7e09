//! Bounded fan-out of pull request lookups with a TTL cache in front.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use super::cache::TtlCache;
use super::github::PrStatusSource;
use super::models::{Agent, PrStatus};

pub struct PrStatusFetcher {
    source: Arc<dyn PrStatusSource>,
    cache: TtlCache<String, PrStatus>,
    batch_size: usize,
}

impl PrStatusFetcher {
    pub fn new(source: Arc<dyn PrStatusSource>, ttl: Duration, batch_size: usize) -> Self {
        Self::with_cache(source, TtlCache::new(ttl), batch_size)
    }

    pub fn with_cache(
        source: Arc<dyn PrStatusSource>,
        cache: TtlCache<String, PrStatus>,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            cache,
            batch_size: batch_size.max(1),
        }
    }

    /// PR status for every agent that has a PR URL, keyed by agent id.
    ///
    /// At most `batch_size` lookups are in flight at once. Agents whose
    /// lookup fails or yields nothing are absent from the result. Expired
    /// cache entries are dropped first so PRs no longer on the board do not
    /// accumulate.
    pub async fn fetch_all(&self, agents: &[Agent]) -> HashMap<String, PrStatus> {
        let purged = self.cache.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, cached = self.cache.len(), "evicted expired PR statuses");
        }
        let mut statuses = HashMap::new();
        let mut pending: Vec<(&str, &str)> = Vec::new();

        for agent in agents {
            let Some(url) = agent.pr_url() else { continue };
            match self.cache.get(&url.to_string()) {
                Some(status) => {
                    statuses.insert(agent.id.clone(), status);
                }
                None => pending.push((agent.id.as_str(), url)),
            }
        }

        for batch in pending.chunks(self.batch_size) {
            let results = join_all(batch.iter().map(|(id, url)| async move {
                (*id, *url, self.source.fetch(url).await)
            }))
            .await;

            for (id, url, result) in results {
                match result {
                    Ok(Some(status)) => {
                        self.cache.set(url.to_string(), status.clone());
                        statuses.insert(id.to_string(), status);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(
                            agent_id = id,
                            pr_url = url,
                            error = %e,
                            "PR status lookup failed"
                        );
                    }
                }
            }
        }

        statuses
    }
}
