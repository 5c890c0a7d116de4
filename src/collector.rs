//! Collector - concurrent fan-out over a key's sources
//!
//! One task per source, bounded by a shared semaphore. The first failure
//! decides the result, but every spawned task is still joined before
//! `collect` returns so nothing leaks into the next tick.

use crate::engine::{KeyMapping, SampleSet};
use crate::error::{OracleError, OracleResult};
use crate::extract::{self, SourceFetcher};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub struct Collector {
    fetcher: Arc<dyn SourceFetcher>,
    permits: Arc<Semaphore>,
}

impl Collector {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, max_concurrent_fetches: usize) -> Self {
        Self {
            fetcher,
            permits: Arc::new(Semaphore::new(max_concurrent_fetches.max(1))),
        }
    }

    /// Fetch every source of `mapping`, failing fast on the first error
    ///
    /// Returns one sample per source (in completion order) or the first
    /// error observed. Results arriving after a failure are discarded.
    pub async fn collect(&self, mapping: &KeyMapping, cancel: &CancellationToken) -> OracleResult<SampleSet> {
        let mut tasks = JoinSet::new();

        for source in mapping.sources.iter().cloned() {
            let fetcher = self.fetcher.clone();
            let permits = self.permits.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let url = source.url.clone();
                let result = tokio::select! {
                    _ = cancel.cancelled() => Err(OracleError::Cancelled),
                    result = async {
                        let _permit = permits
                            .acquire_owned()
                            .await
                            .map_err(|e| OracleError::Task(e.to_string()))?;
                        extract::fetch_sample(fetcher.as_ref(), &source)
                            .await
                            .map_err(OracleError::from)
                    } => result,
                };
                (url, result)
            });
        }

        let mut samples = SampleSet::with_capacity(mapping.sources.len());
        let mut first_error: Option<OracleError> = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((url, Ok(sample))) => {
                    if first_error.is_none() {
                        log::info!("📥 Retrieved {:?} from {} for {}", sample, url, mapping.key);
                        samples.push(sample);
                    } else {
                        log::debug!("Discarding late result from {} for {}", url, mapping.key);
                    }
                }
                Ok((url, Err(e))) => {
                    log::error!("❌ Could not retrieve information from {} for {}: {}", url, mapping.key, e);
                    first_error.get_or_insert(e);
                }
                Err(join_error) => {
                    log::error!("❌ Source task for {} failed: {}", mapping.key, join_error);
                    first_error.get_or_insert(OracleError::Task(join_error.to_string()));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(samples),
        }
    }
}
