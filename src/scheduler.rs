//! Update scheduler
//!
//! Runs the collect → summarize → publish pipeline for every configured key,
//! once immediately and then on a fixed interval until cancelled. Keys are
//! processed one after another; a failing key is logged and skipped for the
//! tick without affecting the others.

use crate::collector::Collector;
use crate::engine::{EngineConfig, KeyMapping, SummarizedValue};
use crate::error::{OracleError, OracleResult};
use crate::ledger::Publisher;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Outcome of one pass over all keys
#[derive(Debug, Clone)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub published: Vec<String>,
    /// Key and the reason it was skipped
    pub skipped: Vec<(String, String)>,
}

pub struct Scheduler {
    engine: Arc<EngineConfig>,
    collector: Collector,
    publisher: Arc<dyn Publisher>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        engine: Arc<EngineConfig>,
        collector: Collector,
        publisher: Arc<dyn Publisher>,
        interval: Duration,
    ) -> Self {
        Self {
            engine,
            collector,
            publisher,
            interval,
        }
    }

    /// Tick forever (until `cancel` fires)
    pub async fn run(&self, cancel: CancellationToken) {
        log::info!(
            "⏰ Starting oracle scheduler ({} keys, interval: {}s)",
            self.engine.mappings.len(),
            self.interval.as_secs()
        );

        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = timer.tick() => {}
            }

            let report = self.tick(&cancel).await;
            log::info!(
                "✅ Oracle update completed: {} published, {} skipped",
                report.published.len(),
                report.skipped.len()
            );

            if cancel.is_cancelled() {
                break;
            }
        }

        log::info!("🛑 Oracle scheduler stopped");
    }

    /// Process every key once
    pub async fn tick(&self, cancel: &CancellationToken) -> TickReport {
        let mut report = TickReport {
            started_at: Utc::now(),
            published: Vec::new(),
            skipped: Vec::new(),
        };
        log::info!("🔄 Oracle update started at {}", report.started_at.to_rfc3339());

        for mapping in &self.engine.mappings {
            if cancel.is_cancelled() {
                report.skipped.push((mapping.key.clone(), OracleError::Cancelled.to_string()));
                continue;
            }

            match self.update_key(mapping, cancel).await {
                Ok(value) => {
                    log::info!("📤 Published {} fields for {}", value.len(), mapping.key);
                    report.published.push(mapping.key.clone());
                }
                Err(e) => {
                    log::error!("⚠️  Skipping update for {}: {}", mapping.key, e);
                    report.skipped.push((mapping.key.clone(), e.to_string()));
                }
            }
        }

        report
    }

    async fn update_key(&self, mapping: &KeyMapping, cancel: &CancellationToken) -> OracleResult<SummarizedValue> {
        let samples = self.collector.collect(mapping, cancel).await?;
        let value = mapping.summarizer().summarize(&mapping.key, &samples)?;
        self.publisher.publish(&mapping.key, &value).await?;
        Ok(value)
    }
}
