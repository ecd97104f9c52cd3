//! Decay maintenance batch job: periodically refreshes `retrievability` for
//! every content node in a tenant, snapshotting stability history and
//! invalidating stale relevance caches.
//!
//! Runs as a single dedicated worker (concurrency 1, per §5) draining a
//! durable queue; retries are bounded and exponential.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::config::{Config, DecayJobConfig};
use crate::decay;
use crate::error::Result;
use crate::relevance::cache::RelevanceScoreCache;
use crate::stores::{Cache, MetricsStore, Queue};

pub const JOB_TYPE: &str = "decay_maintenance";

/// Summary of one batch's work, as reported in job progress.
#[derive(Debug, Clone, Default)]
pub struct DecaySummary {
    pub updated_count: u64,
    pub avg_retrievability: f64,
    pub min_retrievability: f64,
    pub max_retrievability: f64,
    pub processing_ms: u64,
}

/// Drains `JOB_TYPE` jobs from a durable queue, one at a time.
pub struct DecayMaintenanceWorker {
    queue: Arc<dyn Queue>,
    metrics: Arc<dyn MetricsStore>,
    score_cache: RelevanceScoreCache,
    config: DecayJobConfig,
    tau_hours: f64,
}

impl DecayMaintenanceWorker {
    pub fn new(config: &Config, queue: Arc<dyn Queue>, metrics: Arc<dyn MetricsStore>, cache: Arc<dyn Cache>) -> Self {
        Self {
            queue,
            metrics,
            score_cache: RelevanceScoreCache::new(cache),
            config: config.decay_job,
            tau_hours: config.decay.tau_hours,
        }
    }

    /// Enqueues one decay-maintenance job for `tenant_id`.
    pub async fn schedule(&self, tenant_id: &str) -> Result<String> {
        self.queue
            .enqueue(JOB_TYPE, serde_json::json!({ "tenant_id": tenant_id }), self.config.max_retries + 1)
            .await
    }

    /// Leases and runs one job, if any is pending. Returns `None` when the
    /// queue has nothing to do.
    pub async fn run_once(&self) -> Result<Option<DecaySummary>> {
        let Some(job) = self.queue.lease_next(JOB_TYPE).await? else {
            return Ok(None);
        };

        let tenant_id = job.payload.get("tenant_id").and_then(|v| v.as_str()).unwrap_or_default().to_string();

        match self.process_tenant(&tenant_id).await {
            Ok(summary) => {
                self.queue.complete(&job.id).await?;
                Ok(Some(summary))
            }
            Err(err) => {
                self.queue.fail(&job.id, &err.to_string()).await?;
                Err(err)
            }
        }
    }

    /// Batch-updates retrievability for every node in `tenant_id`, reporting
    /// progress at 10/90/100% via `tracing` spans.
    async fn process_tenant(&self, tenant_id: &str) -> Result<DecaySummary> {
        let start = Instant::now();
        let now = Utc::now();

        tracing::info!(tenant_id, progress = 10, "decay maintenance starting");

        let mut offset = 0;
        let mut updated_count = 0u64;
        let mut sum_r = 0.0;
        let mut min_r = f64::MAX;
        let mut max_r = f64::MIN;

        loop {
            let batch = self.metrics.list_batch(tenant_id, offset, self.config.batch_size).await?;
            if batch.is_empty() {
                break;
            }
            let batch_len = batch.len();

            for metrics in &batch {
                let hours = metrics.hours_since_access(now);
                let importance = metrics.ai_importance.unwrap_or(0.0);
                let r = decay::retrievability(metrics.stability, hours, importance, self.tau_hours);

                self.metrics.update_retrievability(tenant_id, &metrics.content_id, r).await?;
                self.metrics.record_stability_snapshot(tenant_id, &metrics.content_id, metrics.stability, now).await?;

                sum_r += r;
                min_r = min_r.min(r);
                max_r = max_r.max(r);
                updated_count += 1;
            }

            offset += batch_len;
            if batch_len < self.config.batch_size {
                break;
            }
        }

        self.score_cache.invalidate_tenant(tenant_id).await?;

        tracing::info!(tenant_id, progress = 90, updated_count, "decay maintenance batch-updated, invalidating cache");

        let summary = DecaySummary {
            updated_count,
            avg_retrievability: if updated_count > 0 { sum_r / updated_count as f64 } else { 0.0 },
            min_retrievability: if updated_count > 0 { min_r } else { 0.0 },
            max_retrievability: if updated_count > 0 { max_r } else { 0.0 },
            processing_ms: start.elapsed().as_millis() as u64,
        };

        tracing::info!(tenant_id, progress = 100, updated_count, "decay maintenance complete");

        Ok(summary)
    }
}
