//! Tenant-scoped store for [`RelevanceMetrics`] and the stability-history
//! snapshots the decay maintenance job appends.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::domain::RelevanceMetrics;
use crate::error::Result;

use super::MetricsStore;

#[derive(Default)]
struct TenantMetrics {
    by_id: HashMap<String, RelevanceMetrics>,
    order: Vec<String>,
    history: Vec<(String, f64, DateTime<Utc>)>,
}

/// In-memory `MetricsStore`, sufficient for a single-process deployment and
/// for tests; swappable behind the trait for a durable backend later.
pub struct InMemoryMetricsStore {
    tenants: RwLock<HashMap<String, TenantMetrics>>,
}

impl InMemoryMetricsStore {
    pub fn new() -> Self {
        Self { tenants: RwLock::new(HashMap::new()) }
    }
}

impl Default for InMemoryMetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsStore for InMemoryMetricsStore {
    async fn upsert(&self, tenant_id: &str, metrics: &RelevanceMetrics) -> Result<()> {
        let mut tenants = self.tenants.write().unwrap();
        let tenant = tenants.entry(tenant_id.to_string()).or_default();
        if !tenant.by_id.contains_key(&metrics.content_id) {
            tenant.order.push(metrics.content_id.clone());
        }
        tenant.by_id.insert(metrics.content_id.clone(), metrics.clone());
        Ok(())
    }

    async fn get(&self, tenant_id: &str, content_id: &str) -> Result<Option<RelevanceMetrics>> {
        let tenants = self.tenants.read().unwrap();
        Ok(tenants.get(tenant_id).and_then(|t| t.by_id.get(content_id).cloned()))
    }

    async fn list_batch(&self, tenant_id: &str, offset: usize, limit: usize) -> Result<Vec<RelevanceMetrics>> {
        let tenants = self.tenants.read().unwrap();
        let Some(tenant) = tenants.get(tenant_id) else {
            return Ok(Vec::new());
        };
        Ok(tenant
            .order
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| tenant.by_id.get(id).cloned())
            .collect())
    }

    async fn update_retrievability(&self, tenant_id: &str, content_id: &str, retrievability: f64) -> Result<()> {
        let mut tenants = self.tenants.write().unwrap();
        if let Some(tenant) = tenants.get_mut(tenant_id) {
            if let Some(metrics) = tenant.by_id.get_mut(content_id) {
                metrics.retrievability = retrievability;
            }
        }
        Ok(())
    }

    async fn record_stability_snapshot(
        &self,
        tenant_id: &str,
        content_id: &str,
        stability: f64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tenants = self.tenants.write().unwrap();
        let tenant = tenants.entry(tenant_id.to_string()).or_default();
        tenant.history.push((content_id.to_string(), stability, at));
        Ok(())
    }
}
