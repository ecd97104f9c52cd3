//! Shared harness for the end-to-end suites: a fully in-memory `NexusCore`
//! wired exactly like the CLI wires a durable one, just with every adapter
//! swapped for its in-memory or in-memory-SQLite form.

use std::sync::Arc;

use nexus_core::config::Config;
use nexus_core::domain::TenantCoordinates;
use nexus_core::stores::cache_store::DashMapCache;
use nexus_core::stores::graph_store::InMemoryGraphStore;
use nexus_core::stores::metrics_store::InMemoryMetricsStore;
use nexus_core::stores::queue_store::SqliteQueue;
use nexus_core::stores::relational_sqlite::SqliteRelationalStore;
use nexus_core::stores::vector_store::InMemoryVectorStore;
use nexus_core::stores::{Cache, GraphStore, MetricsStore, Queue, RelationalStore, VectorStore};
use nexus_core::tenant::TenantContext;
use nexus_core::{CoreDeps, NexusCore};

#[allow(dead_code)]
pub fn core() -> NexusCore {
    let relational: Arc<dyn RelationalStore> = Arc::new(SqliteRelationalStore::open_in_memory().unwrap());
    let vector: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
    let cache: Arc<dyn Cache> = Arc::new(DashMapCache::new());
    let queue: Arc<dyn Queue> = Arc::new(SqliteQueue::open_in_memory().unwrap());
    let metrics: Arc<dyn MetricsStore> = Arc::new(InMemoryMetricsStore::new());

    NexusCore::new(
        Config::default(),
        CoreDeps { relational, vector, graph, cache, queue, metrics, embeddings: None },
    )
}

/// Like [`core`], but also hands back the graph store handle so a test can
/// seed relationships directly - there is no façade operation for that, the
/// write saga only ever calls `merge_node`.
#[allow(dead_code)]
pub fn core_with_graph() -> (NexusCore, Arc<dyn GraphStore>) {
    let relational: Arc<dyn RelationalStore> = Arc::new(SqliteRelationalStore::open_in_memory().unwrap());
    let vector: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
    let cache: Arc<dyn Cache> = Arc::new(DashMapCache::new());
    let queue: Arc<dyn Queue> = Arc::new(SqliteQueue::open_in_memory().unwrap());
    let metrics: Arc<dyn MetricsStore> = Arc::new(InMemoryMetricsStore::new());

    let core = NexusCore::new(
        Config::default(),
        CoreDeps { relational, vector, graph: graph.clone(), cache, queue, metrics, embeddings: None },
    );
    (core, graph)
}

#[allow(dead_code)]
pub fn tenant(company: &str, app: &str, user: &str) -> TenantContext {
    TenantContext::new(company, app, user).unwrap()
}

#[allow(dead_code)]
pub fn coords(tenant: &TenantContext) -> TenantCoordinates {
    TenantCoordinates {
        company_id: tenant.company_id.clone(),
        app_id: tenant.app_id.clone(),
        user_id: tenant.user_id.clone(),
        session_id: tenant.session_id.clone(),
    }
}
