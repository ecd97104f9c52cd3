//! End-to-end coverage of the tenant-isolation invariant: for distinct
//! tenants `T1 != T2`, no operation under `T1` ever surfaces a node owned
//! by `T2`.

mod common;

use nexus_core::domain::{AccessKind, ContentNode, ContentVariant, ContextKind};
use nexus_core::error::CoreError;
use nexus_core::relevance::RetrieveFilter;
use nexus_core::search::SearchOptions;

fn empty_filter() -> RetrieveFilter {
    RetrieveFilter {
        content_type: None,
        tags: Vec::new(),
        min_retrievability: None,
        min_stability: None,
        min_relevance_score: None,
        limit: 50,
        offset: 0,
        use_cache: false,
    }
}

#[tokio::test]
async fn search_under_one_tenant_never_surfaces_another_tenants_node() {
    let core = common::core();
    let acme = common::tenant("acme", "support", "u1");
    let globex = common::tenant("globex", "support", "u1");

    let acme_node = ContentNode::new(ContentVariant::Memory, "acme confidential roadmap details", common::coords(&acme));
    let globex_node = ContentNode::new(ContentVariant::Memory, "globex confidential roadmap details", common::coords(&globex));
    core.store(&acme_node, "key-acme").await.unwrap();
    core.store(&globex_node, "key-globex").await.unwrap();

    let opts = SearchOptions { score_threshold: 0.0, ..SearchOptions::default() };
    let response = core.search(&acme, "confidential roadmap details", opts).await.unwrap();

    assert!(response.results.iter().any(|h| h.id == acme_node.id));
    assert!(!response.results.iter().any(|h| h.id == globex_node.id));
}

#[tokio::test]
async fn retrieve_under_one_tenant_never_surfaces_another_tenants_node() {
    let core = common::core();
    let acme = common::tenant("acme", "support", "u1");
    let globex = common::tenant("globex", "support", "u1");

    let acme_node = ContentNode::new(ContentVariant::Memory, "acme-only retrieval target", common::coords(&acme));
    let globex_node = ContentNode::new(ContentVariant::Memory, "globex-only retrieval target", common::coords(&globex));
    core.store(&acme_node, "key-acme-2").await.unwrap();
    core.store(&globex_node, "key-globex-2").await.unwrap();

    let acme_result = core.retrieve(&acme, empty_filter()).await.unwrap();
    assert!(acme_result.rows.iter().any(|r| r.node_id == acme_node.id));
    assert!(!acme_result.rows.iter().any(|r| r.node_id == globex_node.id));

    let globex_result = core.retrieve(&globex, empty_filter()).await.unwrap();
    assert!(globex_result.rows.iter().any(|r| r.node_id == globex_node.id));
    assert!(!globex_result.rows.iter().any(|r| r.node_id == acme_node.id));
}

#[tokio::test]
async fn record_access_cannot_reach_across_tenants() {
    let core = common::core();
    let acme = common::tenant("acme", "support", "u1");
    let globex = common::tenant("globex", "support", "u1");

    let acme_node = ContentNode::new(ContentVariant::Memory, "acme-only access target", common::coords(&acme));
    core.store(&acme_node, "key-acme-3").await.unwrap();

    let err = core.record_access(&globex, &acme_node.id, AccessKind::View, ContextKind::Manual, None).await.unwrap_err();
    assert!(matches!(err, CoreError::NodeNotFound(_)));
}

#[tokio::test]
async fn set_importance_cannot_reach_across_tenants() {
    let core = common::core();
    let acme = common::tenant("acme", "support", "u1");
    let globex = common::tenant("globex", "support", "u1");

    let acme_node = ContentNode::new(ContentVariant::Memory, "acme-only importance target", common::coords(&acme));
    core.store(&acme_node, "key-acme-4").await.unwrap();

    let err = core.set_importance(&globex, &acme_node.id, 0.5).await.unwrap_err();
    assert!(matches!(err, CoreError::NodeNotFound(_)));
}

#[tokio::test]
async fn two_tenants_can_use_the_same_content_id_independently() {
    // TenantContext::new mints a fresh uuid per content node, but the
    // relational/vector/graph stores key everything by (tenant_id, id) -
    // colliding ids across tenants must never merge state.
    let core = common::core();
    let acme = common::tenant("acme", "support", "u1");
    let globex = common::tenant("globex", "support", "u1");

    let mut acme_node = ContentNode::new(ContentVariant::Memory, "acme body for shared id", common::coords(&acme));
    let mut globex_node = ContentNode::new(ContentVariant::Memory, "globex body for shared id", common::coords(&globex));
    let shared_id = "shared-content-id".to_string();
    acme_node.id = shared_id.clone();
    globex_node.id = shared_id.clone();

    core.store(&acme_node, "key-shared-acme").await.unwrap();
    core.store(&globex_node, "key-shared-globex").await.unwrap();

    let acme_fetched = core.relational().get_node(&acme.tenant_id(), &shared_id).await.unwrap().unwrap();
    let globex_fetched = core.relational().get_node(&globex.tenant_id(), &shared_id).await.unwrap().unwrap();
    assert_eq!(acme_fetched.body, acme_node.body);
    assert_eq!(globex_fetched.body, globex_node.body);
}
