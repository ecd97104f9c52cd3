//! End-to-end coverage of composite relevance scoring: access recording,
//! importance overrides, filtered retrieval, and score breakdown fallback.

mod common;

use nexus_core::domain::{AccessKind, ContentNode, ContentVariant, ContextKind};
use nexus_core::relevance::RetrieveFilter;

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
async fn record_access_increments_access_count_and_updates_stability() {
    let core = common::core();
    let tenant = common::tenant("acme", "support", "u1");
    let node = ContentNode::new(ContentVariant::Memory, "weekly status update draft", common::coords(&tenant));
    core.store(&node, "key-1").await.unwrap();

    let after_one = core.record_access(&tenant, &node.id, AccessKind::View, ContextKind::Manual, None).await.unwrap();
    assert_eq!(after_one.access_count, 1);

    let after_two = core.record_access(&tenant, &node.id, AccessKind::Retrieve, ContextKind::Query, Some(0.8)).await.unwrap();
    assert_eq!(after_two.access_count, 2);
    assert!(after_two.stability >= after_one.stability);
}

#[tokio::test]
async fn set_importance_overrides_and_is_reflected_in_the_score_breakdown() {
    let core = common::core();
    let tenant = common::tenant("acme", "support", "u1");
    let node = ContentNode::new(ContentVariant::Memory, "critical escalation note", common::coords(&tenant));
    core.store(&node, "key-2").await.unwrap();

    let before = core.get_score(&tenant, &node.id).await.unwrap();

    let applied = core.set_importance(&tenant, &node.id, 0.9).await.unwrap();
    assert_eq!(applied, 0.9);

    let after = core.get_score(&tenant, &node.id).await.unwrap();
    assert!(after.user_importance > before.user_importance);
}

#[tokio::test]
async fn set_importance_out_of_range_is_rejected() {
    let core = common::core();
    let tenant = common::tenant("acme", "support", "u1");
    let node = ContentNode::new(ContentVariant::Memory, "bounds check node", common::coords(&tenant));
    core.store(&node, "key-3").await.unwrap();

    assert!(core.set_importance(&tenant, &node.id, 1.5).await.is_err());
    assert!(core.set_importance(&tenant, &node.id, -0.1).await.is_err());
}

#[tokio::test]
async fn retrieve_respects_min_relevance_score_filter() {
    let core = common::core();
    let tenant = common::tenant("acme", "support", "u1");

    let low = ContentNode::new(ContentVariant::Memory, "low importance scratch note", common::coords(&tenant));
    let high = ContentNode::new(ContentVariant::Memory, "high importance pinned note", common::coords(&tenant));
    core.store(&low, "key-low").await.unwrap();
    core.store(&high, "key-high").await.unwrap();
    core.set_importance(&tenant, &high.id, 1.0).await.unwrap();

    let mut filter = empty_filter();
    filter.min_relevance_score = Some(0.5);
    let result = core.retrieve(&tenant, filter).await.unwrap();

    assert!(result.rows.iter().any(|r| r.node_id == high.id));
    assert!(!result.rows.iter().any(|r| r.node_id == low.id));
}

#[tokio::test]
async fn retrieve_respects_content_type_filter() {
    let core = common::core();
    let tenant = common::tenant("acme", "support", "u1");

    let memory = ContentNode::new(ContentVariant::Memory, "memory-only filter target", common::coords(&tenant));
    let document = ContentNode::new(ContentVariant::Document, "document-only filter target", common::coords(&tenant));
    core.store(&memory, "key-m").await.unwrap();
    core.store(&document, "key-d").await.unwrap();

    let mut filter = empty_filter();
    filter.content_type = Some(ContentVariant::Document);
    let result = core.retrieve(&tenant, filter).await.unwrap();

    assert!(result.rows.iter().any(|r| r.node_id == document.id));
    assert!(!result.rows.iter().any(|r| r.node_id == memory.id));
}

#[tokio::test]
async fn score_breakdown_falls_back_gracefully_with_no_query_vector() {
    let core = common::core();
    let tenant = common::tenant("acme", "support", "u1");
    let node = ContentNode::new(ContentVariant::Memory, "fallback path exercised here", common::coords(&tenant));
    core.store(&node, "key-fallback").await.unwrap();

    let breakdown = core.get_score(&tenant, &node.id).await.unwrap();
    assert!(breakdown.used_fallback);
    assert!(breakdown.total.is_finite());
}

#[tokio::test]
async fn get_score_on_unknown_node_errors() {
    let core = common::core();
    let tenant = common::tenant("acme", "support", "u1");
    assert!(core.get_score(&tenant, "does-not-exist").await.is_err());
}
