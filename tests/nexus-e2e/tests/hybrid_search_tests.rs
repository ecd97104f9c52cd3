//! End-to-end coverage of hybrid search: pattern detection, full-text
//! matching, content-type filtering, pagination, and query-result caching.

mod common;

use nexus_core::domain::{ContentNode, ContentVariant};
use nexus_core::search::SearchOptions;

#[tokio::test]
async fn a_title_search_query_surfaces_the_node_with_a_matching_title() {
    let core = common::core();
    let tenant = common::tenant("acme", "support", "u1");

    let mut node = ContentNode::new(ContentVariant::Document, "internal onboarding body text", common::coords(&tenant));
    node.title = Some("document titled onboarding guide".into());
    core.store(&node, "key-title").await.unwrap();

    let response = core.search(&tenant, "document titled onboarding guide", SearchOptions::default()).await.unwrap();
    assert!(response.results.iter().any(|h| h.id == node.id));
    assert_eq!(response.perf.pattern, "title_search");
}

#[tokio::test]
async fn full_text_search_finds_a_matching_body() {
    let core = common::core();
    let tenant = common::tenant("acme", "support", "u1");

    let node = ContentNode::new(ContentVariant::Memory, "the migration runbook covers zero downtime cutover", common::coords(&tenant));
    core.store(&node, "key-fts").await.unwrap();

    let response = core.search(&tenant, "migration runbook cutover", SearchOptions::default()).await.unwrap();
    assert!(response.results.iter().any(|h| h.id == node.id));
}

#[tokio::test]
async fn content_type_filter_excludes_other_variants() {
    let core = common::core();
    let tenant = common::tenant("acme", "support", "u1");

    let memory = ContentNode::new(ContentVariant::Memory, "shared keyword budgeting review", common::coords(&tenant));
    let document = ContentNode::new(ContentVariant::Document, "shared keyword budgeting review", common::coords(&tenant));
    core.store(&memory, "key-memory").await.unwrap();
    core.store(&document, "key-document").await.unwrap();

    let opts = SearchOptions { content_type: Some(ContentVariant::Document), score_threshold: 0.0, ..SearchOptions::default() };
    let response = core.search(&tenant, "budgeting review", opts).await.unwrap();

    assert!(response.results.iter().any(|h| h.id == document.id));
    assert!(!response.results.iter().any(|h| h.id == memory.id));
}

#[tokio::test]
async fn pagination_limit_is_respected() {
    let core = common::core();
    let tenant = common::tenant("acme", "support", "u1");

    for i in 0..5 {
        let node = ContentNode::new(ContentVariant::Memory, format!("paginated widget note number {i}"), common::coords(&tenant));
        core.store(&node, &format!("key-page-{i}")).await.unwrap();
    }

    let opts = SearchOptions { limit: 2, score_threshold: 0.0, ..SearchOptions::default() };
    let response = core.search(&tenant, "paginated widget note", opts).await.unwrap();
    assert!(response.results.len() <= 2);
}

#[tokio::test]
async fn repeating_the_same_query_hits_the_result_cache() {
    let core = common::core();
    let tenant = common::tenant("acme", "support", "u1");

    let node = ContentNode::new(ContentVariant::Memory, "cache warmup sentinel phrase", common::coords(&tenant));
    core.store(&node, "key-cache").await.unwrap();

    let first = core.search(&tenant, "cache warmup sentinel phrase", SearchOptions::default()).await.unwrap();
    assert!(!first.perf.cached);

    let second = core.search(&tenant, "cache warmup sentinel phrase", SearchOptions::default()).await.unwrap();
    assert!(second.perf.cached);
}
