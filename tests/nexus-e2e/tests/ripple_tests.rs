//! End-to-end coverage of ripple recall, driven through
//! `NexusCore::propagate_boost` over a graph seeded directly on the shared
//! store handle (there is no façade operation for writing relationships).

mod common;

use nexus_core::domain::{ContentNode, ContentVariant, Relationship, RelationshipType};

async fn store_node(core: &nexus_core::NexusCore, tenant: &nexus_core::tenant::TenantContext, body: &str, key: &str) -> String {
    let node = ContentNode::new(ContentVariant::Memory, body, common::coords(tenant));
    core.store(&node, key).await.unwrap();
    node.id
}

#[tokio::test]
async fn propagate_boost_reaches_direct_neighbours() {
    let (core, graph) = common::core_with_graph();
    let tenant = common::tenant("acme", "support", "u1");
    let tenant_id = tenant.tenant_id();

    let source = store_node(&core, &tenant, "source incident report", "key-source").await;
    let neighbor = store_node(&core, &tenant, "related neighbor note", "key-neighbor").await;

    graph.merge_relationship(&tenant_id, &Relationship::new(source.clone(), neighbor.clone(), RelationshipType::Causal)).await.unwrap();

    let result = core.propagate_boost(&tenant, &source).await.unwrap();
    assert!(result.affected_nodes.contains(&neighbor));
    assert_eq!(result.max_depth_reached, 1);
    assert!(result.total_boost > 0.0);
}

#[tokio::test]
async fn propagate_boost_decays_with_hop_distance() {
    let (core, graph) = common::core_with_graph();
    let tenant = common::tenant("acme", "support", "u1");
    let tenant_id = tenant.tenant_id();

    let a = store_node(&core, &tenant, "hop zero", "key-a").await;
    let b = store_node(&core, &tenant, "hop one", "key-b").await;
    let c = store_node(&core, &tenant, "hop two", "key-c").await;

    graph.merge_relationship(&tenant_id, &Relationship::new(a.clone(), b.clone(), RelationshipType::Temporal)).await.unwrap();
    graph.merge_relationship(&tenant_id, &Relationship::new(b.clone(), c.clone(), RelationshipType::Temporal)).await.unwrap();

    let result = core.propagate_boost(&tenant, &a).await.unwrap();
    assert!(result.affected_nodes.contains(&b));
    assert!(result.affected_nodes.contains(&c));
    assert!(result.max_depth_reached >= 2);
}

#[tokio::test]
async fn propagate_boost_on_an_isolated_node_affects_nothing() {
    let (core, _graph) = common::core_with_graph();
    let tenant = common::tenant("acme", "support", "u1");

    let isolated = store_node(&core, &tenant, "no relationships here", "key-isolated").await;

    let result = core.propagate_boost(&tenant, &isolated).await.unwrap();
    assert!(result.affected_nodes.is_empty());
    assert_eq!(result.total_boost, 0.0);
}

#[tokio::test]
async fn has_graph_relationships_flag_follows_edges() {
    let (core, graph) = common::core_with_graph();
    let tenant = common::tenant("acme", "support", "u1");
    let tenant_id = tenant.tenant_id();

    let isolated = store_node(&core, &tenant, "still alone", "key-lone").await;
    let connected = store_node(&core, &tenant, "has a friend", "key-friend").await;
    let friend = store_node(&core, &tenant, "the friend", "key-friend-2").await;
    graph.merge_relationship(&tenant_id, &Relationship::new(connected.clone(), friend.clone(), RelationshipType::Mentions)).await.unwrap();

    let isolated_score = core.get_score(&tenant, &isolated).await.unwrap();
    assert_eq!(isolated_score.graph, 0.0);

    // Recording access recomputes has_graph_relationships before scoring.
    core.record_access(&tenant, &connected, nexus_core::domain::AccessKind::View, nexus_core::domain::ContextKind::Manual, None)
        .await
        .unwrap();
    let connected_score = core.get_score(&tenant, &connected).await.unwrap();
    assert!(connected_score.graph > 0.0);
}
