//! Ripple recall: BFS-propagated, hop-decaying stability boosts over the
//! typed relationship graph.

use std::sync::Arc;

use crate::config::RippleConfig;
use crate::domain::RelationshipType;
use crate::error::Result;
use crate::stores::{GraphStore, MetricsStore};

const RIPPLE_TYPES: [RelationshipType; 3] =
    [RelationshipType::Temporal, RelationshipType::Causal, RelationshipType::Mentions];

/// Outcome of one `propagateBoost` call.
#[derive(Debug, Clone, Default)]
pub struct PropagationResult {
    pub affected_nodes: Vec<String>,
    pub max_depth_reached: u32,
    pub total_boost: f64,
}

/// Computes and applies decaying boosts to graph neighbours of a recently
/// accessed node.
///
/// Propagation for a given source node is serialized by virtue of being
/// invoked from a single `tokio::spawn`per access event; concurrent
/// propagation from distinct sources is unconstrained.
pub struct RippleEngine {
    config: RippleConfig,
    graph: Arc<dyn GraphStore>,
    metrics: Arc<dyn MetricsStore>,
}

impl RippleEngine {
    pub fn new(config: RippleConfig, graph: Arc<dyn GraphStore>, metrics: Arc<dyn MetricsStore>) -> Self {
        Self { config, graph, metrics }
    }

    /// Boost for a neighbour at hop distance `d`: `initial_boost · decay_per_hop^d`.
    pub fn boost_at_depth(&self, depth: u32) -> f64 {
        self.config.initial_boost * self.config.decay_per_hop.powi(depth as i32)
    }

    /// `propagateBoost(node, tenant)`.
    ///
    /// BFS up to `max_depth` over {TEMPORAL, CAUSAL, MENTIONS}, stopping
    /// exploration once a hop's boost falls below `min_boost_threshold`.
    /// Neighbours are processed in batches of `batch_size` (a pacing detail;
    /// correctness does not depend on batch boundaries). Each neighbour that
    /// clears the threshold and carries relevance metrics has its stability
    /// boosted per spec: `stability' = min(1, stability + boost)`, with
    /// `last_boost` and `boost_count` updated alongside. A neighbour with no
    /// metrics row (a graph-only entity, never stored as content) still
    /// counts toward `affected_nodes`/`total_boost` but has nothing to write.
    pub async fn propagate(&self, tenant_id: &str, source_id: &str) -> Result<PropagationResult> {
        let neighbors = self
            .graph
            .bounded_bfs(tenant_id, source_id, self.config.max_depth, &RIPPLE_TYPES)
            .await?;

        let mut result = PropagationResult::default();
        for chunk in neighbors.chunks(self.config.batch_size) {
            for neighbor in chunk {
                let boost = self.boost_at_depth(neighbor.depth);
                if boost < self.config.min_boost_threshold {
                    continue;
                }

                if let Some(mut metrics) = self.metrics.get(tenant_id, &neighbor.id).await? {
                    metrics.stability = (metrics.stability + boost).min(1.0);
                    metrics.last_boost = Some(boost);
                    metrics.boost_count += 1;
                    self.metrics.upsert(tenant_id, &metrics).await?;
                }

                result.affected_nodes.push(neighbor.id.clone());
                result.total_boost += boost;
                result.max_depth_reached = result.max_depth_reached.max(neighbor.depth);
            }
        }

        tracing::debug!(
            tenant_id,
            source_id,
            affected = result.affected_nodes.len(),
            "ripple propagation complete"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Relationship, RelevanceMetrics};
    use crate::stores::graph_store::InMemoryGraphStore;
    use crate::stores::metrics_store::InMemoryMetricsStore;

    fn star_graph(depths: &[(&str, &str, u32)]) -> (Arc<InMemoryGraphStore>, &'static str) {
        let _ = depths;
        (Arc::new(InMemoryGraphStore::new()), "source")
    }

    #[test]
    fn boost_matches_spec_example() {
        let engine = RippleEngine::new(
            RippleConfig::default(),
            Arc::new(InMemoryGraphStore::new()),
            Arc::new(InMemoryMetricsStore::new()),
        );
        assert!((engine.boost_at_depth(1) - 0.30).abs() < 1e-9);
        assert!((engine.boost_at_depth(2) - 0.15).abs() < 1e-9);
        assert!((engine.boost_at_depth(3) - 0.075).abs() < 1e-9);
        assert!(engine.boost_at_depth(4) < 0.05);
    }

    #[tokio::test]
    async fn propagation_is_bounded_by_hop_count_from_spec_example() {
        let (graph, source) = star_graph(&[]);
        // 4 neighbours at hop 1, 9 at hop 2, 16 at hop 3 (spec scenario 6).
        for i in 0..4 {
            graph
                .merge_relationship(
                    "t1",
                    &Relationship::new(source, format!("h1-{i}"), RelationshipType::Causal),
                )
                .await
                .unwrap();
        }
        for i in 0..9 {
            graph
                .merge_relationship(
                    "t1",
                    &Relationship::new(format!("h1-{}", i % 4), format!("h2-{i}"), RelationshipType::Causal),
                )
                .await
                .unwrap();
        }
        for i in 0..16 {
            graph
                .merge_relationship(
                    "t1",
                    &Relationship::new(format!("h2-{}", i % 9), format!("h3-{i}"), RelationshipType::Causal),
                )
                .await
                .unwrap();
        }

        let engine = RippleEngine::new(RippleConfig::default(), graph.clone(), Arc::new(InMemoryMetricsStore::new()));
        let result = engine.propagate("t1", source).await.unwrap();

        assert!(result.max_depth_reached <= 3);
        assert!(result.affected_nodes.len() <= 29);
        for node in &result.affected_nodes {
            assert!(!node.starts_with("h4"));
        }
    }

    #[tokio::test]
    async fn propagation_visits_each_node_at_most_once() {
        let graph = Arc::new(InMemoryGraphStore::new());
        // diamond: source -> a -> target, source -> b -> target
        graph.merge_relationship("t1", &Relationship::new("source", "a", RelationshipType::Temporal)).await.unwrap();
        graph.merge_relationship("t1", &Relationship::new("source", "b", RelationshipType::Temporal)).await.unwrap();
        graph.merge_relationship("t1", &Relationship::new("a", "target", RelationshipType::Temporal)).await.unwrap();
        graph.merge_relationship("t1", &Relationship::new("b", "target", RelationshipType::Temporal)).await.unwrap();

        let engine = RippleEngine::new(RippleConfig::default(), graph, Arc::new(InMemoryMetricsStore::new()));
        let result = engine.propagate("t1", "source").await.unwrap();

        let target_count = result.affected_nodes.iter().filter(|id| id.as_str() == "target").count();
        assert_eq!(target_count, 1);
    }

    #[tokio::test]
    async fn propagate_boosts_stability_of_a_neighbour_with_metrics() {
        let graph = Arc::new(InMemoryGraphStore::new());
        graph.merge_relationship("t1", &Relationship::new("source", "a", RelationshipType::Temporal)).await.unwrap();

        let metrics = Arc::new(InMemoryMetricsStore::new());
        let mut existing = RelevanceMetrics::new("a");
        existing.stability = 0.5;
        metrics.upsert("t1", &existing).await.unwrap();

        let engine = RippleEngine::new(RippleConfig::default(), graph, metrics.clone());
        let boost = engine.boost_at_depth(1);
        engine.propagate("t1", "source").await.unwrap();

        let after = metrics.get("t1", "a").await.unwrap().unwrap();
        assert!((after.stability - (0.5 + boost).min(1.0)).abs() < 1e-9);
        assert_eq!(after.last_boost, Some(boost));
        assert_eq!(after.boost_count, 1);
    }

    #[tokio::test]
    async fn propagate_leaves_a_neighbour_with_no_metrics_row_unwritten() {
        let graph = Arc::new(InMemoryGraphStore::new());
        graph.merge_relationship("t1", &Relationship::new("source", "a", RelationshipType::Temporal)).await.unwrap();

        let metrics = Arc::new(InMemoryMetricsStore::new());
        let engine = RippleEngine::new(RippleConfig::default(), graph, metrics.clone());
        let result = engine.propagate("t1", "source").await.unwrap();

        assert_eq!(result.affected_nodes, vec!["a".to_string()]);
        assert!(metrics.get("t1", "a").await.unwrap().is_none());
    }
}
