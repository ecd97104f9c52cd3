//! In-memory typed property graph, backed by `petgraph`.
//!
//! Ripple recall's bounded BFS is the only traversal this store needs to
//! support efficiently; everything else is point lookups keyed by id.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use async_trait::async_trait;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::domain::{Entity, Relationship, RelationshipType};
use crate::error::{AttainedPrefix, CoreError, Result};

use super::{GraphNeighbor, GraphStore};

fn store_err(operation: &'static str, message: impl std::fmt::Display) -> CoreError {
    CoreError::GraphError {
        operation,
        source: Box::<dyn std::error::Error + Send + Sync>::from(message.to_string()),
        attained: AttainedPrefix::default(),
    }
}

#[derive(Debug, Clone)]
struct NodeLabel {
    id: String,
}

#[derive(Debug, Clone)]
struct EdgeLabel {
    relationship_type: RelationshipType,
    #[allow(dead_code)]
    weight: f64,
}

struct TenantGraph {
    graph: DiGraph<NodeLabel, EdgeLabel>,
    index_of: HashMap<String, NodeIndex>,
}

impl TenantGraph {
    fn new() -> Self {
        Self { graph: DiGraph::new(), index_of: HashMap::new() }
    }

    fn ensure_node(&mut self, id: &str) -> NodeIndex {
        if let Some(idx) = self.index_of.get(id) {
            return *idx;
        }
        let idx = self.graph.add_node(NodeLabel { id: id.to_string() });
        self.index_of.insert(id.to_string(), idx);
        idx
    }
}

/// Per-tenant in-memory directed graph of content mirrors and entities.
pub struct InMemoryGraphStore {
    tenants: RwLock<HashMap<String, TenantGraph>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self { tenants: RwLock::new(HashMap::new()) }
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn merge_node(&self, tenant_id: &str, content_id: &str) -> Result<()> {
        let mut tenants = self.tenants.write().map_err(|_| store_err("merge_node", "lock poisoned"))?;
        let graph = tenants.entry(tenant_id.to_string()).or_insert_with(TenantGraph::new);
        graph.ensure_node(content_id);
        Ok(())
    }

    async fn merge_entity(&self, tenant_id: &str, entity: &Entity) -> Result<()> {
        let mut tenants = self.tenants.write().map_err(|_| store_err("merge_entity", "lock poisoned"))?;
        let graph = tenants.entry(tenant_id.to_string()).or_insert_with(TenantGraph::new);
        graph.ensure_node(&entity.id);
        Ok(())
    }

    async fn merge_relationship(&self, tenant_id: &str, relationship: &Relationship) -> Result<()> {
        let mut tenants = self.tenants.write().map_err(|_| store_err("merge_relationship", "lock poisoned"))?;
        let graph = tenants.entry(tenant_id.to_string()).or_insert_with(TenantGraph::new);

        let source = graph.ensure_node(&relationship.source_id);
        let target = graph.ensure_node(&relationship.target_id);

        let already_exists = graph.graph.edges_connecting(source, target).any(|e| {
            e.weight().relationship_type == relationship.relationship_type
        });
        if !already_exists {
            graph.graph.add_edge(
                source,
                target,
                EdgeLabel { relationship_type: relationship.relationship_type, weight: relationship.weight },
            );
        }
        Ok(())
    }

    async fn has_any_relationship(&self, tenant_id: &str, content_id: &str) -> Result<bool> {
        let tenants = self.tenants.read().map_err(|_| store_err("has_any_relationship", "lock poisoned"))?;
        let Some(graph) = tenants.get(tenant_id) else {
            return Ok(false);
        };
        let Some(&idx) = graph.index_of.get(content_id) else {
            return Ok(false);
        };
        Ok(graph.graph.edges_directed(idx, Direction::Outgoing).next().is_some()
            || graph.graph.edges_directed(idx, Direction::Incoming).next().is_some())
    }

    async fn bounded_bfs(
        &self,
        tenant_id: &str,
        start_id: &str,
        max_depth: u32,
        types: &[RelationshipType],
    ) -> Result<Vec<GraphNeighbor>> {
        let tenants = self.tenants.read().map_err(|_| store_err("bounded_bfs", "lock poisoned"))?;
        let Some(graph) = tenants.get(tenant_id) else {
            return Ok(Vec::new());
        };
        let Some(&start) = graph.index_of.get(start_id) else {
            return Ok(Vec::new());
        };

        let mut visited = HashMap::new();
        visited.insert(start, 0u32);
        let mut queue = VecDeque::new();
        queue.push_back((start, 0u32));
        let mut out = Vec::new();

        while let Some((node, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for edge in graph.graph.edges_directed(node, Direction::Outgoing) {
                if !types.is_empty() && !types.contains(&edge.weight().relationship_type) {
                    continue;
                }
                let next = edge.target();
                let next_depth = depth + 1;
                if visited.contains_key(&next) {
                    continue;
                }
                visited.insert(next, next_depth);
                out.push(GraphNeighbor {
                    id: graph.graph[next].id.clone(),
                    depth: next_depth,
                    relationship_type: edge.weight().relationship_type,
                });
                queue.push_back((next, next_depth));
            }
        }

        Ok(out)
    }

    async fn delete_node(&self, tenant_id: &str, content_id: &str) -> Result<()> {
        let mut tenants = self.tenants.write().map_err(|_| store_err("delete_node", "lock poisoned"))?;
        if let Some(graph) = tenants.get_mut(tenant_id) {
            if let Some(idx) = graph.index_of.remove(content_id) {
                graph.graph.remove_node(idx);
                // removing a node renumbers petgraph's indices; rebuild the map.
                graph.index_of = graph.graph.node_indices().map(|i| (graph.graph[i].id.clone(), i)).collect();
            }
        }
        Ok(())
    }
}
