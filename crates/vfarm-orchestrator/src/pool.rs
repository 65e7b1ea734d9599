//! Worker node registry.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;
use vfarm_models::{Node, NodeFilter, NodeId, NodeRegistration, ResourceUsage};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Registry of connected workers, their advertised profiles, last resource
/// snapshot and heartbeat time.
pub trait NodePool: Send + Sync {
    /// Register a new node and mint its identity.
    fn register(&self, registration: NodeRegistration) -> OrchestratorResult<Node>;

    /// Remove a node. Unknown IDs fail with `NodeNotFound`.
    fn unregister(&self, node_id: NodeId) -> OrchestratorResult<()>;

    /// Record a resource snapshot and refresh the heartbeat.
    ///
    /// `reported_at` is the frame timestamp from the worker; updates older
    /// than the node's current heartbeat are rejected to keep heartbeats
    /// monotonic.
    fn update_metrics(
        &self,
        node_id: NodeId,
        usage: ResourceUsage,
        reported_at: DateTime<Utc>,
    ) -> OrchestratorResult<()>;

    /// Look up a single node.
    fn get(&self, node_id: NodeId) -> OrchestratorResult<Node>;

    /// Page through registered nodes, ordered by node ID. A `limit` of 0
    /// means unlimited.
    fn list(&self, offset: usize, limit: usize) -> Vec<Node>;

    /// Every node matching the filter. Result order is unspecified; callers
    /// sort when they need determinism.
    fn get_available(&self, filter: &NodeFilter) -> Vec<Node>;

    /// Every node whose heartbeat is older than `timeout`. The timeout must
    /// be strictly positive.
    fn get_timed_out(&self, timeout: Duration) -> OrchestratorResult<Vec<Node>>;
}

/// In-memory node pool backed by a `HashMap` behind a `RwLock`.
#[derive(Default)]
pub struct InMemoryNodePool {
    nodes: RwLock<HashMap<NodeId, Node>>,
}

impl InMemoryNodePool {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodePool for InMemoryNodePool {
    fn register(&self, registration: NodeRegistration) -> OrchestratorResult<Node> {
        if registration.name.is_empty() {
            return Err(OrchestratorError::invalid_input(
                "node registration requires a name",
            ));
        }

        let node = Node {
            id: NodeId::new(),
            name: registration.name,
            profiles: registration.profiles,
            resources: ResourceUsage::default(),
            heartbeat: Utc::now(),
        };

        let mut nodes = self.nodes.write().expect("node pool lock poisoned");
        nodes.insert(node.id, node.clone());
        debug!(node_id = %node.id, name = %node.name, "registered node");

        Ok(node)
    }

    fn unregister(&self, node_id: NodeId) -> OrchestratorResult<()> {
        let mut nodes = self.nodes.write().expect("node pool lock poisoned");
        nodes
            .remove(&node_id)
            .map(|_| ())
            .ok_or(OrchestratorError::NodeNotFound(node_id))
    }

    fn update_metrics(
        &self,
        node_id: NodeId,
        usage: ResourceUsage,
        reported_at: DateTime<Utc>,
    ) -> OrchestratorResult<()> {
        let mut nodes = self.nodes.write().expect("node pool lock poisoned");
        let node = nodes
            .get_mut(&node_id)
            .ok_or(OrchestratorError::NodeNotFound(node_id))?;

        if reported_at < node.heartbeat {
            return Err(OrchestratorError::StaleMetrics(node_id));
        }

        node.resources = usage;
        node.heartbeat = Utc::now();
        Ok(())
    }

    fn get(&self, node_id: NodeId) -> OrchestratorResult<Node> {
        let nodes = self.nodes.read().expect("node pool lock poisoned");
        nodes
            .get(&node_id)
            .cloned()
            .ok_or(OrchestratorError::NodeNotFound(node_id))
    }

    fn list(&self, offset: usize, limit: usize) -> Vec<Node> {
        let nodes = self.nodes.read().expect("node pool lock poisoned");
        let mut all: Vec<Node> = nodes.values().cloned().collect();
        all.sort_by_key(|n| n.id);

        let end = if limit == 0 {
            all.len()
        } else {
            (offset + limit).min(all.len())
        };
        if offset >= all.len() {
            return Vec::new();
        }
        all[offset..end].to_vec()
    }

    fn get_available(&self, filter: &NodeFilter) -> Vec<Node> {
        let nodes = self.nodes.read().expect("node pool lock poisoned");
        nodes
            .values()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect()
    }

    fn get_timed_out(&self, timeout: Duration) -> OrchestratorResult<Vec<Node>> {
        if timeout.is_zero() {
            return Err(OrchestratorError::invalid_input(
                "node timeout must be strictly positive",
            ));
        }

        let now = Utc::now();
        let nodes = self.nodes.read().expect("node pool lock poisoned");
        Ok(nodes
            .values()
            .filter(|n| {
                (now - n.heartbeat).to_std().unwrap_or(Duration::ZERO) > timeout
            })
            .cloned()
            .collect())
    }
}
