//! Per-node connection registry.
//!
//! The transport layer and the node pool reference the same node identity
//! without owning each other: this registry owns the connection (send side
//! plus close signal), the pool owns the domain record, and everything
//! crosses the boundary by ID.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use vfarm_models::{CoordinatorFrame, NodeId};

/// Send side and close signal of one worker stream.
#[derive(Clone)]
pub struct NodeConn {
    pub node_id: NodeId,
    sender: mpsc::Sender<CoordinatorFrame>,
    close: CancellationToken,
}

impl NodeConn {
    pub fn new(
        node_id: NodeId,
        sender: mpsc::Sender<CoordinatorFrame>,
        close: CancellationToken,
    ) -> Self {
        Self {
            node_id,
            sender,
            close,
        }
    }

    /// Queue a frame for this node. Fails when the stream's send task has
    /// gone away.
    pub async fn send(&self, frame: CoordinatorFrame) -> bool {
        self.sender.send(frame).await.is_ok()
    }

    /// Fire the close signal. Idempotent.
    pub fn close(&self) {
        self.close.cancel();
    }

    /// Resolves when the close signal fires.
    pub async fn closed(&self) {
        self.close.cancelled().await
    }
}

/// Registry of live worker connections, keyed by node ID.
#[derive(Clone, Default)]
pub struct ConnRegistry {
    inner: Arc<RwLock<HashMap<NodeId, NodeConn>>>,
}

impl ConnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, conn: NodeConn) {
        let mut map = self.inner.write().expect("conn registry lock poisoned");
        map.insert(conn.node_id, conn);
    }

    pub fn remove(&self, node_id: NodeId) {
        let mut map = self.inner.write().expect("conn registry lock poisoned");
        if map.remove(&node_id).is_some() {
            debug!(%node_id, "removed node connection");
        }
    }

    fn get(&self, node_id: NodeId) -> Option<NodeConn> {
        let map = self.inner.read().expect("conn registry lock poisoned");
        map.get(&node_id).cloned()
    }

    /// Send a frame to a node, if it is still connected.
    pub async fn send_to(&self, node_id: NodeId, frame: CoordinatorFrame) -> bool {
        match self.get(node_id) {
            Some(conn) => conn.send(frame).await,
            None => false,
        }
    }

    /// Fire a node's close signal, if it is still connected.
    pub fn close(&self, node_id: NodeId) {
        if let Some(conn) = self.get(node_id) {
            conn.close();
        }
    }

    /// Fire every close signal (coordinator shutdown).
    pub fn close_all(&self) {
        let map = self.inner.read().expect("conn registry lock poisoned");
        for conn in map.values() {
            conn.close();
        }
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        let map = self.inner.read().expect("conn registry lock poisoned");
        map.contains_key(&node_id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("conn registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfarm_models::CoordinatorPayload;

    fn frame() -> CoordinatorFrame {
        CoordinatorFrame::new(CoordinatorPayload::DisconnectResponse { acknowledged: true })
    }

    #[tokio::test]
    async fn send_to_connected_node_delivers() {
        let registry = ConnRegistry::new();
        let (tx, mut rx) = mpsc::channel(4);
        let node_id = NodeId::new();
        registry.insert(NodeConn::new(node_id, tx, CancellationToken::new()));

        assert!(registry.send_to(node_id, frame()).await);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn send_to_missing_node_reports_failure() {
        let registry = ConnRegistry::new();
        assert!(!registry.send_to(NodeId::new(), frame()).await);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_observable() {
        let registry = ConnRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let node_id = NodeId::new();
        let token = CancellationToken::new();
        registry.insert(NodeConn::new(node_id, tx, token.clone()));

        registry.close(node_id);
        registry.close(node_id);
        assert!(token.is_cancelled());

        registry.remove(node_id);
        assert!(registry.is_empty());
    }
}
