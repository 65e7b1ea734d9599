//! Orchestrator error types.

use thiserror::Error;
use vfarm_models::{JobId, NodeId};

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Queue is empty")]
    EmptyQueue,

    #[error("Job already tracked: {0}")]
    AlreadyTracked(JobId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Metrics older than current heartbeat for node {0}")]
    StaleMetrics(NodeId),

    #[error("No nodes available for profile: {0}")]
    NoAvailableNodes(String),

    #[error("All candidate nodes are busy")]
    NoIdleNode,
}

impl OrchestratorError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Soft dispatch failures: the job goes back to the queue and the
    /// dispatch loop retries on the next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrchestratorError::EmptyQueue
                | OrchestratorError::NoAvailableNodes(_)
                | OrchestratorError::NoIdleNode
        )
    }
}
