//! Application state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use vfarm_orchestrator::OrchestratorService;

use crate::config::CoordinatorConfig;
use crate::conns::ConnRegistry;

/// Shared state behind both the stream endpoint and the client API.
#[derive(Clone)]
pub struct AppState {
    pub config: CoordinatorConfig,
    pub service: Arc<OrchestratorService>,
    pub conns: ConnRegistry,
    /// Root token; cancelling it stops the loops and closes every stream.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            service: Arc::new(OrchestratorService::in_memory()),
            conns: ConnRegistry::new(),
            shutdown: CancellationToken::new(),
        }
    }
}
