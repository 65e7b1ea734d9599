//! vfarm coordinator.
//!
//! One process serves two surfaces: the worker stream endpoint (a
//! WebSocket carrying the bidirectional node protocol) and the client REST
//! API. Two background loops drive the system: the dispatch loop turns
//! pending jobs into assignments, the timeout loop evicts silent nodes.

pub mod config;
pub mod conns;
pub mod error;
pub mod handlers;
pub mod loops;
pub mod routes;
pub mod state;
pub mod stream;

pub use config::CoordinatorConfig;
pub use conns::{ConnRegistry, NodeConn};
pub use error::{ApiError, ApiResult};
pub use state::AppState;
