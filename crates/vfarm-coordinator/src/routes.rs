//! Router assembly.

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    clear_queue, enqueue_job, get_all_nodes, get_job_history, get_queue, health,
};
use crate::state::AppState;
use crate::stream::ws_stream;

/// Router for the worker stream port.
pub fn create_stream_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/stream", get(ws_stream))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router for the client API port.
pub fn create_api_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/jobs", post(enqueue_job))
        .route("/nodes", get(get_all_nodes))
        .route("/queue", get(get_queue))
        .route("/queue", delete(clear_queue))
        .route("/history", get(get_job_history));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
