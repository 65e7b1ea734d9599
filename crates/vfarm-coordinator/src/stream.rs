//! Worker stream endpoint.
//!
//! Each incoming WebSocket runs one task with two phases: a registration
//! phase (the first frame must be a `RegisterRequest`) and a steady-state
//! loop that dispatches inbound frames and watches the connection's close
//! signal. On any exit path the node is removed from the registry and
//! unregistered from the pool; the worker reconnects if it wants back in.

use std::ops::ControlFlow;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use vfarm_models::{
    CoordinatorFrame, CoordinatorPayload, Node, NodeFrame, NodePayload, ResourceUsage,
};

use crate::conns::NodeConn;
use crate::state::AppState;

/// Outbound frames queued per connection before backpressure kicks in.
const SEND_BUFFER_SIZE: usize = 32;

pub async fn ws_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_stream(socket, state))
}

async fn handle_stream(socket: WebSocket, state: AppState) {
    let (ws_sender, mut receiver) = socket.split();

    // Registration phase: nothing is valid before a RegisterRequest.
    let node = match receiver.next().await {
        Some(Ok(Message::Text(text))) => match register(&state, &text) {
            Some(node) => node,
            None => return,
        },
        _ => {
            warn!("stream closed before registration");
            return;
        }
    };

    // All outbound traffic funnels through a bounded channel into a single
    // send task that owns the sink.
    let (tx, mut rx) = mpsc::channel::<CoordinatorFrame>(SEND_BUFFER_SIZE);
    let send_task = tokio::spawn(async move {
        let mut ws_sender = ws_sender;
        while let Some(frame) = rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(err) => {
                    warn!(%err, "failed to serialise outbound frame");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let close = state.shutdown.child_token();
    let conn = NodeConn::new(node.id, tx.clone(), close.clone());
    state.conns.insert(conn);

    let registered = tx
        .send(CoordinatorFrame::new(CoordinatorPayload::RegisterResponse {
            node_id: node.id.to_string(),
            success: true,
            message: format!("registered as {}", node.name),
        }))
        .await
        .is_ok();

    if registered {
        info!(node_id = %node.id, name = %node.name, "node stream active");

        loop {
            tokio::select! {
                _ = close.cancelled() => {
                    debug!(node_id = %node.id, "close signal fired");
                    break;
                }
                inbound = receiver.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if handle_frame(&state, &node, &tx, &text).await.is_break() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(node_id = %node.id, "stream closed by worker");
                        break;
                    }
                    Some(Ok(_)) => {} // ping/pong/binary: nothing to do
                    Some(Err(err)) => {
                        warn!(node_id = %node.id, %err, "stream transport error");
                        break;
                    }
                }
            }
        }
    }

    // Teardown: connection first, then the domain record.
    state.conns.remove(node.id);
    if let Err(err) = state.service.unregister_node(node.id) {
        debug!(node_id = %node.id, %err, "unregister after disconnect");
    }
    drop(tx);
    let _ = send_task.await;
    info!(node_id = %node.id, name = %node.name, "node disconnected");
}

/// Parse and apply the registration frame. Anything but a well-formed
/// `RegisterRequest` is a protocol violation.
fn register(state: &AppState, text: &str) -> Option<Node> {
    let frame: NodeFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(%err, "unparseable registration frame");
            return None;
        }
    };

    let NodePayload::RegisterRequest { name, profiles } = frame.payload else {
        warn!("protocol violation: first frame was not a RegisterRequest");
        return None;
    };

    match state.service.register_node(name, profiles) {
        Ok(node) => Some(node),
        Err(err) => {
            warn!(%err, "registration rejected");
            None
        }
    }
}

/// Steady-state frame dispatch. Returns `Break` when the stream must end.
async fn handle_frame(
    state: &AppState,
    node: &Node,
    tx: &mpsc::Sender<CoordinatorFrame>,
    text: &str,
) -> ControlFlow<()> {
    let frame: NodeFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(node_id = %node.id, %err, "unparseable frame, closing stream");
            return ControlFlow::Break(());
        }
    };

    match frame.payload {
        NodePayload::ResourceUsageRequest {
            node_id,
            cpu_percent,
            memory_percent,
            disk_percent,
        } => {
            let usage = ResourceUsage {
                cpu_percent,
                memory_percent,
                disk_percent,
            };
            if let Err(err) =
                state
                    .service
                    .update_node_metrics(&node_id, usage, frame.timestamp)
            {
                debug!(%node_id, %err, "metrics update rejected");
            }
            ControlFlow::Continue(())
        }

        NodePayload::JobAssignmentResponse {
            job_id,
            accepted,
            message,
        } => {
            if accepted {
                if let Err(err) = state.service.mark_job_running(&job_id).await {
                    warn!(%job_id, %err, "could not mark accepted job running");
                }
            } else if let Err(err) = state.service.reject_job(&job_id, &message).await {
                warn!(%job_id, %err, "reject handling failed");
            }
            ControlFlow::Continue(())
        }

        NodePayload::JobCompletionRequest {
            job_id,
            success,
            message,
        } => {
            let message = (!message.is_empty()).then_some(message);
            if let Err(err) = state.service.complete_job(&job_id, success, message).await {
                warn!(%job_id, %err, "completion handling failed");
            }
            ControlFlow::Continue(())
        }

        NodePayload::DisconnectRequest { node_id: _, reason } => {
            info!(node_id = %node.id, reason, "worker requested disconnect");
            let _ = tx
                .send(CoordinatorFrame::new(
                    CoordinatorPayload::DisconnectResponse { acknowledged: true },
                ))
                .await;
            ControlFlow::Break(())
        }

        NodePayload::RegisterRequest { .. } => {
            warn!(node_id = %node.id, "protocol violation: duplicate registration");
            ControlFlow::Break(())
        }
    }
}
