//! Background loops: dispatch and node timeout.

use tokio::time::interval;
use tracing::{debug, info, warn};
use vfarm_models::{CoordinatorFrame, CoordinatorPayload};

use crate::state::AppState;

/// Tick at the dispatch interval and try to turn one pending job into one
/// assignment per tick. Soft failures (empty queue, no capable or idle
/// node) leave the job queued and are retried next tick; nothing that
/// happens here terminates the loop.
pub async fn dispatch_loop(state: AppState) {
    let mut ticker = interval(state.config.dispatch_interval);
    info!(interval = ?state.config.dispatch_interval, "dispatch loop running");

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match state.service.dequeue_job().await {
            Ok((job, node)) => {
                let frame = CoordinatorFrame::new(CoordinatorPayload::JobAssignmentRequest {
                    job_id: job.id.to_string(),
                    input_path: job.params.input_path.clone(),
                    output_path: job.params.output_path.clone(),
                    profile_name: job.params.profile_name.clone(),
                });

                if state.conns.send_to(node.id, frame).await {
                    info!(job_id = %job.id, node_id = %node.id, "assignment sent");
                } else {
                    // Node vanished between dequeue and send. The job stays
                    // tracked; the timeout loop removes the node and the
                    // stale-job scan surfaces the work for requeue.
                    warn!(job_id = %job.id, node_id = %node.id, "assignment target gone");
                }
            }
            Err(err) if err.is_retryable() => {
                debug!(%err, "nothing to dispatch this tick");
            }
            Err(err) => {
                warn!(%err, "dispatch tick failed");
            }
        }
    }

    info!("dispatch loop stopped");
}

/// Tick at the check interval and fire the close signal of every node whose
/// heartbeat is older than the configured timeout. The stream tasks unwind
/// themselves once signalled.
pub async fn timeout_loop(state: AppState) {
    let mut ticker = interval(state.config.timeout_check_interval);
    info!(timeout = ?state.config.node_timeout, "timeout loop running");

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let timed_out = match state.service.get_timed_out_nodes(state.config.node_timeout) {
            Ok(nodes) => nodes,
            Err(err) => {
                warn!(%err, "timed-out node scan failed");
                continue;
            }
        };

        for node in timed_out {
            warn!(node_id = %node.id, name = %node.name, "node heartbeat timed out");
            state.conns.close(node.id);
        }
    }

    info!("timeout loop stopped");
}
