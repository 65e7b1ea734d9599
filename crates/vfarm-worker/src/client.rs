//! Coordinator stream client.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vfarm_models::{CoordinatorFrame, CoordinatorPayload, NodeFrame, NodePayload};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::processor::JobProcessor;
use crate::resources::sample_resources;

/// Outbound frames queued before the sender applies backpressure.
const SEND_BUFFER_SIZE: usize = 32;
/// How long to wait for the disconnect acknowledgement.
const DISCONNECT_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// One registered session against the coordinator.
pub struct NodeClient {
    config: WorkerConfig,
    processor: Arc<JobProcessor>,
}

impl NodeClient {
    pub fn new(config: WorkerConfig, processor: Arc<JobProcessor>) -> Self {
        Self { config, processor }
    }

    /// Connect, register and serve the stream until the coordinator closes
    /// it or `shutdown` fires. Returns `Ok` on a clean disconnect.
    pub async fn run(&self, shutdown: CancellationToken) -> WorkerResult<()> {
        let url = self.config.stream_url();
        info!(%url, "connecting to coordinator");

        let (socket, _) = connect_async(url.as_str()).await?;
        let (mut writer, mut reader) = socket.split();

        // Registration is always the first frame on the stream.
        let register = NodeFrame::new(NodePayload::RegisterRequest {
            name: self.config.node_name.clone(),
            profiles: self.processor.advertised_profiles(),
        });
        writer
            .send(Message::Text(serde_json::to_string(&register)?))
            .await?;

        let node_id = await_registration(&mut reader).await?;
        info!(%node_id, name = %self.config.node_name, "registered with coordinator");

        // Single send task owns the sink; everything else goes through the
        // channel.
        let (tx, mut rx) = mpsc::channel::<NodeFrame>(SEND_BUFFER_SIZE);
        let send_task = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(err) => {
                        warn!(%err, "failed to serialise outbound frame");
                        continue;
                    }
                };
                if writer.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        });

        let poll_stop = shutdown.child_token();
        let poll_task = tokio::spawn(resource_loop(
            node_id.clone(),
            self.config.resource_poll_interval,
            tx.clone(),
            poll_stop.clone(),
        ));

        let result = self
            .serve(&node_id, &mut reader, &tx, &shutdown)
            .await;

        poll_stop.cancel();
        let _ = poll_task.await;
        drop(tx);
        let _ = send_task.await;
        result
    }

    async fn serve(
        &self,
        node_id: &str,
        reader: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
                  + Unpin),
        tx: &mpsc::Sender<NodeFrame>,
        shutdown: &CancellationToken,
    ) -> WorkerResult<()> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutting down, announcing disconnect");
                    let _ = tx
                        .send(NodeFrame::new(NodePayload::DisconnectRequest {
                            node_id: node_id.to_string(),
                            reason: "worker shutdown".to_string(),
                        }))
                        .await;
                    let _ = tokio::time::timeout(DISCONNECT_ACK_TIMEOUT, await_disconnect_ack(reader)).await;
                    return Ok(());
                }

                inbound = reader.next() => match inbound {
                    Some(Ok(Message::Text(text))) => self.handle_frame(tx, &text).await,
                    Some(Ok(Message::Close(_))) | None => {
                        info!("coordinator closed the stream");
                        return Ok(());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err.into()),
                }
            }
        }
    }

    async fn handle_frame(&self, tx: &mpsc::Sender<NodeFrame>, text: &str) {
        let frame: CoordinatorFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "unparseable frame from coordinator");
                return;
            }
        };

        match frame.payload {
            CoordinatorPayload::JobAssignmentRequest {
                job_id,
                input_path,
                output_path,
                profile_name,
            } => {
                self.handle_assignment(tx, job_id, input_path, output_path, profile_name)
                    .await;
            }
            CoordinatorPayload::RegisterResponse { .. } => {
                debug!("ignoring duplicate register response");
            }
            CoordinatorPayload::DisconnectResponse { .. } => {
                debug!("ignoring unsolicited disconnect response");
            }
        }
    }

    async fn handle_assignment(
        &self,
        tx: &mpsc::Sender<NodeFrame>,
        job_id: String,
        input_path: String,
        output_path: String,
        profile_name: String,
    ) {
        let permit = match self.processor.try_accept(&profile_name) {
            Ok(permit) => permit,
            Err(reason) => {
                info!(%job_id, reason, "rejecting assignment");
                let _ = tx
                    .send(NodeFrame::new(NodePayload::JobAssignmentResponse {
                        job_id,
                        accepted: false,
                        message: reason,
                    }))
                    .await;
                return;
            }
        };

        let _ = tx
            .send(NodeFrame::new(NodePayload::JobAssignmentResponse {
                job_id: job_id.clone(),
                accepted: true,
                message: String::new(),
            }))
            .await;

        // The job runs off the stream loop so metrics and further frames
        // keep flowing while ffmpeg works.
        let processor = Arc::clone(&self.processor);
        let tx = tx.clone();
        tokio::spawn(async move {
            let result = processor
                .process(permit, &job_id, &input_path, &output_path, &profile_name)
                .await;

            let (success, message) = match result {
                Ok(()) => (true, "transcode complete".to_string()),
                Err(err) => {
                    warn!(%job_id, %err, "job failed");
                    (false, err.to_string())
                }
            };

            let _ = tx
                .send(NodeFrame::new(NodePayload::JobCompletionRequest {
                    job_id,
                    success,
                    message,
                }))
                .await;
        });
    }
}

/// Wait for the registration reply; anything else is a protocol error.
async fn await_registration(
    reader: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
              + Unpin),
) -> WorkerResult<String> {
    loop {
        match reader.next().await {
            Some(Ok(Message::Text(text))) => {
                let frame: CoordinatorFrame = serde_json::from_str(&text)?;
                return match frame.payload {
                    CoordinatorPayload::RegisterResponse {
                        node_id,
                        success: true,
                        ..
                    } => Ok(node_id),
                    CoordinatorPayload::RegisterResponse { message, .. } => {
                        Err(WorkerError::RegistrationFailed(message))
                    }
                    other => Err(WorkerError::protocol(format!(
                        "expected register response, got {other:?}"
                    ))),
                };
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => return Err(err.into()),
            None => {
                return Err(WorkerError::ConnectionFailed(
                    "stream closed during registration".to_string(),
                ))
            }
        }
    }
}

/// Drain frames until the disconnect acknowledgement shows up.
async fn await_disconnect_ack(
    reader: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
              + Unpin),
) {
    while let Some(Ok(Message::Text(text))) = reader.next().await {
        if let Ok(frame) = serde_json::from_str::<CoordinatorFrame>(&text) {
            if matches!(frame.payload, CoordinatorPayload::DisconnectResponse { .. }) {
                debug!("disconnect acknowledged");
                return;
            }
        }
    }
}

/// Periodic resource snapshots; each one refreshes the coordinator-side
/// heartbeat.
async fn resource_loop(
    node_id: String,
    poll_interval: Duration,
    tx: mpsc::Sender<NodeFrame>,
    stop: CancellationToken,
) {
    let mut ticker = interval(poll_interval);
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let usage = sample_resources().await;
        let frame = NodeFrame::new(NodePayload::ResourceUsageRequest {
            node_id: node_id.clone(),
            cpu_percent: usage.cpu_percent,
            memory_percent: usage.memory_percent,
            disk_percent: usage.disk_percent,
        });

        if tx.send(frame).await.is_err() {
            break;
        }
    }
}
