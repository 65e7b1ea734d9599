//! Worker wire protocol.
//!
//! Frames travel as JSON text messages over the coordinator's bidirectional
//! stream. Every frame carries a message ID and a timestamp; the payload is
//! an internally tagged variant. Workers only ever send `NodeFrame`s and the
//! coordinator only ever sends `CoordinatorFrame`s; a payload arriving from
//! the wrong role is a protocol violation and closes the stream.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::profile::EncodingProfile;

/// Payloads a worker may send to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodePayload {
    /// Must be the first frame on every new stream.
    RegisterRequest {
        name: String,
        profiles: Vec<EncodingProfile>,
    },

    /// Periodic resource snapshot; doubles as the heartbeat.
    ResourceUsageRequest {
        node_id: String,
        cpu_percent: f64,
        memory_percent: f64,
        disk_percent: f64,
    },

    /// Accept or reject a job assignment.
    JobAssignmentResponse {
        job_id: String,
        accepted: bool,
        message: String,
    },

    /// Report a finished job.
    JobCompletionRequest {
        job_id: String,
        success: bool,
        message: String,
    },

    /// Announce a clean shutdown.
    DisconnectRequest { node_id: String, reason: String },
}

/// Payloads the coordinator may send to a worker.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinatorPayload {
    /// Reply to a successful registration.
    RegisterResponse {
        node_id: String,
        success: bool,
        message: String,
    },

    /// Ask the worker to run a job.
    JobAssignmentRequest {
        job_id: String,
        input_path: String,
        output_path: String,
        profile_name: String,
    },

    /// Acknowledge a worker's disconnect request.
    DisconnectResponse { acknowledged: bool },
}

/// Envelope for worker-to-coordinator frames.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NodeFrame {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: NodePayload,
}

impl NodeFrame {
    /// Wrap a payload with a fresh message ID and the current time.
    pub fn new(payload: NodePayload) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Envelope for coordinator-to-worker frames.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CoordinatorFrame {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: CoordinatorPayload,
}

impl CoordinatorFrame {
    /// Wrap a payload with a fresh message ID and the current time.
    pub fn new(payload: CoordinatorPayload) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_roundtrip() {
        let frame = NodeFrame::new(NodePayload::RegisterRequest {
            name: "worker-a".to_string(),
            profiles: vec![EncodingProfile::unbenchmarked(
                "H264_1080p",
                "libx264",
                vec!["-crf".into(), "23".into()],
            )],
        });

        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"register_request\""));

        let back: NodeFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back.message_id, frame.message_id);
        match back.payload {
            NodePayload::RegisterRequest { name, profiles } => {
                assert_eq!(name, "worker-a");
                assert_eq!(profiles.len(), 1);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn assignment_request_tag() {
        let frame = CoordinatorFrame::new(CoordinatorPayload::JobAssignmentRequest {
            job_id: "j1".into(),
            input_path: "in.mp4".into(),
            output_path: "out.mp4".into(),
            profile_name: "HEVC_4K".into(),
        });

        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"type\":\"job_assignment_request\""));
        assert!(json.contains("\"profile_name\":\"HEVC_4K\""));
    }

    #[test]
    fn unknown_payload_type_is_rejected() {
        let json = r#"{"message_id":"m","timestamp":"2026-01-01T00:00:00Z","type":"register_response","node_id":"n","success":true,"message":""}"#;
        assert!(serde_json::from_str::<NodeFrame>(json).is_err());
    }
}
