//! Client API payloads served by the coordinator's HTTP surface.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::node::ResourceUsage;
use crate::profile::EncodingProfile;

/// Request body for enqueueing a job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnqueueJobRequest {
    pub input_path: String,
    pub output_path: String,
    pub profile_name: String,
    /// Optional priority; defaults to 0
    #[serde(default)]
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnqueueJobResponse {
    pub job_id: String,
    pub success: bool,
    pub message: String,
}

/// Node summary returned by the nodes listing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NodeInfo {
    pub node_id: String,
    pub name: String,
    pub encoding_profiles: Vec<EncodingProfile>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub last_seen: DateTime<Utc>,
}

impl NodeInfo {
    pub fn from_parts(
        node_id: String,
        name: String,
        encoding_profiles: Vec<EncodingProfile>,
        resources: ResourceUsage,
        last_seen: DateTime<Utc>,
    ) -> Self {
        Self {
            node_id,
            name,
            encoding_profiles,
            cpu_percent: resources.cpu_percent,
            memory_percent: resources.memory_percent,
            disk_percent: resources.disk_percent,
            last_seen,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetAllNodesResponse {
    /// Sorted by node_id ascending
    pub nodes: Vec<NodeInfo>,
    pub total_count: usize,
}

/// Queue entry as exposed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobInfo {
    pub job_id: String,
    pub input_path: String,
    pub output_path: String,
    pub profile_name: String,
    /// One of `pending`, `assigned`, `processing`, `completed`, `failed`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_node_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetQueueResponse {
    pub pending_jobs: Vec<JobInfo>,
    pub processing_jobs: Vec<JobInfo>,
    pub total_pending: usize,
    pub total_processing: usize,
}

/// Terminal job record as exposed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobHistoryEntry {
    pub job_id: String,
    pub node_id: String,
    pub final_status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetJobHistoryResponse {
    pub jobs: Vec<JobHistoryEntry>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClearQueueResponse {
    pub success: bool,
    pub cleared_count: usize,
    pub message: String,
}
