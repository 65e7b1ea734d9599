//! In-flight and historical job tracking types.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::JobId;
use crate::node::NodeId;

/// Lifecycle state of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Assignment recorded, not yet acknowledged by the worker
    Assigned,
    /// Worker accepted and is transcoding
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error (worker failure or rejection)
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Assigned => "assigned",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress record for a job between assignment and completion.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobProgress {
    pub job_id: JobId,
    pub node_id: NodeId,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JobProgress {
    /// Fresh progress entry for a newly assigned job.
    pub fn assigned(job_id: JobId, node_id: NodeId, now: DateTime<Utc>) -> Self {
        Self {
            job_id,
            node_id,
            status: JobStatus::Assigned,
            started_at: now,
            updated_at: now,
            completed_at: None,
            error_message: None,
        }
    }
}

/// Terminal record retained after a job leaves the active set.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobHistory {
    pub job_id: JobId,
    pub node_id: NodeId,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Wall-clock seconds between assignment and completion
    pub duration_secs: f64,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}
