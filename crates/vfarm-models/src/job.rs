//! Transcoding job domain types.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a job, minted at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Mint a fresh random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from its string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What to transcode: input object, output object, and the profile to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobParams {
    pub input_path: String,
    pub output_path: String,
    pub profile_name: String,
}

/// A queued transcoding job.
///
/// `priority` starts at 0 and decays by one on every requeue, so lower
/// values indicate more failed attempts. Ordering in the queue is by
/// priority (higher first), FIFO within equal priority.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,
    pub params: JobParams,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job with the given priority.
    pub fn with_priority(params: JobParams, priority: i32) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            params,
            priority,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new job with the default priority of 0.
    pub fn new(params: JobParams) -> Self {
        Self::with_priority(params, 0)
    }
}
