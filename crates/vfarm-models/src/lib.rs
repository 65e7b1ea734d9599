//! Shared data models for the vfarm transcoding farm.
//!
//! Everything that crosses a crate boundary lives here: node and job
//! domain types, the worker wire protocol, and the client API payloads.

pub mod api;
pub mod job;
pub mod node;
pub mod profile;
pub mod progress;
pub mod wire;

pub use api::{
    ClearQueueResponse, EnqueueJobRequest, EnqueueJobResponse, GetAllNodesResponse,
    GetJobHistoryResponse, GetQueueResponse, JobHistoryEntry, JobInfo, NodeInfo,
};
pub use job::{Job, JobId, JobParams};
pub use node::{Node, NodeFilter, NodeId, NodeRegistration, ResourceUsage};
pub use profile::EncodingProfile;
pub use progress::{JobHistory, JobProgress, JobStatus};
pub use wire::{CoordinatorFrame, CoordinatorPayload, NodeFrame, NodePayload};
