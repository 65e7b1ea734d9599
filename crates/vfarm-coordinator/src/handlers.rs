//! Client API handlers.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;
use vfarm_models::{
    ClearQueueResponse, EnqueueJobRequest, EnqueueJobResponse, GetAllNodesResponse,
    GetJobHistoryResponse, GetQueueResponse, JobHistoryEntry, JobInfo, JobParams, JobStatus,
    NodeInfo,
};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn health() -> &'static str {
    "ok"
}

/// `POST /api/v1/jobs`: enqueue a transcoding job.
pub async fn enqueue_job(
    State(state): State<AppState>,
    Json(request): Json<EnqueueJobRequest>,
) -> ApiResult<Json<EnqueueJobResponse>> {
    let params = JobParams {
        input_path: request.input_path,
        output_path: request.output_path,
        profile_name: request.profile_name,
    };

    let job = match request.priority {
        Some(priority) => state.service.enqueue_job_with_priority(params, priority)?,
        None => state.service.enqueue_job(params)?,
    };
    info!(job_id = %job.id, profile = %job.params.profile_name, "job enqueued");

    Ok(Json(EnqueueJobResponse {
        job_id: job.id.to_string(),
        success: true,
        message: "Job successfully enqueued".to_string(),
    }))
}

/// `GET /api/v1/nodes`: every registered node, sorted by node ID.
pub async fn get_all_nodes(State(state): State<AppState>) -> ApiResult<Json<GetAllNodesResponse>> {
    let mut nodes = state.service.list_nodes();
    nodes.sort_by_key(|n| n.id);

    let infos: Vec<NodeInfo> = nodes
        .into_iter()
        .map(|n| {
            NodeInfo::from_parts(n.id.to_string(), n.name, n.profiles, n.resources, n.heartbeat)
        })
        .collect();

    Ok(Json(GetAllNodesResponse {
        total_count: infos.len(),
        nodes: infos,
    }))
}

/// `GET /api/v1/queue`: pending and in-flight jobs.
pub async fn get_queue(State(state): State<AppState>) -> ApiResult<Json<GetQueueResponse>> {
    let (pending, active) = state.service.get_queue_info();

    let pending_jobs: Vec<JobInfo> = pending
        .into_iter()
        .map(|job| JobInfo {
            job_id: job.id.to_string(),
            input_path: job.params.input_path,
            output_path: job.params.output_path,
            profile_name: job.params.profile_name,
            status: "pending".to_string(),
            assigned_node_id: None,
            created_at: job.created_at,
            updated_at: job.updated_at,
        })
        .collect();

    let mut processing_jobs = Vec::new();
    for (node_id, entries) in active {
        for progress in entries {
            // The queue retains every job it minted, so the params lookup
            // only fails for jobs that predate a coordinator restart.
            let params = state
                .service
                .get_job(progress.job_id)
                .map(|j| j.params)
                .unwrap_or_else(|_| JobParams {
                    input_path: String::new(),
                    output_path: String::new(),
                    profile_name: String::new(),
                });

            let status = match progress.status {
                JobStatus::Assigned => "assigned",
                JobStatus::Running => "processing",
                other => other.as_str(),
            };

            processing_jobs.push(JobInfo {
                job_id: progress.job_id.to_string(),
                input_path: params.input_path,
                output_path: params.output_path,
                profile_name: params.profile_name,
                status: status.to_string(),
                assigned_node_id: Some(node_id.to_string()),
                created_at: progress.started_at,
                updated_at: progress.updated_at,
            });
        }
    }
    processing_jobs.sort_by(|a, b| a.job_id.cmp(&b.job_id));

    Ok(Json(GetQueueResponse {
        total_pending: pending_jobs.len(),
        total_processing: processing_jobs.len(),
        pending_jobs,
        processing_jobs,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// `""` (all), `"completed"` or `"failed"`
    #[serde(default)]
    pub status: String,
    /// 0 means unlimited
    #[serde(default)]
    pub limit: usize,
}

/// `GET /api/v1/history`: terminal job records, newest first.
pub async fn get_job_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<GetJobHistoryResponse>> {
    let rows = state.service.get_job_history(&query.status, query.limit)?;

    let jobs: Vec<JobHistoryEntry> = rows
        .into_iter()
        .map(|h| JobHistoryEntry {
            job_id: h.job_id.to_string(),
            node_id: h.node_id.to_string(),
            final_status: h.status.as_str().to_string(),
            started_at: h.started_at,
            completed_at: h.completed_at,
            duration_secs: h.duration_secs,
            retry_count: h.retry_count,
            error_message: h.error_message,
        })
        .collect();

    Ok(Json(GetJobHistoryResponse {
        total_count: jobs.len(),
        jobs,
    }))
}

/// `DELETE /api/v1/queue`: drop every pending job.
pub async fn clear_queue(State(state): State<AppState>) -> ApiResult<Json<ClearQueueResponse>> {
    let cleared = state.service.clear_queue();
    info!(cleared, "queue cleared");

    Ok(Json(ClearQueueResponse {
        success: true,
        cleared_count: cleared,
        message: format!("Cleared {cleared} pending jobs"),
    }))
}
