//! Orchestrator service façade.
//!
//! Composes the node pool, job queue, job tracker and scheduler behind the
//! coordinator's public contract. A single coarse mutex serialises the
//! multi-store transactions (dequeue→track, complete, reject); the stores'
//! own locks are only relied on for single-store reads.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};
use vfarm_models::{
    EncodingProfile, Job, JobHistory, JobId, JobParams, JobProgress, JobStatus, Node, NodeFilter,
    NodeId, ResourceUsage,
};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::pool::{InMemoryNodePool, NodePool};
use crate::queue::{InMemoryJobQueue, JobQueue};
use crate::scheduler::{RoundRobinScheduler, Scheduler};
use crate::tracker::{InMemoryJobTracker, JobTracker};

pub struct OrchestratorService {
    pool: Arc<dyn NodePool>,
    queue: Arc<dyn JobQueue>,
    tracker: Arc<dyn JobTracker>,
    scheduler: Arc<dyn Scheduler>,
    /// Guards every transaction that spans more than one store.
    txn: Mutex<()>,
}

impl OrchestratorService {
    pub fn new(
        pool: Arc<dyn NodePool>,
        queue: Arc<dyn JobQueue>,
        tracker: Arc<dyn JobTracker>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            pool,
            queue,
            tracker,
            scheduler,
            txn: Mutex::new(()),
        }
    }

    /// Service over the default in-memory stores and round-robin policy.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryNodePool::new()),
            Arc::new(InMemoryJobQueue::new()),
            Arc::new(InMemoryJobTracker::new()),
            Arc::new(RoundRobinScheduler::new()),
        )
    }

    // --- node management -------------------------------------------------

    pub fn register_node(
        &self,
        name: String,
        profiles: Vec<EncodingProfile>,
    ) -> OrchestratorResult<Node> {
        let node = self.pool.register(vfarm_models::NodeRegistration { name, profiles })?;
        info!(node_id = %node.id, name = %node.name, "node registered");
        Ok(node)
    }

    pub fn unregister_node(&self, node_id: NodeId) -> OrchestratorResult<()> {
        self.pool.unregister(node_id)?;
        info!(%node_id, "node unregistered");
        Ok(())
    }

    pub fn update_node_metrics(
        &self,
        node_id: &str,
        usage: ResourceUsage,
        reported_at: DateTime<Utc>,
    ) -> OrchestratorResult<()> {
        let node_id = parse_node_id(node_id)?;
        self.pool.update_metrics(node_id, usage, reported_at)
    }

    pub fn list_nodes(&self) -> Vec<Node> {
        self.pool.list(0, 0)
    }

    pub fn get_node(&self, node_id: NodeId) -> OrchestratorResult<Node> {
        self.pool.get(node_id)
    }

    pub fn get_timed_out_nodes(&self, timeout: Duration) -> OrchestratorResult<Vec<Node>> {
        self.pool.get_timed_out(timeout)
    }

    // --- job intake ------------------------------------------------------

    pub fn enqueue_job(&self, params: JobParams) -> OrchestratorResult<Job> {
        self.queue.enqueue(params)
    }

    pub fn enqueue_job_with_priority(
        &self,
        params: JobParams,
        priority: i32,
    ) -> OrchestratorResult<Job> {
        self.queue.enqueue_with_priority(params, priority)
    }

    /// Look up any job the queue has minted, pending or dispatched.
    pub fn get_job(&self, job_id: JobId) -> OrchestratorResult<Job> {
        self.queue.get_job(job_id)
    }

    // --- dispatch --------------------------------------------------------

    /// Turn one pending job into one tracked assignment.
    ///
    /// Under the service mutex: dequeue, find candidates for the job's
    /// profile, consult the scheduler against the current active map, and
    /// record the assignment. Any failure after the dequeue requeues the
    /// job (with priority decay) before the error is returned, so no work
    /// is lost.
    pub async fn dequeue_job(&self) -> OrchestratorResult<(Job, Node)> {
        let _guard = self.txn.lock().await;

        let job = self.queue.dequeue()?;

        let mut candidates = self
            .pool
            .get_available(&NodeFilter::for_profile(&job.params.profile_name));
        candidates.sort_by_key(|n| n.id);

        let active = self.tracker.get_active();

        let node = match self.scheduler.select_best_node(&job, &candidates, &active) {
            Ok(node) => node,
            Err(err) => {
                self.queue.requeue(job)?;
                return Err(err);
            }
        };

        if let Err(err) = self.tracker.track(job.id, node.id) {
            // Tracking failed before anything was announced to a node, so
            // requeueing is the only side effect to undo.
            self.queue.requeue(job)?;
            return Err(err);
        }

        debug!(job_id = %job.id, node_id = %node.id, "job assigned");
        Ok((job, node))
    }

    // --- worker feedback -------------------------------------------------

    /// Record that the worker accepted the assignment and is transcoding.
    pub async fn mark_job_running(&self, job_id: &str) -> OrchestratorResult<()> {
        let job_id = parse_job_id(job_id)?;
        let _guard = self.txn.lock().await;
        self.tracker
            .update_progress(job_id, JobStatus::Running, None)
    }

    /// Terminal completion reported by the worker.
    pub async fn complete_job(
        &self,
        job_id: &str,
        success: bool,
        message: Option<String>,
    ) -> OrchestratorResult<JobHistory> {
        let job_id = parse_job_id(job_id)?;
        let _guard = self.txn.lock().await;
        let history = self.tracker.complete(job_id, success, message)?;
        info!(%job_id, status = %history.status, "job finished");
        Ok(history)
    }

    /// Worker declined the assignment: move the tracked entry to history as
    /// failed and put the job back in the queue with decayed priority.
    pub async fn reject_job(&self, job_id: &str, reason: &str) -> OrchestratorResult<Job> {
        let job_id = parse_job_id(job_id)?;
        let _guard = self.txn.lock().await;

        self.tracker
            .complete(job_id, false, Some(format!("Job rejected: {reason}")))?;

        let job = self.queue.get_job(job_id)?;
        let requeued = self.queue.requeue(job)?;
        info!(%job_id, reason, priority = requeued.priority, "job rejected, requeued");
        Ok(requeued)
    }

    // --- observability ---------------------------------------------------

    /// Pending jobs plus the active-by-node map, for the queue endpoint.
    pub fn get_queue_info(&self) -> (Vec<Job>, HashMap<NodeId, Vec<JobProgress>>) {
        (self.queue.list_jobs(), self.tracker.get_active())
    }

    /// Terminal job records, newest first.
    ///
    /// `status_filter` is one of `""` (all), `"completed"` or `"failed"`;
    /// `limit` of 0 means unlimited.
    pub fn get_job_history(
        &self,
        status_filter: &str,
        limit: usize,
    ) -> OrchestratorResult<Vec<JobHistory>> {
        let wanted = match status_filter {
            "" => None,
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            other => {
                return Err(OrchestratorError::invalid_input(format!(
                    "unknown status filter: {other}"
                )))
            }
        };

        let mut rows: Vec<JobHistory> = self
            .tracker
            .get_history()
            .into_values()
            .flatten()
            .filter(|h| wanted.map_or(true, |s| h.status == s))
            .collect();
        rows.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

        if limit > 0 {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    pub fn clear_queue(&self) -> usize {
        self.queue.clear()
    }

    /// Active entries that have not been updated within `timeout`; surfaces
    /// jobs orphaned by dead nodes for administrative requeue.
    pub fn get_stale_jobs(&self, timeout: Duration) -> Vec<JobProgress> {
        self.tracker.get_stale(timeout)
    }

    pub fn cleanup_history(&self, older_than: Duration) -> usize {
        self.tracker.cleanup(older_than)
    }
}

fn parse_node_id(s: &str) -> OrchestratorResult<NodeId> {
    NodeId::parse(s)
        .map_err(|_| OrchestratorError::invalid_input(format!("malformed node id: {s}")))
}

fn parse_job_id(s: &str) -> OrchestratorResult<JobId> {
    JobId::parse(s)
        .map_err(|_| OrchestratorError::invalid_input(format!("malformed job id: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profiles(names: &[&str]) -> Vec<EncodingProfile> {
        names
            .iter()
            .map(|n| EncodingProfile::unbenchmarked(*n, "libx264", vec![]))
            .collect()
    }

    fn params(profile: &str) -> JobParams {
        JobParams {
            input_path: "in.mp4".into(),
            output_path: "out.mp4".into(),
            profile_name: profile.into(),
        }
    }

    #[tokio::test]
    async fn happy_path_enqueue_dispatch_complete() {
        let service = OrchestratorService::in_memory();
        let node = service
            .register_node("wA".into(), profiles(&["P1"]))
            .unwrap();

        let job = service.enqueue_job(params("P1")).unwrap();
        let (dispatched, chosen) = service.dequeue_job().await.unwrap();
        assert_eq!(dispatched.id, job.id);
        assert_eq!(chosen.id, node.id);
        // The chosen node really can run the job's profile.
        assert!(chosen.has_profile(&dispatched.params.profile_name));

        service
            .mark_job_running(&job.id.to_string())
            .await
            .unwrap();
        service
            .complete_job(&job.id.to_string(), true, None)
            .await
            .unwrap();

        let history = service.get_job_history("", 0).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, JobStatus::Completed);
        assert_eq!(history[0].node_id, node.id);

        // The job lives in exactly one place: history.
        let (pending, active) = service.get_queue_info();
        assert!(pending.is_empty());
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn profile_mismatch_keeps_job_pending() {
        let service = OrchestratorService::in_memory();
        service
            .register_node("wA".into(), profiles(&["P1"]))
            .unwrap();
        service.enqueue_job(params("P2")).unwrap();

        for _ in 0..3 {
            let err = service.dequeue_job().await.unwrap_err();
            assert_eq!(err, OrchestratorError::NoAvailableNodes("P2".into()));
        }

        let (pending, active) = service.get_queue_info();
        assert_eq!(pending.len(), 1);
        assert!(active.is_empty());
        // Each failed tick decayed the priority.
        assert_eq!(pending[0].priority, -3);
    }

    #[tokio::test]
    async fn dequeue_with_empty_queue_is_soft_failure() {
        let service = OrchestratorService::in_memory();
        let err = service.dequeue_job().await.unwrap_err();
        assert_eq!(err, OrchestratorError::EmptyQueue);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn reject_requeues_with_priority_decay_then_other_node_completes() {
        let service = OrchestratorService::in_memory();
        let a = service
            .register_node("wA".into(), profiles(&["P1"]))
            .unwrap();
        let b = service
            .register_node("wB".into(), profiles(&["P1"]))
            .unwrap();

        let job = service.enqueue_job(params("P1")).unwrap();

        let (_, first) = service.dequeue_job().await.unwrap();
        let requeued = service
            .reject_job(&job.id.to_string(), "busy")
            .await
            .unwrap();
        assert_eq!(requeued.id, job.id);
        assert_eq!(requeued.priority, -1);

        let (retried, second) = service.dequeue_job().await.unwrap();
        assert_eq!(retried.id, job.id);
        // The cursor advanced past the rejecting node.
        assert_ne!(second.id, first.id);
        assert!([a.id, b.id].contains(&second.id));

        service
            .complete_job(&job.id.to_string(), true, None)
            .await
            .unwrap();

        let completed = service.get_job_history("completed", 0).unwrap();
        let failed = service.get_job_history("failed", 0).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(failed.len(), 1);
        assert!(failed[0]
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("Job rejected: busy"));
    }

    #[tokio::test]
    async fn single_busy_node_yields_no_idle_node() {
        let service = OrchestratorService::in_memory();
        service
            .register_node("wA".into(), profiles(&["P1"]))
            .unwrap();

        service.enqueue_job(params("P1")).unwrap();
        service.enqueue_job(params("P1")).unwrap();

        let (first, _) = service.dequeue_job().await.unwrap();
        let err = service.dequeue_job().await.unwrap_err();
        assert_eq!(err, OrchestratorError::NoIdleNode);
        assert!(err.is_retryable());

        // The second job went back to the queue, the first is still active.
        let (pending, active) = service.get_queue_info();
        assert_eq!(pending.len(), 1);
        assert_eq!(active.values().flatten().count(), 1);
        assert_ne!(pending[0].id, first.id);
    }

    #[tokio::test]
    async fn malformed_ids_fail_with_invalid_input() {
        let service = OrchestratorService::in_memory();
        assert!(matches!(
            service.complete_job("not-a-uuid", true, None).await,
            Err(OrchestratorError::InvalidInput(_))
        ));
        assert!(matches!(
            service.update_node_metrics("nope", ResourceUsage::default(), Utc::now()),
            Err(OrchestratorError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn double_complete_fails_with_not_found() {
        let service = OrchestratorService::in_memory();
        service
            .register_node("wA".into(), profiles(&["P1"]))
            .unwrap();
        let job = service.enqueue_job(params("P1")).unwrap();
        service.dequeue_job().await.unwrap();

        service
            .complete_job(&job.id.to_string(), true, None)
            .await
            .unwrap();
        let err = service
            .complete_job(&job.id.to_string(), true, None)
            .await
            .unwrap_err();
        assert_eq!(err, OrchestratorError::JobNotFound(job.id));
    }

    #[tokio::test]
    async fn unknown_status_filter_is_rejected() {
        let service = OrchestratorService::in_memory();
        assert!(matches!(
            service.get_job_history("pending", 0),
            Err(OrchestratorError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn clear_queue_reports_pre_clear_depth() {
        let service = OrchestratorService::in_memory();
        for _ in 0..5 {
            service.enqueue_job(params("P1")).unwrap();
        }
        assert_eq!(service.clear_queue(), 5);
        let (pending, _) = service.get_queue_info();
        assert!(pending.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_enqueue_then_drain_loses_nothing() {
        let service = Arc::new(OrchestratorService::in_memory());
        service
            .register_node("wA".into(), profiles(&["P1"]))
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..1000 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service.enqueue_job(params("P1")).unwrap().id
            }));
        }

        let mut enqueued = std::collections::HashSet::new();
        for handle in handles {
            assert!(enqueued.insert(handle.await.unwrap()));
        }
        assert_eq!(enqueued.len(), 1000);

        // Single-node drain: every dispatch is followed by a completion.
        let mut drained = std::collections::HashSet::new();
        for _ in 0..1000 {
            let (job, _) = service.dequeue_job().await.unwrap();
            service
                .complete_job(&job.id.to_string(), true, None)
                .await
                .unwrap();
            assert!(drained.insert(job.id), "job {} dispatched twice", job.id);
        }

        assert_eq!(service.get_job_history("", 0).unwrap().len(), 1000);
        let (pending, active) = service.get_queue_info();
        assert!(pending.is_empty());
        assert!(active.is_empty());
        assert_eq!(drained, enqueued);
    }
}
