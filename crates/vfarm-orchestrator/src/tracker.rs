//! Lifecycle store for in-flight and historical jobs.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;
use vfarm_models::{JobHistory, JobId, JobProgress, JobStatus, NodeId};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Tracks jobs between assignment and completion, and keeps a bounded-by-age
/// history of terminal outcomes.
///
/// Both maps are keyed by node ID: the scheduler needs a cheap node→load
/// view, and job-ID lookups tolerate a linear scan at realistic fleet sizes.
pub trait JobTracker: Send + Sync {
    /// Record a tentative assignment. Fails with `AlreadyTracked` if the job
    /// is active under any node.
    fn track(&self, job_id: JobId, node_id: NodeId) -> OrchestratorResult<()>;

    /// Update status and error message of an active job, refreshing
    /// `updated_at`.
    fn update_progress(
        &self,
        job_id: JobId,
        status: JobStatus,
        error_message: Option<String>,
    ) -> OrchestratorResult<()>;

    /// Defensive copy of an active job's progress.
    fn get_progress(&self, job_id: JobId) -> OrchestratorResult<JobProgress>;

    /// Terminate tracking: set the final status, append a history row under
    /// the same node key and remove the active entry. A second call for the
    /// same job fails with `JobNotFound`.
    fn complete(
        &self,
        job_id: JobId,
        success: bool,
        error_message: Option<String>,
    ) -> OrchestratorResult<JobHistory>;

    /// Defensive copy of the whole active map.
    fn get_active(&self) -> HashMap<NodeId, Vec<JobProgress>>;

    /// Active entries under one node.
    fn get_by_node(&self, node_id: NodeId) -> Vec<JobProgress>;

    /// Active entries with the given status, across all nodes.
    fn get_by_status(&self, status: JobStatus) -> Vec<JobProgress>;

    /// Active entries whose `updated_at` is older than `timeout`.
    fn get_stale(&self, timeout: Duration) -> Vec<JobProgress>;

    /// Defensive copy of the whole history map.
    fn get_history(&self) -> HashMap<NodeId, Vec<JobHistory>>;

    /// Prune history rows completed strictly before `older_than` ago.
    /// Returns the number of rows removed.
    fn cleanup(&self, older_than: Duration) -> usize;
}

#[derive(Default)]
struct TrackerInner {
    active: HashMap<NodeId, Vec<JobProgress>>,
    history: HashMap<NodeId, Vec<JobHistory>>,
}

/// In-memory job tracker.
#[derive(Default)]
pub struct InMemoryJobTracker {
    inner: RwLock<TrackerInner>,
}

impl InMemoryJobTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobTracker for InMemoryJobTracker {
    fn track(&self, job_id: JobId, node_id: NodeId) -> OrchestratorResult<()> {
        let mut inner = self.inner.write().expect("job tracker lock poisoned");

        let already_tracked = inner
            .active
            .values()
            .flatten()
            .any(|p| p.job_id == job_id);
        if already_tracked {
            return Err(OrchestratorError::AlreadyTracked(job_id));
        }

        let progress = JobProgress::assigned(job_id, node_id, Utc::now());
        inner.active.entry(node_id).or_default().push(progress);
        debug!(%job_id, %node_id, "tracking job");
        Ok(())
    }

    fn update_progress(
        &self,
        job_id: JobId,
        status: JobStatus,
        error_message: Option<String>,
    ) -> OrchestratorResult<()> {
        let mut inner = self.inner.write().expect("job tracker lock poisoned");
        let progress = inner
            .active
            .values_mut()
            .flatten()
            .find(|p| p.job_id == job_id)
            .ok_or(OrchestratorError::JobNotFound(job_id))?;

        progress.status = status;
        if error_message.is_some() {
            progress.error_message = error_message;
        }
        progress.updated_at = Utc::now();
        Ok(())
    }

    fn get_progress(&self, job_id: JobId) -> OrchestratorResult<JobProgress> {
        let inner = self.inner.read().expect("job tracker lock poisoned");
        inner
            .active
            .values()
            .flatten()
            .find(|p| p.job_id == job_id)
            .cloned()
            .ok_or(OrchestratorError::JobNotFound(job_id))
    }

    fn complete(
        &self,
        job_id: JobId,
        success: bool,
        error_message: Option<String>,
    ) -> OrchestratorResult<JobHistory> {
        let mut inner = self.inner.write().expect("job tracker lock poisoned");

        let (node_id, index) = inner
            .active
            .iter()
            .find_map(|(node_id, jobs)| {
                jobs.iter()
                    .position(|p| p.job_id == job_id)
                    .map(|i| (*node_id, i))
            })
            .ok_or(OrchestratorError::JobNotFound(job_id))?;

        let entries = inner
            .active
            .get_mut(&node_id)
            .ok_or(OrchestratorError::JobNotFound(job_id))?;
        let mut progress = entries.remove(index);
        if entries.is_empty() {
            inner.active.remove(&node_id);
        }

        let now = Utc::now();
        progress.status = if success {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        progress.completed_at = Some(now);
        progress.updated_at = now;
        if error_message.is_some() {
            progress.error_message = error_message;
        }

        let history = JobHistory {
            job_id,
            node_id,
            status: progress.status,
            started_at: progress.started_at,
            completed_at: now,
            duration_secs: (now - progress.started_at)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .as_secs_f64(),
            // TODO: thread the queue's decayed priority through so retries show up here
            retry_count: 0,
            error_message: progress.error_message,
        };

        inner.history.entry(node_id).or_default().push(history.clone());
        debug!(%job_id, %node_id, status = %history.status, "job completed");
        Ok(history)
    }

    fn get_active(&self) -> HashMap<NodeId, Vec<JobProgress>> {
        let inner = self.inner.read().expect("job tracker lock poisoned");
        inner.active.clone()
    }

    fn get_by_node(&self, node_id: NodeId) -> Vec<JobProgress> {
        let inner = self.inner.read().expect("job tracker lock poisoned");
        inner.active.get(&node_id).cloned().unwrap_or_default()
    }

    fn get_by_status(&self, status: JobStatus) -> Vec<JobProgress> {
        let inner = self.inner.read().expect("job tracker lock poisoned");
        inner
            .active
            .values()
            .flatten()
            .filter(|p| p.status == status)
            .cloned()
            .collect()
    }

    fn get_stale(&self, timeout: Duration) -> Vec<JobProgress> {
        let now = Utc::now();
        let inner = self.inner.read().expect("job tracker lock poisoned");
        inner
            .active
            .values()
            .flatten()
            .filter(|p| (now - p.updated_at).to_std().unwrap_or(Duration::ZERO) > timeout)
            .cloned()
            .collect()
    }

    fn get_history(&self) -> HashMap<NodeId, Vec<JobHistory>> {
        let inner = self.inner.read().expect("job tracker lock poisoned");
        inner.history.clone()
    }

    fn cleanup(&self, older_than: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::zero());
        let mut inner = self.inner.write().expect("job tracker lock poisoned");

        let mut removed = 0;
        inner.history.retain(|_, rows| {
            let before = rows.len();
            rows.retain(|h| h.completed_at >= cutoff);
            removed += before - rows.len();
            !rows.is_empty()
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_then_complete_moves_to_history() {
        let tracker = InMemoryJobTracker::new();
        let (job, node) = (JobId::new(), NodeId::new());

        tracker.track(job, node).unwrap();
        let progress = tracker.get_progress(job).unwrap();
        assert_eq!(progress.status, JobStatus::Assigned);
        assert_eq!(progress.node_id, node);

        let history = tracker.complete(job, true, None).unwrap();
        assert_eq!(history.status, JobStatus::Completed);
        assert_eq!(history.node_id, node);

        // Active slot for the node is gone entirely.
        assert!(tracker.get_active().is_empty());
        assert_eq!(tracker.get_history().get(&node).unwrap().len(), 1);
    }

    #[test]
    fn double_track_fails() {
        let tracker = InMemoryJobTracker::new();
        let job = JobId::new();
        tracker.track(job, NodeId::new()).unwrap();
        let err = tracker.track(job, NodeId::new()).unwrap_err();
        assert_eq!(err, OrchestratorError::AlreadyTracked(job));
    }

    #[test]
    fn double_complete_fails_with_not_found() {
        let tracker = InMemoryJobTracker::new();
        let (job, node) = (JobId::new(), NodeId::new());
        tracker.track(job, node).unwrap();
        tracker.complete(job, true, None).unwrap();

        let err = tracker.complete(job, true, None).unwrap_err();
        assert_eq!(err, OrchestratorError::JobNotFound(job));
    }

    #[test]
    fn failed_completion_records_error() {
        let tracker = InMemoryJobTracker::new();
        let (job, node) = (JobId::new(), NodeId::new());
        tracker.track(job, node).unwrap();

        let history = tracker
            .complete(job, false, Some("encoder crashed".to_string()))
            .unwrap();
        assert_eq!(history.status, JobStatus::Failed);
        assert_eq!(history.error_message.as_deref(), Some("encoder crashed"));
    }

    #[test]
    fn update_progress_changes_status() {
        let tracker = InMemoryJobTracker::new();
        let (job, node) = (JobId::new(), NodeId::new());
        tracker.track(job, node).unwrap();

        tracker
            .update_progress(job, JobStatus::Running, None)
            .unwrap();
        assert_eq!(tracker.get_progress(job).unwrap().status, JobStatus::Running);
        assert_eq!(tracker.get_by_status(JobStatus::Running).len(), 1);
        assert!(tracker.get_by_status(JobStatus::Assigned).is_empty());
    }

    #[test]
    fn per_node_load_view() {
        let tracker = InMemoryJobTracker::new();
        let (node_a, node_b) = (NodeId::new(), NodeId::new());
        tracker.track(JobId::new(), node_a).unwrap();
        tracker.track(JobId::new(), node_a).unwrap();
        tracker.track(JobId::new(), node_b).unwrap();

        assert_eq!(tracker.get_by_node(node_a).len(), 2);
        assert_eq!(tracker.get_by_node(node_b).len(), 1);
        assert!(tracker.get_by_node(NodeId::new()).is_empty());

        let active = tracker.get_active();
        assert_eq!(active.len(), 2);
        assert_eq!(active[&node_a].len(), 2);
    }

    #[test]
    fn fresh_jobs_are_not_stale() {
        let tracker = InMemoryJobTracker::new();
        tracker.track(JobId::new(), NodeId::new()).unwrap();
        assert!(tracker.get_stale(Duration::from_secs(60)).is_empty());
        // Zero timeout surfaces everything updated before "now".
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(tracker.get_stale(Duration::ZERO).len(), 1);
    }

    #[test]
    fn cleanup_prunes_old_history_only() {
        let tracker = InMemoryJobTracker::new();
        let (job, node) = (JobId::new(), NodeId::new());
        tracker.track(job, node).unwrap();
        tracker.complete(job, true, None).unwrap();

        // Everything completed within the last hour survives.
        assert_eq!(tracker.cleanup(Duration::from_secs(3600)), 0);
        assert_eq!(tracker.get_history().len(), 1);

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(tracker.cleanup(Duration::ZERO), 1);
        assert!(tracker.get_history().is_empty());
    }
}
