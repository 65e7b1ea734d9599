//! Priority-ordered pending-job store.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use tracing::debug;
use vfarm_models::{Job, JobId, JobParams};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Pending-job store with priority ordering and FIFO ties.
///
/// Queue contents are not persisted; a coordinator restart loses them.
pub trait JobQueue: Send + Sync {
    /// Mint a job with the default priority of 0 and add it to the queue.
    fn enqueue(&self, params: JobParams) -> OrchestratorResult<Job>;

    /// Mint a job with an explicit priority and add it to the queue.
    fn enqueue_with_priority(&self, params: JobParams, priority: i32) -> OrchestratorResult<Job>;

    /// The current head without removing it. `EmptyQueue` when empty.
    fn peek(&self) -> OrchestratorResult<Job>;

    /// Remove and return the highest-priority head. `EmptyQueue` when empty.
    fn dequeue(&self) -> OrchestratorResult<Job>;

    /// Re-insert a previously dequeued job with its priority decremented by
    /// one. Fails with `JobNotFound` unless the ID was minted by this queue.
    fn requeue(&self, job: Job) -> OrchestratorResult<Job>;

    /// Look up any job this queue has minted, pending or not.
    fn get_job(&self, job_id: JobId) -> OrchestratorResult<Job>;

    /// Pending jobs in queue order.
    fn list_jobs(&self) -> Vec<Job>;

    /// Number of pending jobs.
    fn queue_depth(&self) -> usize;

    /// Drop every pending job and return how many were dropped.
    fn clear(&self) -> usize;
}

#[derive(Default)]
struct QueueInner {
    /// Pending order: priority descending, FIFO within equal priority.
    pending: Vec<JobId>,
    /// Every job minted by this queue, keyed by ID. Dequeued jobs stay here
    /// so requeue can validate the ID and recover the params.
    jobs: HashMap<JobId, Job>,
}

impl QueueInner {
    /// Insert before the first pending entry of strictly lower priority.
    /// Equal priorities keep insertion order, which preserves FIFO ties.
    fn insert_ordered(&mut self, job: Job) {
        let pos = self
            .pending
            .iter()
            .position(|id| {
                self.jobs
                    .get(id)
                    .map(|j| j.priority < job.priority)
                    .unwrap_or(true)
            })
            .unwrap_or(self.pending.len());

        self.pending.insert(pos, job.id);
        self.jobs.insert(job.id, job);
    }
}

/// In-memory job queue.
#[derive(Default)]
pub struct InMemoryJobQueue {
    inner: RwLock<QueueInner>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobQueue for InMemoryJobQueue {
    fn enqueue(&self, params: JobParams) -> OrchestratorResult<Job> {
        self.enqueue_with_priority(params, 0)
    }

    fn enqueue_with_priority(&self, params: JobParams, priority: i32) -> OrchestratorResult<Job> {
        let job = Job::with_priority(params, priority);
        let mut inner = self.inner.write().expect("job queue lock poisoned");
        inner.insert_ordered(job.clone());
        debug!(job_id = %job.id, priority, "enqueued job");
        Ok(job)
    }

    fn peek(&self) -> OrchestratorResult<Job> {
        let inner = self.inner.read().expect("job queue lock poisoned");
        inner
            .pending
            .first()
            .and_then(|id| inner.jobs.get(id))
            .cloned()
            .ok_or(OrchestratorError::EmptyQueue)
    }

    fn dequeue(&self) -> OrchestratorResult<Job> {
        let mut inner = self.inner.write().expect("job queue lock poisoned");
        if inner.pending.is_empty() {
            return Err(OrchestratorError::EmptyQueue);
        }
        let id = inner.pending.remove(0);
        inner
            .jobs
            .get(&id)
            .cloned()
            .ok_or(OrchestratorError::JobNotFound(id))
    }

    fn requeue(&self, job: Job) -> OrchestratorResult<Job> {
        let mut inner = self.inner.write().expect("job queue lock poisoned");
        if !inner.jobs.contains_key(&job.id) {
            return Err(OrchestratorError::JobNotFound(job.id));
        }

        let mut decayed = job;
        decayed.priority -= 1;
        decayed.updated_at = Utc::now();

        // Drop a stale pending slot if the caller requeues a still-pending job.
        inner.pending.retain(|id| *id != decayed.id);
        inner.insert_ordered(decayed.clone());
        debug!(job_id = %decayed.id, priority = decayed.priority, "requeued job");
        Ok(decayed)
    }

    fn get_job(&self, job_id: JobId) -> OrchestratorResult<Job> {
        let inner = self.inner.read().expect("job queue lock poisoned");
        inner
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(OrchestratorError::JobNotFound(job_id))
    }

    fn list_jobs(&self) -> Vec<Job> {
        let inner = self.inner.read().expect("job queue lock poisoned");
        inner
            .pending
            .iter()
            .filter_map(|id| inner.jobs.get(id))
            .cloned()
            .collect()
    }

    fn queue_depth(&self) -> usize {
        self.inner.read().expect("job queue lock poisoned").pending.len()
    }

    fn clear(&self) -> usize {
        let mut inner = self.inner.write().expect("job queue lock poisoned");
        let cleared: Vec<JobId> = inner.pending.drain(..).collect();
        for id in &cleared {
            inner.jobs.remove(id);
        }
        cleared.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(input: &str) -> JobParams {
        JobParams {
            input_path: input.to_string(),
            output_path: format!("out-{input}"),
            profile_name: "H264_1080p".to_string(),
        }
    }

    #[test]
    fn dequeue_returns_enqueued_params() {
        let queue = InMemoryJobQueue::new();
        let job = queue.enqueue(params("a.mp4")).unwrap();
        let head = queue.dequeue().unwrap();
        assert_eq!(head.id, job.id);
        assert_eq!(head.params, job.params);
        assert_eq!(head.priority, 0);
    }

    #[test]
    fn empty_queue_fails_peek_and_dequeue() {
        let queue = InMemoryJobQueue::new();
        assert_eq!(queue.peek().unwrap_err(), OrchestratorError::EmptyQueue);
        assert_eq!(queue.dequeue().unwrap_err(), OrchestratorError::EmptyQueue);
    }

    #[test]
    fn higher_priority_dequeues_first() {
        let queue = InMemoryJobQueue::new();
        let low = queue.enqueue_with_priority(params("low.mp4"), -1).unwrap();
        let high = queue.enqueue_with_priority(params("high.mp4"), 5).unwrap();
        let normal = queue.enqueue(params("normal.mp4")).unwrap();

        assert_eq!(queue.dequeue().unwrap().id, high.id);
        assert_eq!(queue.dequeue().unwrap().id, normal.id);
        assert_eq!(queue.dequeue().unwrap().id, low.id);
    }

    #[test]
    fn equal_priority_is_fifo() {
        let queue = InMemoryJobQueue::new();
        let first = queue.enqueue(params("first.mp4")).unwrap();
        let second = queue.enqueue(params("second.mp4")).unwrap();
        let third = queue.enqueue(params("third.mp4")).unwrap();

        assert_eq!(queue.dequeue().unwrap().id, first.id);
        assert_eq!(queue.dequeue().unwrap().id, second.id);
        assert_eq!(queue.dequeue().unwrap().id, third.id);
    }

    #[test]
    fn requeue_decrements_priority_and_preserves_identity() {
        let queue = InMemoryJobQueue::new();
        let job = queue.enqueue(params("a.mp4")).unwrap();
        let dequeued = queue.dequeue().unwrap();

        let requeued = queue.requeue(dequeued).unwrap();
        assert_eq!(requeued.id, job.id);
        assert_eq!(requeued.priority, -1);

        let back = queue.dequeue().unwrap();
        assert_eq!(back.id, job.id);
        assert_eq!(back.priority, -1);
        assert_eq!(back.params, job.params);
    }

    #[test]
    fn requeued_job_yields_to_fresh_priority() {
        let queue = InMemoryJobQueue::new();
        let retried = queue.enqueue(params("retried.mp4")).unwrap();
        let _ = queue.dequeue().unwrap();
        queue.requeue(retried.clone()).unwrap();

        // A fresh priority-0 job now outranks the decayed retry.
        let fresh = queue.enqueue(params("fresh.mp4")).unwrap();
        assert_eq!(queue.dequeue().unwrap().id, fresh.id);
        assert_eq!(queue.dequeue().unwrap().id, retried.id);
    }

    #[test]
    fn requeue_unknown_job_fails() {
        let queue = InMemoryJobQueue::new();
        let foreign = Job::new(params("foreign.mp4"));
        let err = queue.requeue(foreign.clone()).unwrap_err();
        assert_eq!(err, OrchestratorError::JobNotFound(foreign.id));
    }

    #[test]
    fn get_job_survives_dequeue() {
        let queue = InMemoryJobQueue::new();
        let job = queue.enqueue(params("a.mp4")).unwrap();
        let _ = queue.dequeue().unwrap();
        assert_eq!(queue.get_job(job.id).unwrap().id, job.id);
        assert_eq!(queue.queue_depth(), 0);
    }

    #[test]
    fn clear_returns_pre_clear_depth() {
        let queue = InMemoryJobQueue::new();
        for i in 0..4 {
            queue.enqueue(params(&format!("{i}.mp4"))).unwrap();
        }
        assert_eq!(queue.queue_depth(), 4);
        assert_eq!(queue.clear(), 4);
        assert_eq!(queue.queue_depth(), 0);
        assert!(queue.list_jobs().is_empty());
    }
}
