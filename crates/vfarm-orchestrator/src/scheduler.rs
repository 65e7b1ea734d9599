//! Node selection policy.

use std::collections::HashMap;
use std::sync::Mutex;

use vfarm_models::{Job, JobProgress, Node, NodeId};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Policy that picks the target node for a job.
///
/// Deliberately pluggable: alternative policies (score-weighted,
/// bin-packing) consume the same inputs and produce the same outputs.
pub trait Scheduler: Send + Sync {
    /// Order candidates from most to least preferred.
    fn rank_nodes(&self, job: &Job, nodes: &[Node]) -> Vec<Node>;

    /// Pick the node to run `job` on, given the candidates that can run its
    /// profile and the current active-job map.
    ///
    /// Fails with `NoAvailableNodes` when `candidates` is empty and
    /// `NoIdleNode` when every candidate already has work.
    fn select_best_node(
        &self,
        job: &Job,
        candidates: &[Node],
        active: &HashMap<NodeId, Vec<JobProgress>>,
    ) -> OrchestratorResult<Node>;
}

/// Round-robin with idle preference.
///
/// Walks the candidate list starting at an internal cursor and picks the
/// first node with no active jobs; the cursor advances past the pick so
/// repeated calls spread work across the fleet.
#[derive(Default)]
pub struct RoundRobinScheduler {
    cursor: Mutex<usize>,
}

impl RoundRobinScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for RoundRobinScheduler {
    fn rank_nodes(&self, _job: &Job, nodes: &[Node]) -> Vec<Node> {
        // Round-robin has no static preference between nodes.
        nodes.to_vec()
    }

    fn select_best_node(
        &self,
        job: &Job,
        candidates: &[Node],
        active: &HashMap<NodeId, Vec<JobProgress>>,
    ) -> OrchestratorResult<Node> {
        if candidates.is_empty() {
            return Err(OrchestratorError::NoAvailableNodes(
                job.params.profile_name.clone(),
            ));
        }

        let load =
            |node: &Node| active.get(&node.id).map(|jobs| jobs.len()).unwrap_or(0);

        let mut cursor = self.cursor.lock().expect("scheduler cursor poisoned");
        let start = *cursor % candidates.len();

        for step in 0..candidates.len() {
            let index = (start + step) % candidates.len();
            let node = &candidates[index];
            if load(node) == 0 {
                *cursor = index + 1;
                return Ok(node.clone());
            }
        }

        Err(OrchestratorError::NoIdleNode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vfarm_models::{EncodingProfile, JobParams, ResourceUsage};

    fn node(name: &str) -> Node {
        Node {
            id: NodeId::new(),
            name: name.to_string(),
            profiles: vec![EncodingProfile::unbenchmarked("P1", "libx264", vec![])],
            resources: ResourceUsage::default(),
            heartbeat: Utc::now(),
        }
    }

    fn job() -> Job {
        Job::new(JobParams {
            input_path: "in.mp4".into(),
            output_path: "out.mp4".into(),
            profile_name: "P1".into(),
        })
    }

    fn busy(node: &Node) -> (NodeId, Vec<JobProgress>) {
        (
            node.id,
            vec![JobProgress::assigned(
                vfarm_models::JobId::new(),
                node.id,
                Utc::now(),
            )],
        )
    }

    #[test]
    fn empty_candidates_fail() {
        let scheduler = RoundRobinScheduler::new();
        let err = scheduler
            .select_best_node(&job(), &[], &HashMap::new())
            .unwrap_err();
        assert_eq!(err, OrchestratorError::NoAvailableNodes("P1".to_string()));
    }

    #[test]
    fn all_busy_fails_with_no_idle_node() {
        let scheduler = RoundRobinScheduler::new();
        let nodes = vec![node("a"), node("b")];
        let active: HashMap<_, _> = nodes.iter().map(busy).collect();

        let err = scheduler
            .select_best_node(&job(), &nodes, &active)
            .unwrap_err();
        assert_eq!(err, OrchestratorError::NoIdleNode);
    }

    #[test]
    fn idle_node_is_preferred_over_cursor_position() {
        let scheduler = RoundRobinScheduler::new();
        let nodes = vec![node("a"), node("b"), node("c")];
        // Cursor starts at 0 but node a is busy.
        let active: HashMap<_, _> = [busy(&nodes[0])].into_iter().collect();

        let picked = scheduler
            .select_best_node(&job(), &nodes, &active)
            .unwrap();
        assert_eq!(picked.id, nodes[1].id);
    }

    #[test]
    fn successive_picks_rotate_across_idle_fleet() {
        let scheduler = RoundRobinScheduler::new();
        let nodes = vec![node("a"), node("b"), node("c")];
        let active = HashMap::new();

        let first = scheduler.select_best_node(&job(), &nodes, &active).unwrap();
        let second = scheduler.select_best_node(&job(), &nodes, &active).unwrap();
        let third = scheduler.select_best_node(&job(), &nodes, &active).unwrap();
        let fourth = scheduler.select_best_node(&job(), &nodes, &active).unwrap();

        assert_eq!(first.id, nodes[0].id);
        assert_eq!(second.id, nodes[1].id);
        assert_eq!(third.id, nodes[2].id);
        // Wraps around.
        assert_eq!(fourth.id, nodes[0].id);
    }

    #[test]
    fn rank_preserves_candidate_order() {
        let scheduler = RoundRobinScheduler::new();
        let nodes = vec![node("a"), node("b")];
        let ranked = scheduler.rank_nodes(&job(), &nodes);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].id, nodes[0].id);
    }
}
