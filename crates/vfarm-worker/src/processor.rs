//! Job processing: download, transcode, upload.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::info;
use vfarm_media::encode_with_profile;
use vfarm_models::EncodingProfile;
use vfarm_storage::ObjectStore;

use crate::error::{WorkerError, WorkerResult};

/// Runs assigned jobs against the shared object store.
///
/// One job at a time: a single-permit semaphore is the worker's
/// backpressure, and assignments that arrive while it is held are rejected
/// back to the coordinator.
pub struct JobProcessor {
    storage: Arc<dyn ObjectStore>,
    profiles: HashMap<String, EncodingProfile>,
    input_bucket: String,
    output_bucket: String,
    work_dir: PathBuf,
    slot: Arc<Semaphore>,
}

impl JobProcessor {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        profiles: Vec<EncodingProfile>,
        input_bucket: impl Into<String>,
        output_bucket: impl Into<String>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            storage,
            profiles: profiles.into_iter().map(|p| (p.name.clone(), p)).collect(),
            input_bucket: input_bucket.into(),
            output_bucket: output_bucket.into(),
            work_dir: work_dir.into(),
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Decide whether an assignment can be taken right now. On acceptance
    /// the returned permit holds the job slot until the job finishes.
    pub fn try_accept(&self, profile_name: &str) -> Result<OwnedSemaphorePermit, String> {
        if !self.profiles.contains_key(profile_name) {
            return Err(format!("profile {profile_name} not available on this node"));
        }
        match Arc::clone(&self.slot).try_acquire_owned() {
            Ok(permit) => Ok(permit),
            Err(TryAcquireError::NoPermits) => Err("node is busy".to_string()),
            Err(TryAcquireError::Closed) => Err("node is shutting down".to_string()),
        }
    }

    /// Run one job end to end. The caller passes the permit obtained from
    /// [`try_accept`]; it is released when this returns.
    pub async fn process(
        &self,
        _permit: OwnedSemaphorePermit,
        job_id: &str,
        input_path: &str,
        output_path: &str,
        profile_name: &str,
    ) -> WorkerResult<()> {
        let profile = self
            .profiles
            .get(profile_name)
            .ok_or_else(|| WorkerError::protocol(format!("profile {profile_name} not found")))?;

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let staged_input = self.work_dir.join(format!("in-{job_id}"));
        let staged_output = self.work_dir.join(format!("out-{job_id}"));

        info!(job_id, input_path, profile = profile_name, "job started");

        let result = self
            .run_staged(profile, input_path, output_path, &staged_input, &staged_output)
            .await;

        let _ = tokio::fs::remove_file(&staged_input).await;
        let _ = tokio::fs::remove_file(&staged_output).await;

        result?;
        info!(job_id, output_path, "job finished");
        Ok(())
    }

    async fn run_staged(
        &self,
        profile: &EncodingProfile,
        input_path: &str,
        output_path: &str,
        staged_input: &std::path::Path,
        staged_output: &std::path::Path,
    ) -> WorkerResult<()> {
        self.storage
            .download(&self.input_bucket, input_path, staged_input)
            .await?;

        encode_with_profile(profile, staged_input, staged_output).await?;

        self.storage
            .upload(&self.output_bucket, output_path, staged_output, "video/mp4")
            .await?;
        Ok(())
    }

    /// The profiles this processor can actually run.
    pub fn advertised_profiles(&self) -> Vec<EncodingProfile> {
        self.profiles.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfarm_storage::FsStore;

    fn processor() -> JobProcessor {
        let dir = std::env::temp_dir().join("vfarm-test-processor");
        JobProcessor::new(
            Arc::new(FsStore::new(&dir)),
            vec![EncodingProfile::unbenchmarked("P1", "libx264", vec![])],
            "input-videos",
            "output-videos",
            &dir,
        )
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let processor = processor();
        let reason = processor.try_accept("P9").unwrap_err();
        assert!(reason.contains("P9"));
    }

    #[test]
    fn second_assignment_is_rejected_while_busy() {
        let processor = processor();
        let permit = processor.try_accept("P1").unwrap();
        let reason = processor.try_accept("P1").unwrap_err();
        assert_eq!(reason, "node is busy");

        drop(permit);
        assert!(processor.try_accept("P1").is_ok());
    }
}
