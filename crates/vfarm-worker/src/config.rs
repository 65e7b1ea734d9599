//! Worker configuration.

use std::time::Duration;

/// Which object-store binding the worker talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Filesystem,
    S3,
}

/// Worker configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Display name sent at registration
    pub node_name: String,
    /// Coordinator host
    pub server_hostname: String,
    /// Coordinator worker-stream port
    pub server_port: u16,
    /// Semicolon-separated names selecting from the built-in catalogue
    pub encoding_profiles: Vec<String>,
    /// How often a resource snapshot is sent
    pub resource_poll_interval: Duration,
    /// Bucket jobs read their input from
    pub input_bucket: String,
    /// Bucket transcoded output lands in
    pub output_bucket: String,
    /// Scratch directory for staged media
    pub work_dir: String,
    pub storage_backend: StorageBackend,
    /// Run the benchmark pass before advertising profiles
    pub benchmark_on_start: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            node_name: "node".to_string(),
            server_hostname: "localhost".to_string(),
            server_port: 8080,
            encoding_profiles: vec!["H264_1080p".to_string(), "H264_720p".to_string()],
            resource_poll_interval: Duration::from_secs(5),
            input_bucket: "input-videos".to_string(),
            output_bucket: "output-videos".to_string(),
            work_dir: std::env::temp_dir().join("vfarm").to_string_lossy().into_owned(),
            storage_backend: StorageBackend::Filesystem,
            benchmark_on_start: false,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            node_name: std::env::var("NODE_NAME").unwrap_or(defaults.node_name),
            server_hostname: std::env::var("SERVER_HOSTNAME").unwrap_or(defaults.server_hostname),
            server_port: std::env::var("SERVER_PORT_STREAM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.server_port),
            encoding_profiles: std::env::var("ENCODING_PROFILES")
                .map(|raw| {
                    raw.split(';')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(defaults.encoding_profiles),
            resource_poll_interval: Duration::from_secs(
                std::env::var("RESOURCE_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            input_bucket: std::env::var("INPUT_BUCKET").unwrap_or(defaults.input_bucket),
            output_bucket: std::env::var("OUTPUT_BUCKET").unwrap_or(defaults.output_bucket),
            work_dir: std::env::var("WORKER_WORK_DIR").unwrap_or(defaults.work_dir),
            storage_backend: match std::env::var("STORAGE_BACKEND").as_deref() {
                Ok("s3") => StorageBackend::S3,
                _ => StorageBackend::Filesystem,
            },
            benchmark_on_start: std::env::var("BENCHMARK_ON_START")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// WebSocket URL of the coordinator's stream endpoint.
    pub fn stream_url(&self) -> String {
        format!(
            "ws://{}:{}/ws/stream",
            self.server_hostname, self.server_port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stream_url_targets_local_coordinator() {
        let config = WorkerConfig::default();
        assert_eq!(config.stream_url(), "ws://localhost:8080/ws/stream");
        assert_eq!(config.storage_backend, StorageBackend::Filesystem);
    }

    #[test]
    fn profile_list_splits_on_semicolons() {
        // from_env reads the process environment, so exercise the parsing
        // rule directly.
        let raw = "H264_1080p; HEVC_4K ;;";
        let parsed: Vec<String> = raw
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        assert_eq!(parsed, vec!["H264_1080p", "HEVC_4K"]);
    }
}
