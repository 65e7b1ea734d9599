//! vfarm worker binary.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vfarm_media::{benchmark_profile, generate_video_sample, select_profiles};
use vfarm_models::EncodingProfile;
use vfarm_storage::{FsStore, ObjectStore, S3Store};
use vfarm_worker::config::StorageBackend;
use vfarm_worker::{JobProcessor, NodeClient, WorkerConfig};

/// Pause between reconnect attempts after the stream drops.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("vfarm=info".parse().expect("valid directive")),
        )
        .init();

    let config = WorkerConfig::from_env();
    info!(?config, "starting vfarm worker");

    let mut profiles = select_profiles(config.encoding_profiles.iter().map(String::as_str));
    if profiles.is_empty() {
        anyhow::bail!("no usable encoding profiles selected");
    }

    if config.benchmark_on_start {
        profiles = run_benchmarks(profiles).await;
    }

    let storage: Arc<dyn ObjectStore> = match config.storage_backend {
        StorageBackend::Filesystem => Arc::new(FsStore::from_env()),
        StorageBackend::S3 => Arc::new(S3Store::from_env()?),
    };

    let processor = Arc::new(JobProcessor::new(
        storage,
        profiles,
        config.input_bucket.clone(),
        config.output_bucket.clone(),
        config.work_dir.clone(),
    ));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("shutdown signal received");
            shutdown.cancel();
        });
    }

    let client = NodeClient::new(config, processor);

    // Stay connected until told to stop; the coordinator holds no state for
    // us between sessions, so a reconnect is just a fresh registration.
    while !shutdown.is_cancelled() {
        match client.run(shutdown.clone()).await {
            Ok(()) if shutdown.is_cancelled() => break,
            Ok(()) => info!("stream ended, reconnecting"),
            Err(err) => error!(%err, "stream session ended"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }

    info!("worker shutdown complete");
    Ok(())
}

/// Refresh the advertised benchmark scalars against a generated sample.
/// Profiles that fail to benchmark keep their zeroed scores rather than
/// blocking startup.
async fn run_benchmarks(profiles: Vec<EncodingProfile>) -> Vec<EncodingProfile> {
    info!("benchmarking encoding profiles");

    let sample = match generate_video_sample(5, "1280x720").await {
        Ok(path) => path,
        Err(err) => {
            warn!(%err, "sample generation failed, skipping benchmarks");
            return profiles;
        }
    };

    let mut benchmarked = Vec::with_capacity(profiles.len());
    for profile in profiles {
        match benchmark_profile(&profile.name, &profile.codec, &profile.params, 1.0, &sample).await
        {
            Ok(result) => benchmarked.push(result),
            Err(err) => {
                warn!(profile = %profile.name, %err, "benchmark failed");
                benchmarked.push(profile);
            }
        }
    }

    let _ = tokio::fs::remove_file(&sample).await;
    benchmarked
}
