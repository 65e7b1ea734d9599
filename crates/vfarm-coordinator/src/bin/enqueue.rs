//! Small CLI that enqueues jobs against a running coordinator.
//!
//! Usage: `enqueue <input> <output-prefix> <profile> [count]`

use anyhow::{bail, Context};
use vfarm_models::{EnqueueJobRequest, EnqueueJobResponse};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!("usage: enqueue <input> <output-prefix> <profile> [count]");
    }

    let input = &args[0];
    let output_prefix = &args[1];
    let profile = &args[2];
    let count: usize = match args.get(3) {
        Some(raw) => raw.parse().context("count must be a number")?,
        None => 1,
    };

    let hostname = std::env::var("SERVER_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    let port = std::env::var("SERVER_PORT_HTTP").unwrap_or_else(|_| "8081".to_string());
    let url = format!("http://{hostname}:{port}/api/v1/jobs");

    let client = reqwest::Client::new();

    for i in 0..count {
        let output_path = if count == 1 {
            output_prefix.clone()
        } else {
            format!("{output_prefix}-{i}.mp4")
        };

        let request = EnqueueJobRequest {
            input_path: input.clone(),
            output_path,
            profile_name: profile.clone(),
            priority: None,
        };

        let response: EnqueueJobResponse = client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("request failed")?
            .error_for_status()
            .context("coordinator rejected the job")?
            .json()
            .await
            .context("unparseable response")?;

        println!(
            "job {}/{count}: id={} ({})",
            i + 1,
            response.job_id,
            response.message
        );
    }

    Ok(())
}
