//! Encoding-profile benchmarking.
//!
//! A profile's score is produced by encoding a reference sample, decoding
//! the result, and weighting the combined wall-clock time. Lower scores
//! mean a faster node for that profile.

use std::path::Path;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;
use vfarm_models::EncodingProfile;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};

/// Score applied when the encoded output cannot be decoded back.
const DECODE_FAILURE_PENALTY: f64 = 999_999.0;

/// Benchmark one profile against a reference input.
pub async fn benchmark_profile(
    name: &str,
    codec: &str,
    params: &[String],
    weight: f64,
    input: impl AsRef<Path>,
) -> MediaResult<EncodingProfile> {
    let input = input.as_ref();
    let encoded = std::env::temp_dir().join(format!("vfarm-bench-{name}-{}.mp4", Uuid::new_v4()));

    // Encode pass, timed.
    let start = Instant::now();
    let stderr = FfmpegCommand::new(input, &encoded)
        .output_args(params.iter().cloned())
        .run()
        .await?;
    let encode_time = start.elapsed().as_secs_f64();

    let fps = extract_fps(&stderr)?;

    // Decode pass: discard frames into the null muxer.
    let start = Instant::now();
    let decode_result = FfmpegCommand::new(&encoded, "-")
        .output_args(["-f", "null"])
        .run()
        .await;
    let decode_time = match decode_result {
        Ok(_) => start.elapsed().as_secs_f64(),
        Err(err) => {
            warn!(profile = name, %err, "decode benchmark failed");
            DECODE_FAILURE_PENALTY
        }
    };

    let _ = tokio::fs::remove_file(&encoded).await;

    let score = (encode_time + decode_time) / weight;
    info!(profile = name, encode_time, decode_time, fps, score, "benchmarked profile");

    Ok(EncodingProfile {
        name: name.to_string(),
        codec: codec.to_string(),
        params: params.to_vec(),
        encode_time,
        decode_time,
        fps,
        score,
    })
}

/// Pull the last reported `fps=` figure out of ffmpeg's stderr stats line.
fn extract_fps(stderr: &str) -> MediaResult<f64> {
    let idx = stderr
        .rfind("fps=")
        .ok_or_else(|| MediaError::OutputParse("no fps= in ffmpeg output".to_string()))?;

    let tail = stderr[idx + 4..].trim_start();
    let token: String = tail
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    token
        .parse::<f64>()
        .map_err(|_| MediaError::OutputParse(format!("unparseable fps value: {token:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_last_fps_figure() {
        let stderr = "frame=  100 fps= 45 q=28.0 size=1024kB\nframe=  900 fps=123 q=28.0 Lsize=9216kB";
        assert_eq!(extract_fps(stderr).unwrap(), 123.0);
    }

    #[test]
    fn fractional_fps_parses() {
        let stderr = "frame= 10 fps=0.5 q=28.0";
        assert_eq!(extract_fps(stderr).unwrap(), 0.5);
    }

    #[test]
    fn missing_fps_is_an_error() {
        assert!(matches!(
            extract_fps("no stats here"),
            Err(MediaError::OutputParse(_))
        ));
    }
}
