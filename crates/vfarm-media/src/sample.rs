//! Reference sample generation for benchmarking.

use std::path::PathBuf;

use uuid::Uuid;

use crate::command::FfmpegCommand;
use crate::error::MediaResult;

/// Generate a synthetic test clip (lavfi testsrc2) in the system temp dir
/// and return its path. The caller owns the file.
pub async fn generate_video_sample(duration_secs: u32, resolution: &str) -> MediaResult<PathBuf> {
    let path = std::env::temp_dir().join(format!("vfarm-sample-{}.mp4", Uuid::new_v4()));

    FfmpegCommand::new(
        format!("testsrc2=duration={duration_secs}:size={resolution}:rate=30"),
        &path,
    )
    .input_arg("-f")
    .input_arg("lavfi")
    .output_args(["-c:v", "libx264", "-preset", "ultrafast", "-crf", "23"])
    .run()
    .await?;

    Ok(path)
}
