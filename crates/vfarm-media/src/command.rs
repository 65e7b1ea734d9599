//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Builder for a single ffmpeg invocation.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output target (file path, or `-` style null sinks via raw args)
    output: PathBuf,
    /// Arguments placed before `-i`
    input_args: Vec<String>,
    /// Arguments placed between the input and the output
    output_args: Vec<String>,
    /// Whether to overwrite the output
    overwrite: bool,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Add an argument before `-i`.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add an argument after the input.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple arguments after the input.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The full argument vector, without the binary name.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.overwrite {
            args.push("-y".to_string());
        }
        args.extend(self.input_args.iter().cloned());
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().into_owned());
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }

    /// Run to completion, returning captured stderr (ffmpeg writes its
    /// progress and stats there).
    pub async fn run(self) -> MediaResult<String> {
        let ffmpeg = locate_ffmpeg()?;
        let args = self.build_args();
        debug!(?args, "running ffmpeg");

        let output = Command::new(ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(MediaError::FfmpegFailed {
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }
        Ok(stderr)
    }
}

fn locate_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|e| MediaError::FfmpegNotFound(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_args_orders_input_and_output_sections() {
        let args = FfmpegCommand::new("in.mp4", "out.mp4")
            .input_arg("-ss")
            .input_arg("1.0")
            .output_args(["-c:v", "libx264", "-crf", "23"])
            .build_args();

        assert_eq!(
            args,
            vec!["-y", "-ss", "1.0", "-i", "in.mp4", "-c:v", "libx264", "-crf", "23", "out.mp4"]
        );
    }
}
