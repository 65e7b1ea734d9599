//! Media error types.

use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found: {0}")]
    FfmpegNotFound(String),

    #[error("FFmpeg failed with status {status}: {stderr}")]
    FfmpegFailed { status: i32, stderr: String },

    #[error("Unknown encoding profile: {0}")]
    UnknownProfile(String),

    #[error("Could not parse ffmpeg output: {0}")]
    OutputParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
