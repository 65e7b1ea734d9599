//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] vfarm_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] vfarm_media::MediaError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}
