//! vfarm worker node.
//!
//! A worker advertises a set of encoding profiles, keeps a stream open to
//! the coordinator, reports resource usage on a timer, and runs one
//! transcoding job at a time: download from the shared store, encode with
//! the requested profile, upload the result.

pub mod client;
pub mod config;
pub mod error;
pub mod processor;
pub mod resources;

pub use client::NodeClient;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use processor::JobProcessor;
