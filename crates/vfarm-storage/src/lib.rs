//! Shared object store used by vfarm workers.
//!
//! The coordinator never reads or writes objects; workers pull their input
//! here and push the transcoded result back. Two bindings exist: an
//! S3-compatible blob service and a local filesystem root (useful for
//! single-machine setups and tests).

pub mod error;
pub mod fs;
pub mod s3;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use fs::FsStore;
pub use s3::{S3Config, S3Store};
pub use store::ObjectStore;
