//! FFmpeg CLI wrapper for the vfarm workers.
//!
//! Covers the three things a worker asks of ffmpeg: encoding an input with
//! an advertised profile, generating a reference sample, and benchmarking a
//! profile against that sample to produce its score.

pub mod benchmark;
pub mod catalogue;
pub mod command;
pub mod encode;
pub mod error;
pub mod sample;

pub use benchmark::benchmark_profile;
pub use catalogue::{builtin_profiles, select_profiles};
pub use command::FfmpegCommand;
pub use encode::encode_with_profile;
pub use error::{MediaError, MediaResult};
pub use sample::generate_video_sample;
