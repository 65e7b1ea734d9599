//! Encoding profile description.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A named bundle of transcoder parameters plus benchmark scalars.
///
/// Profiles are immutable once advertised; the `params` vector is passed to
/// ffmpeg verbatim. Benchmark scalars come from the worker's benchmarking
/// pass against a reference sample; a lower `score` means a faster node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingProfile {
    /// Profile name, unique within a node's advertised list
    pub name: String,
    /// Codec tag (e.g. `libx264`, `libx265`)
    pub codec: String,
    /// ffmpeg output arguments, passed verbatim
    pub params: Vec<String>,
    /// Seconds to encode the reference sample
    pub encode_time: f64,
    /// Seconds to decode the encoded sample
    pub decode_time: f64,
    /// Encoder throughput in frames per second
    pub fps: f64,
    /// Weighted encode+decode time; lower is faster
    pub score: f64,
}

impl EncodingProfile {
    /// An unbenchmarked profile, scores zeroed.
    pub fn unbenchmarked(name: impl Into<String>, codec: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            name: name.into(),
            codec: codec.into(),
            params,
            encode_time: 0.0,
            decode_time: 0.0,
            fps: 0.0,
            score: 0.0,
        }
    }
}
