//! Profile-driven encoding.

use std::path::Path;

use tracing::info;
use vfarm_models::EncodingProfile;

use crate::command::FfmpegCommand;
use crate::error::MediaResult;

/// Encode `input` into `output` with the profile's parameters passed
/// verbatim.
pub async fn encode_with_profile(
    profile: &EncodingProfile,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();
    info!(
        profile = %profile.name,
        input = %input.display(),
        output = %output.display(),
        "encoding"
    );

    FfmpegCommand::new(input, output)
        .output_args(profile.params.iter().cloned())
        .run()
        .await?;
    Ok(())
}
