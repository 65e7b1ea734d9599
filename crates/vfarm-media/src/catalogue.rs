//! Built-in encoding-profile catalogue.
//!
//! Workers advertise a subset of these, selected by name through the
//! `ENCODING_PROFILES` environment variable. Benchmark scalars start at
//! zero and are filled in by a benchmarking pass when one is requested.

use tracing::warn;
use vfarm_models::EncodingProfile;

fn profile(name: &str, codec: &str, params: &[&str]) -> EncodingProfile {
    EncodingProfile::unbenchmarked(
        name,
        codec,
        params.iter().map(|s| s.to_string()).collect(),
    )
}

/// Every profile this build knows how to run.
pub fn builtin_profiles() -> Vec<EncodingProfile> {
    vec![
        profile(
            "H264_1080p",
            "libx264",
            &["-c:v", "libx264", "-vf", "scale=1920:1080", "-crf", "23", "-preset", "medium", "-c:a", "aac"],
        ),
        profile(
            "H264_720p",
            "libx264",
            &["-c:v", "libx264", "-vf", "scale=1280:720", "-crf", "23", "-preset", "fast", "-c:a", "aac"],
        ),
        profile(
            "HEVC_4K",
            "libx265",
            &["-c:v", "libx265", "-vf", "scale=3840:2160", "-crf", "26", "-preset", "slow", "-c:a", "aac"],
        ),
        profile(
            "HEVC_1080p",
            "libx265",
            &["-c:v", "libx265", "-vf", "scale=1920:1080", "-crf", "26", "-preset", "medium", "-c:a", "aac"],
        ),
        profile(
            "VP9_1080p",
            "libvpx-vp9",
            &["-c:v", "libvpx-vp9", "-vf", "scale=1920:1080", "-b:v", "2M", "-c:a", "libopus"],
        ),
        profile(
            "AV1_1080p",
            "libaom-av1",
            &["-c:v", "libaom-av1", "-vf", "scale=1920:1080", "-crf", "30", "-cpu-used", "6", "-c:a", "libopus"],
        ),
    ]
}

/// Resolve a list of profile names against the catalogue. Unknown names are
/// skipped with a warning so a typo cannot keep a worker from starting.
pub fn select_profiles<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<EncodingProfile> {
    let catalogue = builtin_profiles();
    let mut selected = Vec::new();

    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        match catalogue.iter().find(|p| p.name == name) {
            Some(profile) => selected.push(profile.clone()),
            None => warn!(profile = name, "unknown encoding profile, skipping"),
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_names_are_unique() {
        let profiles = builtin_profiles();
        let mut names: Vec<_> = profiles.iter().map(|p| p.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), profiles.len());
    }

    #[test]
    fn select_resolves_known_names_in_order() {
        let selected = select_profiles(["HEVC_4K", "H264_1080p"]);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].name, "HEVC_4K");
        assert_eq!(selected[1].name, "H264_1080p");
    }

    #[test]
    fn select_skips_unknown_and_blank_names() {
        let selected = select_profiles(["H264_1080p", "NOPE", "", "  "]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "H264_1080p");
    }

    #[test]
    fn params_name_the_codec() {
        for profile in builtin_profiles() {
            assert!(profile.params.contains(&profile.codec));
        }
    }
}
