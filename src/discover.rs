
use std::path::Path;

use crate::{config::Media, ffmpeg::FfMpegError, process::Process};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Orientation {
    Landscape,
    Portrait,
    Other,
}

impl Orientation {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct FfProbeOutput {
    #[serde(default)]
    streams: Vec<FfProbeStream>,
}

#[derive(Debug, serde::Deserialize)]
struct FfProbeStream {
    #[serde(default)]
    width: u32,

    #[serde(default)]
    height: u32,
}

#[tracing::instrument(skip(media))]
pub(crate) async fn probe_orientation(
    media: &Media,
    input_path: &Path,
) -> Result<Orientation, FfMpegError> {
    let input_path_str = input_path.to_str().ok_or(FfMpegError::Path)?;

    let process = Process::run(
        &media.ffprobe_path,
        &[
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            input_path_str,
        ],
        media.process_timeout,
    )
    .map_err(FfMpegError::Process)?;

    let output = process.read_to_vec().await.map_err(FfMpegError::Process)?;

    let output: FfProbeOutput = serde_json::from_slice(&output).map_err(FfMpegError::Json)?;

    Ok(parse_orientation(output))
}

fn parse_orientation(output: FfProbeOutput) -> Orientation {
    let Some(stream) = output.streams.first() else {
        return Orientation::Other;
    };

    classify(stream.width, stream.height)
}

// Tolerance bands around 16:9 and 9:16. Anything outside, including exact band
// edges, is Other.
fn classify(width: u32, height: u32) -> Orientation {
    if height == 0 {
        return Orientation::Other;
    }

    let ratio = f64::from(width) / f64::from(height);

    if ratio > 1.7 && ratio < 1.8 {
        Orientation::Landscape
    } else if ratio > 0.55 && ratio < 0.57 {
        Orientation::Portrait
    } else {
        Orientation::Other
    }
}
