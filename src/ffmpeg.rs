use std::path::{Path, PathBuf};

use crate::{
    config::Media,
    error_code::ErrorCode,
    process::{Process, ProcessError},
    tmp_file::TmpFile,
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum FfMpegError {
    #[error("External tool failed")]
    Process(#[source] ProcessError),

    #[error("Invalid probe output")]
    Json(#[source] serde_json::Error),

    #[error("Non-UTF-8 file path")]
    Path,
}

impl FfMpegError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Process(e) => e.error_code(),
            Self::Json(_) => ErrorCode::PROBE_OUTPUT_ERROR,
            Self::Path => ErrorCode::INVALID_FILE_PATH,
        }
    }
}

/// Rewrite an mp4 so its index metadata sits at the front of the file, letting playback start
/// before the download completes. Streams are copied verbatim, not re-encoded.
///
/// The output lives next to the input with a fixed suffix and is owned by the returned guard.
#[tracing::instrument(skip(media))]
pub(crate) async fn optimize_for_streaming(
    media: &Media,
    input_path: &Path,
) -> Result<TmpFile, FfMpegError> {
    let input_path_str = input_path.to_str().ok_or(FfMpegError::Path)?;

    let mut output_path = input_path.as_os_str().to_os_string();
    output_path.push(".processing");

    let output_file = TmpFile::from_path(PathBuf::from(output_path));
    let output_path_str = output_file.to_str().ok_or(FfMpegError::Path)?;

    let process = Process::run(
        &media.ffmpeg_path,
        &[
            "-hide_banner",
            "-v",
            "warning",
            "-i",
            input_path_str,
            "-c",
            "copy",
            "-movflags",
            "faststart",
            "-f",
            "mp4",
            output_path_str,
        ],
        media.process_timeout,
    )
    .map_err(FfMpegError::Process)?;

    process.wait().await.map_err(FfMpegError::Process)?;

    Ok(output_file)
}
