use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use color_eyre::Report;

use crate::error_code::ErrorCode;

pub(crate) struct Error {
    inner: color_eyre::Report,
}

impl Error {
    pub(crate) fn kind(&self) -> Option<&UploadError> {
        self.inner.downcast_ref()
    }

    pub(crate) fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        self.inner.root_cause()
    }

    pub(crate) fn error_code(&self) -> ErrorCode {
        self.kind()
            .map(|e| e.error_code())
            .unwrap_or(ErrorCode::UNKNOWN_ERROR)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl<T> From<T> for Error
where
    UploadError: From<T>,
{
    fn from(error: T) -> Self {
        Error {
            inner: Report::from(UploadError::from(error)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum UploadError {
    #[error("Error in multipart upload")]
    Upload(#[from] actix_form_data::Error),

    #[error("Error in video repo")]
    Repo(#[from] crate::repo::RepoError),

    #[error("Error in filesystem")]
    Io(#[from] std::io::Error),

    #[error("Couldn't resolve upload identity")]
    Auth(#[from] crate::auth::AuthError),

    #[error("Error in asset store")]
    Store(#[from] crate::store::StoreError),

    #[error("Error running external tool")]
    Ffmpeg(#[from] crate::ffmpeg::FfMpegError),

    #[error("Invalid video ID")]
    InvalidVideoId,

    #[error("Video not found")]
    MissingVideo,

    #[error("You are not authorized to modify this video")]
    NotVideoOwner,

    #[error("Unsupported file type: {0}")]
    UnsupportedMediaType(String),

    #[error("No file present in upload")]
    NoFiles,

    #[error("Invalid file name")]
    InvalidFileName,

    #[error("Couldn't acquire process permit")]
    Semaphore,

    #[error("Upload body exceeded the size limit")]
    Limit(#[from] crate::stream::LimitError),
}

impl UploadError {
    const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Upload(_) => ErrorCode::FILE_UPLOAD_ERROR,
            Self::Repo(e) => e.error_code(),
            Self::Io(_) => ErrorCode::IO_ERROR,
            Self::Auth(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
            Self::Ffmpeg(e) => e.error_code(),
            Self::InvalidVideoId => ErrorCode::INVALID_VIDEO_ID,
            Self::MissingVideo => ErrorCode::VIDEO_NOT_FOUND,
            Self::NotVideoOwner => ErrorCode::NOT_VIDEO_OWNER,
            Self::UnsupportedMediaType(_) => ErrorCode::INVALID_CONTENT_TYPE,
            Self::NoFiles => ErrorCode::VALIDATE_NO_FILES,
            Self::InvalidFileName => ErrorCode::INVALID_FILE_NAME,
            Self::Semaphore => ErrorCode::PROCESS_SEMAPHORE_CLOSED,
            Self::Limit(_) => ErrorCode::VALIDATE_FILE_SIZE,
        }
    }
}

impl From<tokio::sync::AcquireError> for UploadError {
    fn from(_: tokio::sync::AcquireError) -> Self {
        UploadError::Semaphore
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            Some(
                UploadError::Upload(_)
                | UploadError::InvalidVideoId
                | UploadError::UnsupportedMediaType(_)
                | UploadError::NoFiles
                | UploadError::InvalidFileName
                | UploadError::Limit(_),
            ) => StatusCode::BAD_REQUEST,
            Some(UploadError::Auth(_) | UploadError::NotVideoOwner) => StatusCode::UNAUTHORIZED,
            Some(
                UploadError::MissingVideo | UploadError::Repo(crate::repo::RepoError::Missing),
            ) => StatusCode::NOT_FOUND,
            Some(UploadError::Store(e)) if e.is_not_found() => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .content_type("application/json")
            .body(
                serde_json::to_string(&serde_json::json!({
                    "msg": self.root_cause().to_string(),
                    "code": self.error_code()
                }))
                .unwrap_or_else(|_| {
                    r#"{"msg":"Request failed","code":"unknown-error"}"#.to_string()
                }),
            )
    }
}
