use std::{fmt::Debug, sync::Arc};

use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::error_code::ErrorCode;

pub(crate) mod sled;

pub(crate) type ArcRepo = Arc<dyn VideoRepo>;

/// The externally visible metadata record for a video.
///
/// Records are only ever replaced wholesale. Two concurrent updates to the same record race and
/// the last write wins.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub(crate) struct Video {
    pub(crate) id: Uuid,
    pub(crate) user_id: Uuid,
    pub(crate) title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) thumbnail_url: Option<Url>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) video_url: Option<Url>,

    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub(crate) updated_at: OffsetDateTime,
}

impl Video {
    pub(crate) fn new(user_id: Uuid, title: String, description: Option<String>) -> Self {
        let now = OffsetDateTime::now_utc();

        Video {
            id: Uuid::new_v4(),
            user_id,
            title,
            description,
            thumbnail_url: None,
            video_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum RepoError {
    #[error("Error in embedded repo")]
    SledError(#[from] self::sled::SledError),

    #[error("Video record is not present")]
    Missing,

    #[error("Operation panicked")]
    Canceled,
}

impl RepoError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::SledError(e) => e.error_code(),
            Self::Missing => ErrorCode::VIDEO_NOT_FOUND,
            Self::Canceled => ErrorCode::PANIC,
        }
    }
}

#[async_trait::async_trait(?Send)]
pub(crate) trait VideoRepo: Send + Sync + Debug {
    async fn create_video(&self, video: &Video) -> Result<(), RepoError>;

    async fn video(&self, video_id: Uuid) -> Result<Option<Video>, RepoError>;

    async fn update_video(&self, video: &Video) -> Result<(), RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}

pub(crate) fn open(config: &crate::config::Repo) -> Result<ArcRepo, RepoError> {
    match config {
        crate::config::Repo::Sled(sled_config) => {
            let repo =
                self::sled::SledRepo::build(sled_config.path.clone(), sled_config.cache_capacity)?;

            Ok(Arc::new(repo))
        }
    }
}
