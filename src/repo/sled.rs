use std::path::PathBuf;

use sled::{Db, Tree};
use uuid::Uuid;

use crate::{
    error_code::ErrorCode,
    repo::{RepoError, Video, VideoRepo},
};

macro_rules! b {
    ($self:ident.$ident:ident, $expr:expr) => {{
        let $ident = $self.$ident.clone();

        let span = tracing::Span::current();

        tokio::task::spawn_blocking(move || span.in_scope(move || $expr))
            .await
            .map_err(|_| RepoError::Canceled)??
    }};
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SledError {
    #[error("Error in sled")]
    Sled(#[from] sled::Error),

    #[error("Invalid video record json")]
    Video(#[from] serde_json::Error),
}

impl SledError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Sled(_) => ErrorCode::SLED_ERROR,
            Self::Video(_) => ErrorCode::EXTRACT_VIDEO,
        }
    }
}

#[derive(Clone)]
pub(crate) struct SledRepo {
    videos: Tree,
    db: Db,
}

impl SledRepo {
    pub(crate) fn build(path: PathBuf, cache_capacity: u64) -> Result<Self, SledError> {
        let db = ::sled::Config::new()
            .cache_capacity(cache_capacity)
            .path(path)
            .open()?;

        Self::new(db)
    }

    pub(crate) fn new(db: Db) -> Result<Self, SledError> {
        Ok(SledRepo {
            videos: db.open_tree("vid-rs-videos-tree")?,
            db,
        })
    }
}

impl std::fmt::Debug for SledRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledRepo").finish()
    }
}

fn video_key(video_id: Uuid) -> [u8; 16] {
    video_id.into_bytes()
}

#[async_trait::async_trait(?Send)]
impl VideoRepo for SledRepo {
    #[tracing::instrument(skip(self, video), fields(video_id = %video.id))]
    async fn create_video(&self, video: &Video) -> Result<(), RepoError> {
        let key = video_key(video.id);
        let value = serde_json::to_vec(video).map_err(SledError::from)?;

        b!(self.videos, {
            videos
                .insert(key, value)
                .map(|_| ())
                .map_err(SledError::from)
                .map_err(RepoError::from)
        });

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn video(&self, video_id: Uuid) -> Result<Option<Video>, RepoError> {
        let key = video_key(video_id);

        let opt = b!(self.videos, {
            videos
                .get(key)
                .map_err(SledError::from)
                .map_err(RepoError::from)
        });

        opt.map(|ivec| serde_json::from_slice(&ivec))
            .transpose()
            .map_err(SledError::from)
            .map_err(RepoError::from)
    }

    #[tracing::instrument(skip(self, video), fields(video_id = %video.id))]
    async fn update_video(&self, video: &Video) -> Result<(), RepoError> {
        let key = video_key(video.id);
        let value = serde_json::to_vec(video).map_err(SledError::from)?;

        let old = b!(self.videos, {
            videos
                .fetch_and_update(key, move |old| old.map(|_| value.clone()))
                .map_err(SledError::from)
                .map_err(RepoError::from)
        });

        if old.is_none() {
            return Err(RepoError::Missing);
        }

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn health_check(&self) -> Result<(), RepoError> {
        b!(self.db, {
            db.flush()
                .map(|_| ())
                .map_err(SledError::from)
                .map_err(RepoError::from)
        });

        Ok(())
    }
}
