use std::fmt::Debug;

use actix_web::web::Bytes;
use futures_core::Stream;
use tokio::io::AsyncRead;
use url::Url;

use crate::{error_code::ErrorCode, stream::LocalBoxStream};

pub(crate) mod file_store;
pub(crate) mod object_store;

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("Error in local file store")]
    FileStore(#[source] file_store::FileError),

    #[error("Error in object storage")]
    ObjectStore(#[source] object_store::ObjectError),

    #[error("Requested asset file is not found")]
    FileNotFound(#[source] std::io::Error),

    #[error("Requested object is not present in storage")]
    ObjectNotFound(#[source] object_store::ObjectError),
}

impl StoreError {
    pub(crate) const fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_) | Self::ObjectNotFound(_))
    }

    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::FileStore(e) => e.error_code(),
            Self::ObjectStore(e) | Self::ObjectNotFound(e) => e.error_code(),
            Self::FileNotFound(_) => ErrorCode::FILE_IO_ERROR,
        }
    }
}

impl From<file_store::FileError> for StoreError {
    fn from(value: file_store::FileError) -> Self {
        match value {
            file_store::FileError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::FileNotFound(e)
            }
            e => Self::FileStore(e),
        }
    }
}

impl From<object_store::ObjectError> for StoreError {
    fn from(value: object_store::ObjectError) -> Self {
        Self::ObjectStore(value)
    }
}

#[async_trait::async_trait(?Send)]
pub(crate) trait Store: Clone + Debug {
    async fn health_check(&self) -> Result<(), StoreError>;

    async fn save_async_read<Reader>(
        &self,
        key: &str,
        reader: Reader,
        content_type: mime::Mime,
    ) -> Result<(), StoreError>
    where
        Reader: AsyncRead + Unpin + 'static;

    async fn save_stream<S>(
        &self,
        key: &str,
        stream: S,
        content_type: mime::Mime,
    ) -> Result<(), StoreError>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin + 'static;

    /// The externally reachable URL for the asset stored under `key`.
    fn public_url(&self, key: &str) -> Result<Url, StoreError>;

    async fn to_stream(
        &self,
        key: &str,
    ) -> Result<LocalBoxStream<'static, std::io::Result<Bytes>>, StoreError>;
}
