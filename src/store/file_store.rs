use std::path::{Path, PathBuf};

use actix_web::web::Bytes;
use futures_core::Stream;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use url::Url;

use super::{Store, StoreError};
use crate::{error_code::ErrorCode, file::File, stream::LocalBoxStream};

#[derive(Debug, thiserror::Error)]
pub(crate) enum FileError {
    #[error("Failed reading or writing the file")]
    Io(#[from] std::io::Error),

    #[error("Refusing to overwrite existing file")]
    FileExists,

    #[error("Invalid public url")]
    PublicUrl(#[source] url::ParseError),
}

impl FileError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::FILE_IO_ERROR,
            Self::FileExists => ErrorCode::FILE_EXISTS,
            Self::PublicUrl(_) => ErrorCode::PUBLIC_URL_ERROR,
        }
    }
}

/// Flat on-disk asset directory, served back under `/assets/`.
#[derive(Clone)]
pub(crate) struct FileStore {
    root_dir: PathBuf,
    public_url: Url,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("root_dir", &self.root_dir)
            .finish()
    }
}

impl FileStore {
    pub(crate) async fn build(root_dir: PathBuf, public_url: Url) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(&root_dir)
            .await
            .map_err(FileError::from)?;

        Ok(FileStore {
            root_dir,
            public_url,
        })
    }

    fn path_from_key(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    async fn safe_remove_file<P: AsRef<Path>>(&self, path: P) -> Result<(), FileError> {
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    async fn safe_save_reader<P: AsRef<Path>>(
        &self,
        to: P,
        input: &mut (impl AsyncRead + Unpin + ?Sized),
    ) -> Result<(), FileError> {
        if let Err(e) = tokio::fs::metadata(&to).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        } else {
            return Err(FileError::FileExists);
        }

        let mut file = File::create(&to).await?;

        file.write_from_async_read(input).await?;

        Ok(())
    }
}

#[async_trait::async_trait(?Send)]
impl Store for FileStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        tokio::fs::metadata(&self.root_dir)
            .await
            .map_err(FileError::from)?;

        Ok(())
    }

    #[tracing::instrument(skip(self, reader))]
    async fn save_async_read<Reader>(
        &self,
        key: &str,
        mut reader: Reader,
        _content_type: mime::Mime,
    ) -> Result<(), StoreError>
    where
        Reader: AsyncRead + Unpin + 'static,
    {
        let path = self.path_from_key(key);

        if let Err(e) = self.safe_save_reader(&path, &mut reader).await {
            if !matches!(e, FileError::FileExists) {
                let _ = self.safe_remove_file(&path).await;
            }

            return Err(e.into());
        }

        Ok(())
    }

    async fn save_stream<S>(
        &self,
        key: &str,
        stream: S,
        content_type: mime::Mime,
    ) -> Result<(), StoreError>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin + 'static,
    {
        self.save_async_read(key, StreamReader::new(stream), content_type)
            .await
    }

    fn public_url(&self, key: &str) -> Result<Url, StoreError> {
        self.public_url
            .join(&format!("assets/{key}"))
            .map_err(FileError::PublicUrl)
            .map_err(StoreError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn to_stream(
        &self,
        key: &str,
    ) -> Result<LocalBoxStream<'static, std::io::Result<Bytes>>, StoreError> {
        let path = self.path_from_key(key);

        let file = File::open(path).await.map_err(FileError::from)?;

        Ok(Box::pin(file.read_to_stream()))
    }
}
