use std::path::Path;

use actix_web::web::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

pub(crate) struct File {
    inner: tokio::fs::File,
}

impl File {
    pub(crate) async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(File {
            inner: tokio::fs::File::open(path).await?,
        })
    }

    pub(crate) async fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(File {
            inner: tokio::fs::File::create(path).await?,
        })
    }

    pub(crate) async fn write_from_stream<S, E>(&mut self, stream: S) -> Result<(), E>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: From<std::io::Error>,
    {
        futures_util::pin_mut!(stream);

        while let Some(res) = stream.next().await {
            let mut bytes = res?;

            self.inner.write_all_buf(&mut bytes).await?;
        }

        self.inner.flush().await?;

        Ok(())
    }

    pub(crate) async fn write_from_async_read<R>(&mut self, mut reader: R) -> std::io::Result<()>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        tokio::io::copy(&mut reader, &mut self.inner).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub(crate) async fn rewind(&mut self) -> std::io::Result<()> {
        self.inner.rewind().await?;
        Ok(())
    }

    pub(crate) async fn len(&self) -> std::io::Result<u64> {
        Ok(self.inner.metadata().await?.len())
    }

    pub(crate) fn read_to_stream(self) -> impl Stream<Item = std::io::Result<Bytes>> + Unpin {
        ReaderStream::new(self.inner)
    }
}
