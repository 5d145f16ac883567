use std::sync::Arc;

use actix_web::web::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use object_store::{
    aws::{AmazonS3, AmazonS3Builder},
    path::Path as ObjectPath,
    Attribute, Attributes, ObjectStore as _, PutMultipartOpts, WriteMultipart,
};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use url::Url;

use super::{Store, StoreError};
use crate::{config, error_code::ErrorCode, stream::LocalBoxStream};

const HEALTH_KEY: &str = "vid-rs-health";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ObjectError {
    #[error("Failed to talk to object storage")]
    Request(#[source] ::object_store::Error),

    #[error("Invalid public url")]
    PublicUrl(#[source] url::ParseError),

    #[error("Failed to read upload")]
    Io(#[source] std::io::Error),
}

impl ObjectError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Request(_) => ErrorCode::OBJECT_REQUEST_ERROR,
            Self::PublicUrl(_) => ErrorCode::PUBLIC_URL_ERROR,
            Self::Io(_) => ErrorCode::OBJECT_IO_ERROR,
        }
    }
}

impl From<::object_store::Error> for StoreError {
    fn from(value: ::object_store::Error) -> Self {
        match value {
            e @ ::object_store::Error::NotFound { .. } => {
                Self::ObjectNotFound(ObjectError::Request(e))
            }
            e => Self::ObjectStore(ObjectError::Request(e)),
        }
    }
}

#[derive(Clone)]
pub(crate) struct ObjectStore {
    bucket: Arc<AmazonS3>,
    bucket_name: String,
    region: String,
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("bucket_name", &self.bucket_name)
            .field("region", &self.region)
            .finish()
    }
}

impl ObjectStore {
    pub(crate) fn build(object_storage: &config::ObjectStorage) -> Result<Self, StoreError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&object_storage.bucket_name)
            .with_region(&object_storage.region);

        if let Some(access_key) = &object_storage.access_key {
            builder = builder.with_access_key_id(access_key);
        }

        if let Some(secret_key) = &object_storage.secret_key {
            builder = builder.with_secret_access_key(secret_key);
        }

        if let Some(session_token) = &object_storage.session_token {
            builder = builder.with_token(session_token);
        }

        if let Some(endpoint) = &object_storage.endpoint {
            builder = builder
                .with_endpoint(endpoint.as_str().trim_end_matches('/'))
                .with_allow_http(true);
        }

        let bucket = builder.build().map_err(ObjectError::Request)?;

        Ok(ObjectStore {
            bucket: Arc::new(bucket),
            bucket_name: object_storage.bucket_name.clone(),
            region: object_storage.region.clone(),
        })
    }
}

#[async_trait::async_trait(?Send)]
impl Store for ObjectStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        match self.bucket.head(&ObjectPath::from(HEALTH_KEY)).await {
            Ok(_) | Err(::object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(ObjectError::Request(e).into()),
        }
    }

    async fn save_async_read<Reader>(
        &self,
        key: &str,
        reader: Reader,
        content_type: mime::Mime,
    ) -> Result<(), StoreError>
    where
        Reader: AsyncRead + Unpin + 'static,
    {
        self.save_stream(key, ReaderStream::new(reader), content_type)
            .await
    }

    #[tracing::instrument(skip(self, stream))]
    async fn save_stream<S>(
        &self,
        key: &str,
        mut stream: S,
        content_type: mime::Mime,
    ) -> Result<(), StoreError>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin + 'static,
    {
        let path = ObjectPath::from(key);

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());

        let upload = self
            .bucket
            .put_multipart_opts(
                &path,
                PutMultipartOpts {
                    attributes,
                    ..Default::default()
                },
            )
            .await
            .map_err(ObjectError::Request)?;

        let mut write = WriteMultipart::new(upload);

        while let Some(res) = stream.next().await {
            let bytes = res.map_err(ObjectError::Io)?;

            write.write(&bytes);
        }

        write.finish().await.map_err(ObjectError::Request)?;

        Ok(())
    }

    fn public_url(&self, key: &str) -> Result<Url, StoreError> {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket_name, self.region, key
        )
        .parse()
        .map_err(ObjectError::PublicUrl)
        .map_err(StoreError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn to_stream(
        &self,
        key: &str,
    ) -> Result<LocalBoxStream<'static, std::io::Result<Bytes>>, StoreError> {
        let path = ObjectPath::from(key);

        let resp = self.bucket.get(&path).await.map_err(StoreError::from)?;

        let stream = resp
            .into_stream()
            .map(|res| res.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)));

        Ok(Box::pin(stream))
    }
}
