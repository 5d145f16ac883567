use std::{
    pin::Pin,
    task::{Context, Poll},
};

use actix_web::web::Bytes;
use futures_core::Stream;

pub(crate) type LocalBoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + 'a>>;

#[derive(Debug, thiserror::Error)]
#[error("Byte limit exceeded")]
pub(crate) struct LimitError;

pub(crate) trait StreamLimit {
    fn limit(self, limit: u64) -> Limit<Self>
    where
        Self: Sized,
    {
        Limit {
            inner: self,
            count: 0,
            limit,
        }
    }
}

impl<S> StreamLimit for S where S: Stream {}

pin_project_lite::pin_project! {
    pub(crate) struct Limit<S> {
        #[pin]
        inner: S,

        count: u64,
        limit: u64,
    }
}

impl<S, E> Stream for Limit<S>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: From<LimitError>,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        let opt = std::task::ready!(this.inner.poll_next(cx));

        Poll::Ready(opt.map(|res| {
            res.and_then(|bytes| {
                *this.count = this.count.saturating_add(bytes.len() as u64);

                if *this.count > *this.limit {
                    return Err(LimitError.into());
                }

                Ok(bytes)
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use actix_web::web::Bytes;
    use futures_util::StreamExt;

    use super::{LimitError, StreamLimit};

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("Hit limit")]
        Limit(#[from] LimitError),
    }

    fn chunks(sizes: &[usize]) -> impl futures_core::Stream<Item = Result<Bytes, TestError>> {
        let chunks = sizes
            .iter()
            .map(|size| Ok(Bytes::from(vec![0u8; *size])))
            .collect::<Vec<_>>();

        futures_util::stream::iter(chunks)
    }

    #[tokio::test]
    async fn passes_streams_within_limit() {
        let mut stream = std::pin::pin!(chunks(&[4, 4, 2]).limit(10));

        let mut total = 0;
        while let Some(res) = stream.next().await {
            total += res.expect("Next chunk").len();
        }

        assert_eq!(total, 10);
    }

    #[tokio::test]
    async fn errors_without_exceeding_limit() {
        let mut stream = std::pin::pin!(chunks(&[4, 4, 4]).limit(10));

        let mut total = 0;
        let mut failed = false;

        while let Some(res) = stream.next().await {
            match res {
                Ok(bytes) => total += bytes.len(),
                Err(TestError::Limit(_)) => {
                    failed = true;
                    break;
                }
            }
        }

        assert!(failed);
        assert!(total <= 10);
    }
}
