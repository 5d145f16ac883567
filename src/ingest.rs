#[cfg(test)]
mod tests;

use std::time::Instant;

use actix_web::{http::header::HeaderMap, web::Bytes};
use futures_core::Stream;
use uuid::Uuid;

use crate::{
    asset_key, auth, discover,
    error::{Error, UploadError},
    ffmpeg,
    file::File,
    repo::{Video, VideoRepo},
    state::State,
    store::Store,
    stream::StreamLimit,
    tmp_file::{TmpDir, TmpFile},
};

struct MetricsGuard {
    start: Instant,
    armed: bool,
    kind: &'static str,
}

impl MetricsGuard {
    fn guard(kind: &'static str) -> Self {
        metrics::counter!("vid-rs.ingest.start", "kind" => kind).increment(1);

        Self {
            start: Instant::now(),
            armed: true,
            kind,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for MetricsGuard {
    fn drop(&mut self) {
        metrics::histogram!(
            "vid-rs.ingest.duration",
            "kind" => self.kind,
            "completed" => (!self.armed).to_string(),
        )
        .record(self.start.elapsed().as_secs_f64());

        metrics::counter!(
            "vid-rs.ingest.end",
            "kind" => self.kind,
            "completed" => (!self.armed).to_string(),
        )
        .increment(1);
    }
}

fn parse_video_id(video_id: Option<&str>) -> Result<Uuid, Error> {
    video_id
        .and_then(|video_id| video_id.parse().ok())
        .ok_or(UploadError::InvalidVideoId)
        .map_err(Error::from)
}

/// Fetch the target record and refuse to continue unless the caller owns it.
///
/// Runs before anything touches the disk so rejected requests leave no staged files behind.
async fn authorized_video<S>(
    state: &State<S>,
    video_id: Option<&str>,
    headers: &HeaderMap,
) -> Result<Video, Error>
where
    S: Store + 'static,
{
    let video_id = parse_video_id(video_id)?;

    let user_id = auth::resolve_identity(headers, &state.config.auth.jwt_secret)
        .map_err(UploadError::from)?;

    let video = state
        .repo
        .video(video_id)
        .await?
        .ok_or(UploadError::MissingVideo)?;

    if video.user_id != user_id {
        return Err(UploadError::NotVideoOwner.into());
    }

    Ok(video)
}

/// Materialize an upload stream into a temporary file, bounded by `size_limit`.
///
/// The copy fails rather than truncates when the stream runs past the limit. The returned handle
/// has been rewound to the start so the same bytes can be read again, and the backing file is
/// removed when the returned guard goes out of scope.
#[tracing::instrument(skip(tmp_dir, stream))]
async fn stage<S>(
    tmp_dir: &TmpDir,
    stream: S,
    size_limit: u64,
    ext: Option<&str>,
) -> Result<(File, TmpFile), Error>
where
    S: Stream<Item = Result<Bytes, Error>>,
{
    let staged = tmp_dir.tmp_file(ext);

    let mut file = File::create(&*staged).await.map_err(UploadError::from)?;

    file.write_from_stream(stream.limit(size_limit)).await?;
    file.rewind().await.map_err(UploadError::from)?;

    Ok((file, staged))
}

#[tracing::instrument(skip(state, headers, stream))]
pub(crate) async fn ingest_video<S>(
    state: &State<S>,
    video_id: Option<&str>,
    headers: &HeaderMap,
    content_type: mime::Mime,
    stream: impl Stream<Item = Result<Bytes, Error>>,
) -> Result<Video, Error>
where
    S: Store + 'static,
{
    let guard = MetricsGuard::guard("video");

    let mut video = authorized_video(state, video_id, headers).await?;

    if content_type.essence_str() != "video/mp4" {
        return Err(UploadError::UnsupportedMediaType(content_type.essence_str().to_string()).into());
    }

    let permit = crate::process_semaphore()
        .acquire()
        .await
        .map_err(UploadError::from)?;

    let (file, staged) = stage(
        &state.tmp_dir,
        stream,
        state.config.media.max_video_size,
        Some(".mp4"),
    )
    .await?;

    // the external tools read the staged bytes by path
    drop(file);

    let processed = ffmpeg::optimize_for_streaming(&state.config.media, &staged)
        .await
        .map_err(UploadError::from)?;

    // probe the original staged bytes, not the processed output
    let orientation = discover::probe_orientation(&state.config.media, &staged)
        .await
        .map_err(UploadError::from)?;

    drop(permit);

    let key = asset_key::derive(Some(orientation), ".mp4");

    let processed_file = File::open(&*processed).await.map_err(UploadError::from)?;

    state
        .videos
        .save_stream(&key, processed_file.read_to_stream(), content_type)
        .await
        .map_err(UploadError::from)?;

    video.video_url = Some(state.videos.public_url(&key).map_err(UploadError::from)?);
    video.updated_at = time::OffsetDateTime::now_utc();
    state.repo.update_video(&video).await?;

    staged.cleanup().await.map_err(UploadError::from)?;
    processed.cleanup().await.map_err(UploadError::from)?;

    guard.disarm();

    Ok(video)
}

fn thumbnail_extension(content_type: &mime::Mime) -> Option<&'static str> {
    match content_type.essence_str() {
        "image/jpeg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/gif" => Some(".gif"),
        _ => None,
    }
}

#[tracing::instrument(skip(state, headers, stream))]
pub(crate) async fn ingest_thumbnail<S>(
    state: &State<S>,
    video_id: Option<&str>,
    headers: &HeaderMap,
    content_type: mime::Mime,
    stream: impl Stream<Item = Result<Bytes, Error>>,
) -> Result<Video, Error>
where
    S: Store + 'static,
{
    let guard = MetricsGuard::guard("thumbnail");

    let mut video = authorized_video(state, video_id, headers).await?;

    let essence = content_type.essence_str();
    if essence != "image/jpeg" && essence != "image/png" {
        return Err(UploadError::UnsupportedMediaType(essence.to_string()).into());
    }

    let ext = thumbnail_extension(&content_type)
        .ok_or_else(|| UploadError::UnsupportedMediaType(essence.to_string()))?;

    let (file, staged) = stage(
        &state.tmp_dir,
        stream,
        state.config.media.max_thumbnail_size,
        Some(ext),
    )
    .await?;

    let key = asset_key::derive(None, ext);

    state
        .assets
        .save_stream(&key, file.read_to_stream(), content_type)
        .await
        .map_err(UploadError::from)?;

    video.thumbnail_url = Some(state.assets.public_url(&key).map_err(UploadError::from)?);
    video.updated_at = time::OffsetDateTime::now_utc();
    state.repo.update_video(&video).await?;

    staged.cleanup().await.map_err(UploadError::from)?;

    guard.disarm();

    Ok(video)
}
