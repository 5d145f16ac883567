use std::{cell::RefCell, collections::HashMap, path::PathBuf, rc::Rc};

use actix_web::web::Bytes;
use futures_util::{stream, StreamExt};
use tokio::io::AsyncReadExt;
use url::Url;
use uuid::Uuid;

use crate::{
    auth::tests::bearer_headers,
    config,
    error::{Error, UploadError},
    ffmpeg::FfMpegError,
    process::ProcessError,
    repo::{sled::tests::temporary_repo, Video, VideoRepo},
    state::State,
    store::{file_store::FileError, file_store::FileStore, Store, StoreError},
    stream::LocalBoxStream,
    tmp_file::{TmpDir, TmpFile},
};

const SECRET: &str = "test-secret";

const LANDSCAPE_FFPROBE: &str = r#"#!/bin/sh
printf '{"streams":[{"codec_type":"video","width":1920,"height":1080},{"codec_type":"audio"}]}'
"#;

const PORTRAIT_FFPROBE: &str = r#"#!/bin/sh
printf '{"streams":[{"codec_type":"video","width":1080,"height":1920}]}'
"#;

const COPY_FFMPEG: &str = r#"#!/bin/sh
for arg; do out="$arg"; done
printf 'faststart bytes' > "$out"
"#;

const FAILING_FFMPEG: &str = r#"#!/bin/sh
exit 1
"#;

#[derive(Clone)]
struct MockStore {
    objects: Rc<RefCell<HashMap<String, (mime::Mime, Vec<u8>)>>>,
}

impl MockStore {
    fn new() -> Self {
        MockStore {
            objects: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    fn object(&self, key: &str) -> Option<(mime::Mime, Vec<u8>)> {
        self.objects.borrow().get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.objects.borrow().keys().cloned().collect()
    }
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore").finish()
    }
}

#[async_trait::async_trait(?Send)]
impl Store for MockStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn save_async_read<Reader>(
        &self,
        key: &str,
        mut reader: Reader,
        content_type: mime::Mime,
    ) -> Result<(), StoreError>
    where
        Reader: tokio::io::AsyncRead + Unpin + 'static,
    {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await.map_err(FileError::from)?;

        self.objects
            .borrow_mut()
            .insert(key.to_string(), (content_type, bytes));

        Ok(())
    }

    async fn save_stream<S>(
        &self,
        key: &str,
        mut stream: S,
        content_type: mime::Mime,
    ) -> Result<(), StoreError>
    where
        S: futures_core::Stream<Item = std::io::Result<Bytes>> + Unpin + 'static,
    {
        let mut bytes = Vec::new();
        while let Some(res) = stream.next().await {
            bytes.extend_from_slice(&res.map_err(FileError::from)?);
        }

        self.objects
            .borrow_mut()
            .insert(key.to_string(), (content_type, bytes));

        Ok(())
    }

    fn public_url(&self, key: &str) -> Result<Url, StoreError> {
        format!("https://vid-rs-test.s3.us-east-1.amazonaws.com/{key}")
            .parse()
            .map_err(|_| StoreError::FileStore(FileError::FileExists))
    }

    async fn to_stream(
        &self,
        key: &str,
    ) -> Result<LocalBoxStream<'static, std::io::Result<Bytes>>, StoreError> {
        let (_, bytes) = self
            .object(key)
            .ok_or_else(|| StoreError::FileNotFound(std::io::ErrorKind::NotFound.into()))?;

        Ok(Box::pin(stream::once(async move {
            Ok::<_, std::io::Error>(Bytes::from(bytes))
        })))
    }
}

struct Harness {
    state: State<MockStore>,
    user_id: Uuid,
    video: Video,

    _scratch: crate::tmp_file::ArcTmpDir,
    _stubs: Vec<TmpFile>,
}

async fn write_stub(dir: &TmpDir, script: &str) -> (TmpFile, String) {
    let stub = dir.tmp_file(None);

    tokio::fs::write(&*stub, script).await.expect("Wrote stub");

    let mut permissions = tokio::fs::metadata(&*stub)
        .await
        .expect("Stub metadata")
        .permissions();
    std::os::unix::fs::PermissionsExt::set_mode(&mut permissions, 0o755);
    tokio::fs::set_permissions(&*stub, permissions)
        .await
        .expect("Marked stub executable");

    let path = stub.to_str().expect("Valid path").to_string();

    (stub, path)
}

async fn harness(ffmpeg_script: &str, ffprobe_script: &str) -> Harness {
    let tmp_dir = TmpDir::init(std::env::temp_dir().join("vid-rs-tests"))
        .await
        .expect("Created staging dir");
    let scratch = TmpDir::init(std::env::temp_dir().join("vid-rs-tests"))
        .await
        .expect("Created scratch dir");

    let (ffmpeg_stub, ffmpeg_path) = write_stub(&scratch, ffmpeg_script).await;
    let (ffprobe_stub, ffprobe_path) = write_stub(&scratch, ffprobe_script).await;

    let assets_root: PathBuf = scratch.tmp_file(None).to_path_buf();
    let assets = FileStore::build(
        assets_root,
        Url::parse("http://localhost:8080/").expect("Valid url"),
    )
    .await
    .expect("Built asset store");

    let repo = temporary_repo();

    let user_id = Uuid::new_v4();
    let video = Video::new(user_id, "Morning commute timelapse".into(), None);
    repo.create_video(&video).await.expect("Created record");

    let mut config = config::test_configuration();
    config.auth.jwt_secret = SECRET.into();
    config.media.ffmpeg_path = ffmpeg_path;
    config.media.ffprobe_path = ffprobe_path;
    config.media.process_timeout = 5;
    config.media.max_video_size = 50 * crate::MEGABYTES;
    config.media.max_thumbnail_size = crate::MEGABYTES;

    let state = State {
        config,
        tmp_dir,
        repo,
        videos: MockStore::new(),
        assets,
    };

    Harness {
        state,
        user_id,
        video,
        _scratch: scratch,
        _stubs: vec![ffmpeg_stub, ffprobe_stub],
    }
}

impl Harness {
    fn video_id(&self) -> String {
        self.video.id.to_string()
    }

    async fn staged_file_count(&self) -> usize {
        let probe = self.state.tmp_dir.tmp_file(None);
        let dir = probe.parent().expect("Staging dir exists").to_path_buf();
        drop(probe);

        let mut entries = tokio::fs::read_dir(dir).await.expect("Read staging dir");

        let mut count = 0;
        while entries.next_entry().await.expect("Next entry").is_some() {
            count += 1;
        }

        count
    }

    async fn stored_record(&self) -> Video {
        self.state
            .repo
            .video(self.video.id)
            .await
            .expect("Fetched")
            .expect("Present")
    }
}

fn upload_stream(bytes: &[u8]) -> impl futures_core::Stream<Item = Result<Bytes, Error>> {
    let items: Vec<Result<Bytes, Error>> = vec![Ok(Bytes::copy_from_slice(bytes))];

    stream::iter(items)
}

fn chunked_stream(chunk: usize, count: usize) -> impl futures_core::Stream<Item = Result<Bytes, Error>> {
    let items: Vec<Result<Bytes, Error>> = (0..count)
        .map(|_| Ok(Bytes::from(vec![0u8; chunk])))
        .collect();

    stream::iter(items)
}

fn mp4() -> mime::Mime {
    "video/mp4".parse().expect("Valid mime")
}

#[tokio::test]
async fn landscape_video_lands_in_object_storage() {
    let harness = harness(COPY_FFMPEG, LANDSCAPE_FFPROBE).await;
    let headers = bearer_headers(harness.user_id, SECRET);

    let video = super::ingest_video(
        &harness.state,
        Some(&harness.video_id()),
        &headers,
        mp4(),
        upload_stream(b"raw mp4 bytes"),
    )
    .await
    .expect("Ingested video");

    let url = video.video_url.clone().expect("Video url is set");

    let prefix = "https://vid-rs-test.s3.us-east-1.amazonaws.com/landscape/";
    assert!(url.as_str().starts_with(prefix), "{url}");
    assert!(url.as_str().ends_with(".mp4"));

    let token = &url.as_str()[prefix.len()..url.as_str().len() - ".mp4".len()];
    assert_eq!(token.len(), 22);

    let keys = harness.state.videos.keys();
    assert_eq!(keys.len(), 1);

    let (content_type, bytes) = harness.state.videos.object(&keys[0]).expect("Object saved");
    assert_eq!(content_type, mp4());
    // the processed output is uploaded, not the raw staged bytes
    assert_eq!(bytes, b"faststart bytes");

    assert_eq!(harness.stored_record().await.video_url, Some(url));
    assert_eq!(harness.staged_file_count().await, 0);
}

#[tokio::test]
async fn portrait_video_takes_portrait_prefix() {
    let harness = harness(COPY_FFMPEG, PORTRAIT_FFPROBE).await;
    let headers = bearer_headers(harness.user_id, SECRET);

    let video = super::ingest_video(
        &harness.state,
        Some(&harness.video_id()),
        &headers,
        mp4(),
        upload_stream(b"raw mp4 bytes"),
    )
    .await
    .expect("Ingested video");

    let url = video.video_url.expect("Video url is set");
    assert!(url
        .as_str()
        .starts_with("https://vid-rs-test.s3.us-east-1.amazonaws.com/portrait/"));
}

#[tokio::test]
async fn webm_content_type_is_rejected() {
    let harness = harness(COPY_FFMPEG, LANDSCAPE_FFPROBE).await;
    let headers = bearer_headers(harness.user_id, SECRET);

    let err = super::ingest_video(
        &harness.state,
        Some(&harness.video_id()),
        &headers,
        "video/webm".parse().expect("Valid mime"),
        upload_stream(b"raw webm bytes"),
    )
    .await
    .expect_err("Rejected upload");

    assert!(matches!(
        err.kind(),
        Some(UploadError::UnsupportedMediaType(t)) if t == "video/webm"
    ));
    assert!(err.to_string().contains("video/webm"));

    assert!(harness.state.videos.keys().is_empty());
    assert!(harness.stored_record().await.video_url.is_none());
    assert_eq!(harness.staged_file_count().await, 0);
}

#[tokio::test]
async fn non_owner_is_rejected_before_staging() {
    let harness = harness(COPY_FFMPEG, LANDSCAPE_FFPROBE).await;
    let headers = bearer_headers(Uuid::new_v4(), SECRET);

    let err = super::ingest_video(
        &harness.state,
        Some(&harness.video_id()),
        &headers,
        mp4(),
        upload_stream(b"raw mp4 bytes"),
    )
    .await
    .expect_err("Rejected upload");

    assert!(matches!(err.kind(), Some(UploadError::NotVideoOwner)));

    assert_eq!(harness.staged_file_count().await, 0);
    assert!(harness.state.videos.keys().is_empty());
    assert!(harness.stored_record().await.video_url.is_none());
}

#[tokio::test]
async fn missing_record_is_not_found() {
    let harness = harness(COPY_FFMPEG, LANDSCAPE_FFPROBE).await;
    let headers = bearer_headers(harness.user_id, SECRET);

    let err = super::ingest_video(
        &harness.state,
        Some(&Uuid::new_v4().to_string()),
        &headers,
        mp4(),
        upload_stream(b"raw mp4 bytes"),
    )
    .await
    .expect_err("Rejected upload");

    assert!(matches!(err.kind(), Some(UploadError::MissingVideo)));
    assert_eq!(harness.staged_file_count().await, 0);
}

#[tokio::test]
async fn malformed_video_id_is_rejected() {
    let harness = harness(COPY_FFMPEG, LANDSCAPE_FFPROBE).await;
    let headers = bearer_headers(harness.user_id, SECRET);

    let err = super::ingest_video(
        &harness.state,
        Some("not-a-uuid"),
        &headers,
        mp4(),
        upload_stream(b"raw mp4 bytes"),
    )
    .await
    .expect_err("Rejected upload");

    assert!(matches!(err.kind(), Some(UploadError::InvalidVideoId)));
}

#[tokio::test]
async fn failed_transcode_cleans_up() {
    let harness = harness(FAILING_FFMPEG, LANDSCAPE_FFPROBE).await;
    let headers = bearer_headers(harness.user_id, SECRET);

    let err = super::ingest_video(
        &harness.state,
        Some(&harness.video_id()),
        &headers,
        mp4(),
        upload_stream(b"raw mp4 bytes"),
    )
    .await
    .expect_err("Rejected upload");

    assert!(matches!(
        err.kind(),
        Some(UploadError::Ffmpeg(FfMpegError::Process(
            ProcessError::Status(_, _)
        )))
    ));

    assert_eq!(harness.staged_file_count().await, 0);
    assert!(harness.state.videos.keys().is_empty());
    assert!(harness.stored_record().await.video_url.is_none());
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let mut harness = harness(COPY_FFMPEG, LANDSCAPE_FFPROBE).await;
    harness.state.config.media.max_video_size = 8;

    let headers = bearer_headers(harness.user_id, SECRET);

    let err = super::ingest_video(
        &harness.state,
        Some(&harness.video_id()),
        &headers,
        mp4(),
        chunked_stream(4, 4),
    )
    .await
    .expect_err("Rejected upload");

    assert!(matches!(err.kind(), Some(UploadError::Limit(_))));

    assert_eq!(harness.staged_file_count().await, 0);
    assert!(harness.state.videos.keys().is_empty());
}

#[tokio::test]
async fn thumbnail_upload_serves_from_assets() {
    let harness = harness(COPY_FFMPEG, LANDSCAPE_FFPROBE).await;
    let headers = bearer_headers(harness.user_id, SECRET);

    let video = super::ingest_thumbnail(
        &harness.state,
        Some(&harness.video_id()),
        &headers,
        "image/png".parse().expect("Valid mime"),
        upload_stream(b"png bytes"),
    )
    .await
    .expect("Ingested thumbnail");

    let url = video.thumbnail_url.clone().expect("Thumbnail url is set");

    let prefix = "http://localhost:8080/assets/";
    assert!(url.as_str().starts_with(prefix), "{url}");
    assert!(url.as_str().ends_with(".png"));

    let filename = &url.as_str()[prefix.len()..];
    assert_eq!(filename.len(), 22 + ".png".len());

    let mut stream = harness
        .state
        .assets
        .to_stream(filename)
        .await
        .expect("Asset exists");

    let mut bytes = Vec::new();
    while let Some(res) = stream.next().await {
        bytes.extend_from_slice(&res.expect("Read chunk"));
    }
    assert_eq!(bytes, b"png bytes");

    assert_eq!(harness.stored_record().await.thumbnail_url, Some(url));
    assert_eq!(harness.staged_file_count().await, 0);
}

#[tokio::test]
async fn thumbnail_gif_is_rejected() {
    let harness = harness(COPY_FFMPEG, LANDSCAPE_FFPROBE).await;
    let headers = bearer_headers(harness.user_id, SECRET);

    let err = super::ingest_thumbnail(
        &harness.state,
        Some(&harness.video_id()),
        &headers,
        "image/gif".parse().expect("Valid mime"),
        upload_stream(b"gif bytes"),
    )
    .await
    .expect_err("Rejected upload");

    assert!(matches!(
        err.kind(),
        Some(UploadError::UnsupportedMediaType(t)) if t == "image/gif"
    ));
    assert_eq!(harness.staged_file_count().await, 0);
}

#[tokio::test]
async fn stage_preserves_exact_bytes() {
    let tmp_dir = TmpDir::init(std::env::temp_dir().join("vid-rs-tests"))
        .await
        .expect("Created staging dir");

    let (file, staged) = super::stage(&tmp_dir, chunked_stream(4, 3), 1024, None)
        .await
        .expect("Staged");

    assert_eq!(file.len().await.expect("File length"), 12);

    // the handle has been rewound, reading yields the bytes from the start
    let mut stream = file.read_to_stream();
    let mut bytes = Vec::new();
    while let Some(res) = stream.next().await {
        bytes.extend_from_slice(&res.expect("Read chunk"));
    }
    assert_eq!(bytes, vec![0u8; 12]);

    staged.cleanup().await.expect("Removed staged file");
    tmp_dir.cleanup().await.expect("Removed staging dir");
}
