mod asset_key;
mod auth;
mod config;
mod discover;
mod error;
mod error_code;
mod ffmpeg;
mod file;
mod ingest;
mod init_metrics;
mod init_tracing;
mod process;
mod repo;
mod state;
mod store;
mod stream;
mod tmp_file;

use std::sync::OnceLock;

use actix_form_data::{Field, Form, FormData, Multipart, Value};
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use futures_util::TryStreamExt;
use tokio::sync::Semaphore;
use tracing::Instrument;
use tracing_actix_web::TracingLogger;

use self::{
    error::{Error, UploadError},
    init_metrics::init_metrics,
    init_tracing::init_tracing,
    repo::{Video, VideoRepo},
    state::State,
    store::{file_store::FileStore, object_store::ObjectStore, Store},
    tmp_file::TmpDir,
};

pub(crate) const MEGABYTES: u64 = 1024 * 1024;
pub(crate) const GIGABYTES: u64 = 1024 * MEGABYTES;

static PROCESS_SEMAPHORE: OnceLock<Semaphore> = OnceLock::new();

pub(crate) fn process_semaphore() -> &'static Semaphore {
    PROCESS_SEMAPHORE.get_or_init(|| {
        let permits = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(1)
            .saturating_sub(1)
            .max(1);

        Semaphore::new(permits)
    })
}

fn transform_error(error: actix_form_data::Error) -> actix_web::Error {
    let error: Error = error.into();
    let error: actix_web::Error = error.into();
    error
}

struct VideoUpload(Value<Video>);

impl FormData for VideoUpload {
    type Item = Video;
    type Error = Error;

    fn form(req: &HttpRequest) -> Result<Form<Self::Item, Self::Error>, Self::Error> {
        // Create a new multipart form validator
        //
        // The form expects a single 'video' file field
        let state = req
            .app_data::<web::Data<State<ObjectStore>>>()
            .expect("No state in request")
            .clone();

        let video_id = req.match_info().get("video_id").map(String::from);
        let headers = req.headers().clone();

        Ok(Form::new()
            .max_files(1)
            .max_file_size(state.config.media.max_video_size as usize)
            .transform_error(transform_error)
            .field(
                "video",
                Field::file(move |filename, content_type, stream: std::pin::Pin<Box<dyn futures_core::Stream<Item = Result<actix_web::web::Bytes, actix_form_data::Error>>>>| {
                    let state = state.clone();
                    let video_id = video_id.clone();
                    let headers = headers.clone();

                    metrics::counter!("vid-rs.files", "upload" => "video").increment(1);

                    let span = tracing::info_span!("video-upload", ?filename);

                    let stream = stream.map_err(Error::from);

                    Box::pin(
                        async move {
                            ingest::ingest_video(
                                &state,
                                video_id.as_deref(),
                                &headers,
                                content_type,
                                stream,
                            )
                            .await
                        }
                        .instrument(span),
                    )
                }),
            ))
    }

    fn extract(value: Value<Self::Item>) -> Result<Self, Self::Error> {
        Ok(VideoUpload(value))
    }
}

struct ThumbnailUpload(Value<Video>);

impl FormData for ThumbnailUpload {
    type Item = Video;
    type Error = Error;

    fn form(req: &HttpRequest) -> Result<Form<Self::Item, Self::Error>, Self::Error> {
        // Create a new multipart form validator
        //
        // The form expects a single 'thumbnail' file field
        let state = req
            .app_data::<web::Data<State<ObjectStore>>>()
            .expect("No state in request")
            .clone();

        let video_id = req.match_info().get("video_id").map(String::from);
        let headers = req.headers().clone();

        Ok(Form::new()
            .max_files(1)
            .max_file_size(state.config.media.max_thumbnail_size as usize)
            .transform_error(transform_error)
            .field(
                "thumbnail",
                Field::file(move |filename, content_type, stream: std::pin::Pin<Box<dyn futures_core::Stream<Item = Result<actix_web::web::Bytes, actix_form_data::Error>>>>| {
                    let state = state.clone();
                    let video_id = video_id.clone();
                    let headers = headers.clone();

                    metrics::counter!("vid-rs.files", "upload" => "thumbnail").increment(1);

                    let span = tracing::info_span!("thumbnail-upload", ?filename);

                    let stream = stream.map_err(Error::from);

                    Box::pin(
                        async move {
                            ingest::ingest_thumbnail(
                                &state,
                                video_id.as_deref(),
                                &headers,
                                content_type,
                                stream,
                            )
                            .await
                        }
                        .instrument(span),
                    )
                }),
            ))
    }

    fn extract(value: Value<Self::Item>) -> Result<Self, Self::Error> {
        Ok(ThumbnailUpload(value))
    }
}

/// Handle responding to successful video uploads
#[tracing::instrument(name = "Uploaded video", skip(value))]
async fn upload_video(
    Multipart(VideoUpload(value)): Multipart<VideoUpload>,
) -> Result<HttpResponse, Error> {
    let video = value
        .map()
        .and_then(|mut m| m.remove("video"))
        .and_then(|value| value.file())
        .ok_or(UploadError::NoFiles)?;

    Ok(HttpResponse::Ok().json(&video.result))
}

/// Handle responding to successful thumbnail uploads
#[tracing::instrument(name = "Uploaded thumbnail", skip(value))]
async fn upload_thumbnail(
    Multipart(ThumbnailUpload(value)): Multipart<ThumbnailUpload>,
) -> Result<HttpResponse, Error> {
    let video = value
        .map()
        .and_then(|mut m| m.remove("thumbnail"))
        .and_then(|value| value.file())
        .ok_or(UploadError::NoFiles)?;

    Ok(HttpResponse::Ok().json(&video.result))
}

#[derive(Debug, serde::Deserialize)]
struct CreateVideoForm {
    title: String,

    #[serde(default)]
    description: Option<String>,
}

/// Create a new draft video record for the authenticated caller
#[tracing::instrument(name = "Created video", skip(req, state, body))]
async fn create_video(
    req: HttpRequest,
    state: web::Data<State<ObjectStore>>,
    body: web::Json<CreateVideoForm>,
) -> Result<HttpResponse, Error> {
    let user_id = auth::resolve_identity(req.headers(), &state.config.auth.jwt_secret)
        .map_err(UploadError::from)?;

    let CreateVideoForm { title, description } = body.into_inner();

    let video = Video::new(user_id, title, description);
    state.repo.create_video(&video).await?;

    Ok(HttpResponse::Created().json(&video))
}

/// Fetch a video record
#[tracing::instrument(name = "Fetched video", skip(req, state))]
async fn get_video(
    req: HttpRequest,
    state: web::Data<State<ObjectStore>>,
    video_id: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let user_id = auth::resolve_identity(req.headers(), &state.config.auth.jwt_secret)
        .map_err(UploadError::from)?;

    let video_id: uuid::Uuid = video_id
        .parse()
        .map_err(|_| UploadError::InvalidVideoId)?;

    let video = state
        .repo
        .video(video_id)
        .await?
        .ok_or(UploadError::MissingVideo)?;

    if video.user_id != user_id {
        return Err(UploadError::NotVideoOwner.into());
    }

    Ok(HttpResponse::Ok().json(&video))
}

fn asset_content_type(filename: &str) -> mime::Mime {
    match filename.rsplit_once('.').map(|(_, ext)| ext) {
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("png") => mime::IMAGE_PNG,
        Some("gif") => mime::IMAGE_GIF,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// Serve a thumbnail from the local asset directory
#[tracing::instrument(name = "Served asset", skip(state))]
async fn serve_asset(
    state: web::Data<State<ObjectStore>>,
    filename: web::Path<String>,
) -> Result<HttpResponse, Error> {
    let filename = filename.into_inner();

    if filename.contains('/') || filename.contains("..") {
        return Err(UploadError::InvalidFileName.into());
    }

    let stream = state
        .assets
        .to_stream(&filename)
        .await
        .map_err(UploadError::from)?;

    Ok(HttpResponse::Ok()
        .content_type(asset_content_type(&filename).to_string())
        .streaming(stream))
}

#[tracing::instrument(name = "Healthz", skip(state))]
async fn healthz(state: web::Data<State<ObjectStore>>) -> Result<HttpResponse, Error> {
    state.repo.health_check().await?;
    state
        .videos
        .health_check()
        .await
        .map_err(UploadError::from)?;
    state
        .assets
        .health_check()
        .await
        .map_err(UploadError::from)?;

    Ok(HttpResponse::Ok().json(&serde_json::json!({"msg": "ok"})))
}

async fn launch(state: State<ObjectStore>) -> std::io::Result<()> {
    let address = state.config.server.address;

    HttpServer::new(move || {
        let state = state.clone();

        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state))
            .service(
                web::scope("/videos")
                    .service(web::resource("").route(web::post().to(create_video)))
                    .service(web::resource("/{video_id}").route(web::get().to(get_video)))
                    .service(web::resource("/{video_id}/upload").route(web::post().to(upload_video)))
                    .service(
                        web::resource("/{video_id}/thumbnail")
                            .route(web::post().to(upload_thumbnail)),
                    ),
            )
            .service(web::resource("/assets/{filename}").route(web::get().to(serve_asset)))
            .service(web::resource("/healthz").route(web::get().to(healthz)))
    })
    .bind(address)?
    .run()
    .await
}

/// Run the vid-rs application
pub async fn run() -> color_eyre::Result<()> {
    let config = config::configure()?;

    init_tracing(&config.tracing)?;
    init_metrics(&config.metrics)?;

    let tmp_dir = TmpDir::init(std::env::temp_dir().join("vid-rs")).await?;

    let repo = repo::open(&config.repo)?;

    let videos = ObjectStore::build(&config.object_storage)?;
    let assets = FileStore::build(config.assets.path.clone(), config.server.public_url.clone()).await?;

    let state = State {
        config,
        tmp_dir: tmp_dir.clone(),
        repo,
        videos,
        assets,
    };

    launch(state).await?;

    tmp_dir.cleanup().await?;

    Ok(())
}
