use std::{net::SocketAddr, path::PathBuf};

use url::Url;

use super::primitives::LogFormat;
use crate::{GIGABYTES, MEGABYTES};

#[derive(Clone, Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct Defaults {
    server: ServerDefaults,
    tracing: TracingDefaults,
    metrics: MetricsDefaults,
    auth: AuthDefaults,
    repo: RepoDefaults,
    media: MediaDefaults,
    object_storage: ObjectStorageDefaults,
    assets: AssetsDefaults,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct ServerDefaults {
    address: SocketAddr,
    public_url: Url,
}

impl Default for ServerDefaults {
    fn default() -> Self {
        ServerDefaults {
            address: ([0, 0, 0, 0], 8080).into(),
            public_url: Url::parse("http://localhost:8080/").expect("valid url"),
        }
    }
}

#[derive(Clone, Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct TracingDefaults {
    logging: LoggingDefaults,

    opentelemetry: OpenTelemetryDefaults,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct LoggingDefaults {
    format: LogFormat,
    targets: String,
}

impl Default for LoggingDefaults {
    fn default() -> Self {
        LoggingDefaults {
            format: LogFormat::Normal,
            targets: "info".into(),
        }
    }
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct OpenTelemetryDefaults {
    service_name: String,
    targets: String,
}

impl Default for OpenTelemetryDefaults {
    fn default() -> Self {
        OpenTelemetryDefaults {
            service_name: "vid-rs".into(),
            targets: "info".into(),
        }
    }
}

#[derive(Clone, Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct MetricsDefaults {}

#[derive(Clone, Debug, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct AuthDefaults {
    jwt_secret: String,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
enum RepoDefaults {
    Sled(SledDefaults),
}

impl Default for RepoDefaults {
    fn default() -> Self {
        Self::Sled(SledDefaults::default())
    }
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct SledDefaults {
    path: PathBuf,
    cache_capacity: u64,
}

impl Default for SledDefaults {
    fn default() -> Self {
        SledDefaults {
            path: PathBuf::from(String::from("./sled-repo")),
            cache_capacity: 1024 * 1024 * 64,
        }
    }
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct MediaDefaults {
    max_video_size: u64,
    max_thumbnail_size: u64,
    process_timeout: u64,
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl Default for MediaDefaults {
    fn default() -> Self {
        MediaDefaults {
            max_video_size: GIGABYTES,
            max_thumbnail_size: 10 * MEGABYTES,
            process_timeout: 30,
            ffmpeg_path: "ffmpeg".into(),
            ffprobe_path: "ffprobe".into(),
        }
    }
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct ObjectStorageDefaults {
    bucket_name: String,
    region: String,
}

impl Default for ObjectStorageDefaults {
    fn default() -> Self {
        ObjectStorageDefaults {
            bucket_name: "vid-rs".into(),
            region: "us-east-1".into(),
        }
    }
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "snake_case")]
struct AssetsDefaults {
    path: PathBuf,
}

impl Default for AssetsDefaults {
    fn default() -> Self {
        AssetsDefaults {
            path: PathBuf::from(String::from("./assets")),
        }
    }
}
