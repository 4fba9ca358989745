//! Shared test harness for integration tests.
//!
//! Provides [`StreamFixture`], which lays out a file root holding one stream:
//! a JSON manifest, DASH and Smooth manifests, init segments and a fragmented
//! MP4 built with the `fixtures` builder.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;

use hippo::config::Config;
use hippo::server::{create_router, AppContext};
use hippo_media::fixture::{FragmentedFile, FragmentedFileBuilder};

pub const MANIFEST: &str = r#"{
    "media": [
        {
            "trackId": 1,
            "mediaSegments": {
                "file": "media.mp4",
                "urls": [
                    { "pattern": "^video/(\\d+)\\.m4s$", "fields": ["time"] },
                    { "pattern": "^QualityLevels\\((\\d+)\\)/Fragments\\(video=(\\d+)\\)$", "fields": ["bitrate", "time"] }
                ]
            },
            "initSegment": { "file": "video_init.mp4", "url": "^video/init\\.mp4$" }
        },
        {
            "trackId": 2,
            "mediaSegments": {
                "file": "media.mp4",
                "urls": [
                    { "pattern": "^audio/(\\d+)\\.m4s$", "fields": ["time"] },
                    { "pattern": "^audio/seg-(\\w+)$", "fields": ["time"] }
                ]
            },
            "initSegment": { "file": "audio_init.mp4" }
        }
    ]
}"#;

pub const DASH_MPD: &str = "<MPD/>";
pub const SMOOTH_ISMC: &str = "<SmoothStreamingMedia/>";

/// A file root with one stream at `movies/feature/stream.json`.
pub struct StreamFixture {
    pub dir: TempDir,
    pub media: FragmentedFile,
}

impl StreamFixture {
    pub fn new() -> Self {
        Self::with_manifest(MANIFEST)
    }

    pub fn with_manifest(manifest: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let stream_dir = dir.path().join("movies/feature");
        std::fs::create_dir_all(&stream_dir).unwrap();

        let media = FragmentedFileBuilder::new()
            .fragment(1, 0, 1000)
            .fragment(2, 0, 300)
            .fragment(1, 90000, 800)
            .fragment(2, 44100, 300)
            .build();
        media.write_to(stream_dir.join("media.mp4")).unwrap();

        std::fs::write(stream_dir.join("stream.json"), manifest).unwrap();
        std::fs::write(stream_dir.join("stream.mpd"), DASH_MPD).unwrap();
        std::fs::write(stream_dir.join("stream.ismc"), SMOOTH_ISMC).unwrap();
        std::fs::write(stream_dir.join("video_init.mp4"), b"video-init").unwrap();
        std::fs::write(stream_dir.join("audio_init.mp4"), b"audio-init").unwrap();

        Self { dir, media }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn media_path(&self) -> PathBuf {
        self.root().join("movies/feature/media.mp4")
    }

    /// Config serving this fixture at the default URL root.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.server.file_root = self.root().canonicalize().unwrap();
        config
    }

    /// Expected bytes of the fragment for `(track_id, time)`.
    pub fn fragment_bytes(&self, track_id: u32, time: u64) -> &[u8] {
        let layout = self.media.fragment(track_id, time).unwrap();
        let end = layout.end.unwrap() as usize;
        &self.media.data[layout.start as usize..=end]
    }

    pub fn router(&self) -> Router {
        self.router_with(self.config())
    }

    pub fn router_with(&self, config: Config) -> Router {
        create_router(AppContext::new(config))
    }

    /// Start an Axum server for this fixture on a random port.
    pub async fn with_server(&self) -> SocketAddr {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        addr
    }
}

/// Helper to get response body as bytes
pub async fn body_bytes(body: Body) -> Vec<u8> {
    body.collect().await.unwrap().to_bytes().to_vec()
}

/// Helper to get response body as string
pub async fn body_to_string(body: Body) -> String {
    String::from_utf8(body_bytes(body).await).unwrap()
}
