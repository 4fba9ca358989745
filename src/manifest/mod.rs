//! Per-stream JSON manifests.
//!
//! A stream directory holds a JSON manifest that maps request sub-paths to
//! files: the DASH and Smooth manifests, the init segment of every track and
//! the fragmented file that media segments are cut from.
//!
//! ```json
//! {
//!   "media": [{
//!     "trackId": 1,
//!     "mediaSegments": {
//!       "file": "video.mp4",
//!       "urls": [{ "pattern": "video/(\\d+)\\.m4s", "fields": ["time"] }]
//!     },
//!     "initSegment": { "file": "video_init.mp4", "url": "video/init" }
//!   }]
//! }
//! ```

mod anchor;

pub use anchor::find_manifest;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const DASH_CONTENT_TYPE: &str = "application/dash+xml";
pub const SMOOTH_CONTENT_TYPE: &str = "application/vnd.ms-sstr+xml";
pub const MP4_CONTENT_TYPE: &str = "video/mp4";

/// Errors raised while loading a stream manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("file {0:?} escapes the stream directory")]
    UnsafePath(String),
}

/// Manifest document as written on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamManifest {
    /// `null` disables the DASH manifest route.
    #[serde(default = "default_dash_manifest")]
    pub dash_manifest: Option<ManifestDocument>,

    /// `null` disables the Smooth manifest route.
    #[serde(default = "default_smooth_manifest")]
    pub smooth_manifest: Option<ManifestDocument>,

    #[serde(default)]
    pub media: Vec<MediaEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestDocument {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEntry {
    pub track_id: u32,
    pub media_segments: MediaSegments,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_segment: Option<ManifestDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSegments {
    pub file: String,
    #[serde(default)]
    pub urls: Vec<SegmentUrl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentUrl {
    /// Regular expression searched for in the sub-path.
    pub pattern: String,
    /// Names for the capture groups, in order.
    #[serde(default)]
    pub fields: Vec<String>,
}

fn default_dash_manifest() -> Option<ManifestDocument> {
    Some(ManifestDocument {
        file: "stream.mpd".to_string(),
        url: None,
    })
}

fn default_smooth_manifest() -> Option<ManifestDocument> {
    Some(ManifestDocument {
        file: "stream.ismc".to_string(),
        url: None,
    })
}

/// What a sub-path maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Serve a whole file.
    Document {
        path: PathBuf,
        content_type: &'static str,
    },
    /// Serve one movie fragment of a fragmented file.
    Fragment {
        path: PathBuf,
        track_id: u32,
        /// `None` when the pattern did not yield a usable `time` field.
        time: Option<u64>,
    },
}

struct CompiledPattern {
    regex: Regex,
    fields: Vec<String>,
}

struct CompiledMedia {
    track_id: u32,
    file: PathBuf,
    patterns: Vec<CompiledPattern>,
    init: Option<(Regex, PathBuf)>,
}

/// A manifest with its patterns compiled and its files resolved against the
/// manifest's directory.
pub struct LoadedManifest {
    dash: Option<(String, PathBuf)>,
    smooth: Option<(String, PathBuf)>,
    media: Vec<CompiledMedia>,
}

impl LoadedManifest {
    /// Read and compile the manifest at `path`.
    pub async fn load(path: &Path) -> Result<Self, ManifestError> {
        let data = tokio::fs::read_to_string(path).await?;
        let manifest: StreamManifest = serde_json::from_str(&data)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::compile(manifest, dir)
    }

    /// Compile a parsed manifest whose files live in `dir`.
    pub fn compile(manifest: StreamManifest, dir: &Path) -> Result<Self, ManifestError> {
        let document = |doc: Option<ManifestDocument>, default_url: &str| {
            doc.map(|d| -> Result<_, ManifestError> {
                let url = d.url.unwrap_or_else(|| default_url.to_string());
                Ok((url, join_under(dir, &d.file)?))
            })
            .transpose()
        };

        let dash = document(manifest.dash_manifest, "mpd")?;
        let smooth = document(manifest.smooth_manifest, "Manifest")?;

        let mut media = Vec::with_capacity(manifest.media.len());
        for entry in manifest.media {
            let patterns = entry
                .media_segments
                .urls
                .into_iter()
                .map(|u| {
                    Ok(CompiledPattern {
                        regex: compile_pattern(&u.pattern)?,
                        fields: u.fields,
                    })
                })
                .collect::<Result<Vec<_>, ManifestError>>()?;

            let init = match entry.init_segment {
                Some(init) => {
                    let pattern = init.url.as_deref().unwrap_or(&init.file);
                    Some((compile_pattern(pattern)?, join_under(dir, &init.file)?))
                }
                None => None,
            };

            media.push(CompiledMedia {
                track_id: entry.track_id,
                file: join_under(dir, &entry.media_segments.file)?,
                patterns,
                init,
            });
        }

        Ok(Self {
            dash,
            smooth,
            media,
        })
    }

    /// Map a sub-path to the file it names.
    ///
    /// The DASH and Smooth urls must match exactly. Media entries are then
    /// tried in order, segment patterns before the init segment.
    pub fn route(&self, subpath: &str) -> Option<Route> {
        if let Some((url, file)) = &self.dash {
            if subpath == url {
                return Some(Route::Document {
                    path: file.clone(),
                    content_type: DASH_CONTENT_TYPE,
                });
            }
        }

        if let Some((url, file)) = &self.smooth {
            if subpath == url {
                return Some(Route::Document {
                    path: file.clone(),
                    content_type: SMOOTH_CONTENT_TYPE,
                });
            }
        }

        for media in &self.media {
            for pattern in &media.patterns {
                if let Some(fields) = pattern.extract(subpath) {
                    let time = fields.get("time").and_then(|t| t.parse::<u64>().ok());
                    return Some(Route::Fragment {
                        path: media.file.clone(),
                        track_id: media.track_id,
                        time,
                    });
                }
            }

            if let Some((regex, file)) = &media.init {
                if regex.is_match(subpath) {
                    return Some(Route::Document {
                        path: file.clone(),
                        content_type: MP4_CONTENT_TYPE,
                    });
                }
            }
        }

        None
    }
}

impl CompiledPattern {
    /// Named captures when the pattern matches; empty if the match has fewer
    /// groups than there are field names.
    fn extract<'a>(&self, subpath: &'a str) -> Option<HashMap<&str, &'a str>> {
        let captures = self.regex.captures(subpath)?;
        let mut fields = HashMap::new();
        if captures.len() > self.fields.len() {
            for (i, name) in self.fields.iter().enumerate() {
                if let Some(m) = captures.get(i + 1) {
                    fields.insert(name.as_str(), m.as_str());
                }
            }
        }
        Some(fields)
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, ManifestError> {
    Regex::new(pattern).map_err(|source| ManifestError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Join a manifest-relative file name onto `dir`, refusing anything that
/// could leave it.
fn join_under(dir: &Path, file: &str) -> Result<PathBuf, ManifestError> {
    let relative = Path::new(file);
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe || file.is_empty() {
        return Err(ManifestError::UnsafePath(file.to_string()));
    }
    Ok(dir.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(json: &str) -> LoadedManifest {
        let manifest: StreamManifest = serde_json::from_str(json).unwrap();
        LoadedManifest::compile(manifest, Path::new("/streams/movie")).unwrap()
    }

    const MANIFEST: &str = r#"{
        "media": [
            {
                "trackId": 1,
                "mediaSegments": {
                    "file": "video.mp4",
                    "urls": [{ "pattern": "video/(\\d+)\\.m4s", "fields": ["time"] }]
                },
                "initSegment": { "file": "video_init.mp4", "url": "video/init" }
            },
            {
                "trackId": 2,
                "mediaSegments": {
                    "file": "audio.mp4",
                    "urls": [
                        { "pattern": "QualityLevels\\((\\d+)\\)/Fragments\\(audio=(\\d+)\\)", "fields": ["bitrate", "time"] }
                    ]
                },
                "initSegment": { "file": "audio_init.mp4" }
            }
        ]
    }"#;

    #[test]
    fn test_default_documents() {
        let manifest = compile(MANIFEST);
        assert_eq!(
            manifest.route("mpd"),
            Some(Route::Document {
                path: PathBuf::from("/streams/movie/stream.mpd"),
                content_type: DASH_CONTENT_TYPE,
            })
        );
        assert_eq!(
            manifest.route("Manifest"),
            Some(Route::Document {
                path: PathBuf::from("/streams/movie/stream.ismc"),
                content_type: SMOOTH_CONTENT_TYPE,
            })
        );
        assert_eq!(manifest.route("mpd/extra"), None);
    }

    #[test]
    fn test_null_disables_document() {
        let manifest = compile(r#"{ "dashManifest": null, "smoothManifest": { "file": "s.ismc", "url": "ss" } }"#);
        assert_eq!(manifest.route("mpd"), None);
        assert_eq!(manifest.route("Manifest"), None);
        assert!(matches!(manifest.route("ss"), Some(Route::Document { .. })));
    }

    #[test]
    fn test_segment_fields() {
        let manifest = compile(MANIFEST);
        assert_eq!(
            manifest.route("video/90000.m4s"),
            Some(Route::Fragment {
                path: PathBuf::from("/streams/movie/video.mp4"),
                track_id: 1,
                time: Some(90000),
            })
        );
        assert_eq!(
            manifest.route("QualityLevels(128000)/Fragments(audio=441000)"),
            Some(Route::Fragment {
                path: PathBuf::from("/streams/movie/audio.mp4"),
                track_id: 2,
                time: Some(441000),
            })
        );
    }

    #[test]
    fn test_init_segment_falls_back_to_file_pattern() {
        let manifest = compile(MANIFEST);
        assert_eq!(
            manifest.route("video/init"),
            Some(Route::Document {
                path: PathBuf::from("/streams/movie/video_init.mp4"),
                content_type: MP4_CONTENT_TYPE,
            })
        );
        assert!(matches!(
            manifest.route("audio_init.mp4"),
            Some(Route::Document { path, .. }) if path.ends_with("audio_init.mp4")
        ));
    }

    #[test]
    fn test_missing_time_field() {
        let manifest = compile(
            r#"{ "media": [{ "trackId": 3, "mediaSegments": { "file": "v.mp4",
                "urls": [{ "pattern": "seg-(\\w+)", "fields": ["time"] },
                         { "pattern": "chunk", "fields": ["time"] }] } }] }"#,
        );
        assert!(matches!(manifest.route("seg-abc"), Some(Route::Fragment { time: None, .. })));
        assert!(matches!(manifest.route("chunk"), Some(Route::Fragment { time: None, .. })));
        assert_eq!(manifest.route("other"), None);
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let manifest: StreamManifest = serde_json::from_str(
            r#"{ "media": [{ "trackId": 1, "mediaSegments": { "file": "v.mp4", "urls": [{ "pattern": "(" }] } }] }"#,
        )
        .unwrap();
        assert!(matches!(
            LoadedManifest::compile(manifest, Path::new("/x")),
            Err(ManifestError::Pattern { .. })
        ));
    }

    #[test]
    fn test_escaping_file_rejected() {
        for file in ["../secret.mp4", "/etc/passwd", ""] {
            let json = format!(r#"{{ "dashManifest": {{ "file": "{}" }} }}"#, file);
            let manifest: StreamManifest = serde_json::from_str(&json).unwrap();
            assert!(matches!(
                LoadedManifest::compile(manifest, Path::new("/x")),
                Err(ManifestError::UnsafePath(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.json");
        std::fs::write(&path, MANIFEST).unwrap();
        let manifest = LoadedManifest::load(&path).await.unwrap();
        assert!(matches!(
            manifest.route("mpd"),
            Some(Route::Document { path: p, .. }) if p == dir.path().join("stream.mpd")
        ));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(LoadedManifest::load(&path).await, Err(ManifestError::Json(_))));
    }
}
