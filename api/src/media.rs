//! Media helpers: asset naming, MIME handling, and the ffprobe/ffmpeg steps
//! applied to uploaded videos.

use base64::{Engine, engine::general_purpose::URL_SAFE};
use rand::Rng;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

use crate::constants::ASSET_ID_BYTES;

/// Content types accepted for thumbnails
pub const THUMBNAIL_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Content type accepted for videos
pub const VIDEO_MEDIA_TYPE: &str = "video/mp4";

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("unparseable ffprobe output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no video stream found")]
    NoVideoStream,
    #[error("invalid video dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// Paths to the external media tools
#[derive(Debug, Clone)]
pub struct MediaTools {
    pub ffprobe: String,
    pub ffmpeg: String,
}

impl Default for MediaTools {
    fn default() -> Self {
        Self {
            ffprobe: "ffprobe".to_string(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

/// 32 random bytes, URL-safe base64
pub fn random_asset_id() -> String {
    let bytes: [u8; ASSET_ID_BYTES] = rand::rng().random();
    URL_SAFE.encode(bytes)
}

/// ".<subtype>" for a well-formed `type/subtype`, ".bin" otherwise
pub fn media_type_to_ext(media_type: &str) -> String {
    let parts: Vec<&str> = media_type.split('/').collect();
    if parts.len() != 2 {
        return ".bin".to_string();
    }
    format!(".{}", parts[1])
}

/// Fresh asset filename for the given content type
pub fn asset_path(media_type: &str) -> String {
    format!("{}{}", random_asset_id(), media_type_to_ext(media_type))
}

/// Strip parameters and normalise case: `"Image/PNG; q=1"` -> `"image/png"`
pub fn parse_media_type(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let (kind, subtype) = essence.split_once('/')?;
    if kind.is_empty() || subtype.is_empty() || subtype.contains('/') {
        return None;
    }
    Some(essence)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Landscape,
    Portrait,
    Other,
}

impl AspectRatio {
    /// Classify by the integer percentage `width * 100 / height`.
    pub fn from_dimensions(width: u32, height: u32) -> Result<Self, MediaError> {
        if width == 0 || height == 0 {
            return Err(MediaError::InvalidDimensions { width, height });
        }

        let ratio = u64::from(width) * 100 / u64::from(height);
        Ok(match ratio {
            175..=177 => AspectRatio::Landscape,
            55..=57 => AspectRatio::Portrait,
            _ => AspectRatio::Other,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Other => "other",
        }
    }

    /// Object key segment for videos of this shape
    pub fn key_prefix(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "landscape",
            AspectRatio::Portrait => "portrait",
            AspectRatio::Other => "other",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

/// Width and height of the first video stream in ffprobe's JSON output
fn video_dimensions(probe_json: &[u8]) -> Result<(u32, u32), MediaError> {
    let probe: ProbeOutput = serde_json::from_slice(probe_json)?;
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .map(|s| (s.width, s.height))
        .ok_or(MediaError::NoVideoStream)
}

/// Run ffprobe on `path` and classify the first video stream
pub async fn probe_aspect_ratio(tools: &MediaTools, path: &Path) -> Result<AspectRatio, MediaError> {
    let output = Command::new(&tools.ffprobe)
        .args(["-v", "error", "-print_format", "json", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| MediaError::Spawn {
            tool: tools.ffprobe.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(MediaError::Failed {
            tool: tools.ffprobe.clone(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let (width, height) = video_dimensions(&output.stdout)?;
    let ratio = AspectRatio::from_dimensions(width, height)?;
    tracing::debug!(width, height, ratio = ratio.as_str(), "probed video");
    Ok(ratio)
}

/// `<dir>/<stem>-processing<.ext>` next to the input
fn fast_start_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match input.extension() {
        Some(ext) => format!("{}-processing.{}", stem, ext.to_string_lossy()),
        None => format!("{}-processing", stem),
    };
    input.with_file_name(file_name)
}

/// Remux `input` with the moov atom up front; returns the new file's path
pub async fn process_for_fast_start(tools: &MediaTools, input: &Path) -> Result<PathBuf, MediaError> {
    let output_path = fast_start_output_path(input);

    let output = Command::new(&tools.ffmpeg)
        .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
        .arg("-i")
        .arg(input)
        .args(["-c", "copy", "-movflags", "faststart", "-f", "mp4"])
        .arg(&output_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| MediaError::Spawn {
            tool: tools.ffmpeg.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(MediaError::Failed {
            tool: tools.ffmpeg.clone(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output_path)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    /// ffprobe output for a 1080x1920 stream
    pub const PORTRAIT_PROBE: &str =
        r#"{"streams":[{"codec_type":"video","width":1080,"height":1920}]}"#;

    /// Write an executable shell script standing in for a media tool
    pub fn stub_tool(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }
}
