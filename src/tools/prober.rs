use crate::errors::{FlacVaultError, Result};
use crate::model::{MediaInfo, MediaStreamInfo};
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;

/// Deserialises `ffprobe -print_format json -show_format -show_streams`
/// output. Field shape grounded on common ffprobe JSON adapters in the
/// ecosystem; trimmed to the fields the muxer/pipeline actually need.
#[derive(Debug, Deserialize)]
struct FFprobeOutput {
    #[serde(default)]
    streams: Vec<FFprobeStream>,
    format: Option<FFprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FFprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    r_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FFprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    tags: std::collections::HashMap<String, String>,
}

/// Embedded container tags relevant to the file index (§4.6), read
/// case-insensitively since vorbis-comment keys are conventionally uppercase.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

fn tag_ci<'a>(tags: &'a std::collections::HashMap<String, String>, key: &str) -> Option<&'a String> {
    tags.get(key).or_else(|| tags.get(&key.to_uppercase())).or_else(|| tags.get(&key.to_lowercase()))
}

impl FFprobeStream {
    fn frame_rate(&self) -> Option<f64> {
        let raw = self.r_frame_rate.as_ref()?;
        let (num, den) = raw.split_once('/')?;
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den == 0.0 {
            None
        } else {
            Some(num / den)
        }
    }
}

pub struct Prober {
    binary: String,
}

impl Prober {
    pub fn new() -> Self {
        Self { binary: "ffprobe".to_string() }
    }

    pub async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let args = vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            path.to_string_lossy().to_string(),
        ];
        crate::utils::logger::Logger::log_subprocess_call(&self.binary, &args);

        let output = Command::new(&self.binary).args(&args).output().await.map_err(FlacVaultError::Io)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(FlacVaultError::Subprocess(format!("ffprobe failed: {stderr}")));
        }

        let parsed: FFprobeOutput = serde_json::from_slice(&output.stdout)?;
        Ok(to_media_info(parsed))
    }

    /// Probes only the first audio stream (`-select_streams a:0`), used by the
    /// cascade when it only needs to confirm codec/duration of a candidate.
    pub async fn probe_audio(&self, path: &Path) -> Result<MediaInfo> {
        let args = vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            "-show_streams".to_string(),
            "-select_streams".to_string(),
            "a:0".to_string(),
            path.to_string_lossy().to_string(),
        ];
        let output = Command::new(&self.binary).args(&args).output().await.map_err(FlacVaultError::Io)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(FlacVaultError::Subprocess(format!("ffprobe failed: {stderr}")));
        }
        let parsed: FFprobeOutput = serde_json::from_slice(&output.stdout)?;
        Ok(to_media_info(parsed))
    }

    /// Reads embedded title/artist/album tags, used by the file index scan
    /// before it falls back to filename parsing.
    pub async fn probe_tags(&self, path: &Path) -> Result<EmbeddedTags> {
        let args = vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            path.to_string_lossy().to_string(),
        ];
        let output = Command::new(&self.binary).args(&args).output().await.map_err(FlacVaultError::Io)?;
        if !output.status.success() {
            return Ok(EmbeddedTags::default());
        }
        let parsed: FFprobeOutput = serde_json::from_slice(&output.stdout).unwrap_or(FFprobeOutput { streams: Vec::new(), format: None });
        let tags = parsed.format.map(|f| f.tags).unwrap_or_default();
        Ok(EmbeddedTags {
            title: tag_ci(&tags, "title").cloned(),
            artist: tag_ci(&tags, "artist").cloned(),
            album: tag_ci(&tags, "album").cloned(),
        })
    }
}

impl Default for Prober {
    fn default() -> Self {
        Self::new()
    }
}

fn to_media_info(raw: FFprobeOutput) -> MediaInfo {
    let video = raw.streams.iter().find(|s| s.codec_type == "video").map(|s| MediaStreamInfo {
        codec: s.codec_name.clone(),
        width: s.width,
        height: s.height,
        frame_rate: s.frame_rate(),
        sample_rate: None,
        channels: None,
    });
    let audio = raw.streams.iter().find(|s| s.codec_type == "audio").map(|s| MediaStreamInfo {
        codec: s.codec_name.clone(),
        width: None,
        height: None,
        frame_rate: None,
        sample_rate: s.sample_rate.as_ref().and_then(|s| s.parse().ok()),
        channels: s.channels,
    });

    MediaInfo {
        duration_secs: raw.format.as_ref().and_then(|f| f.duration.as_ref()).and_then(|d| d.parse().ok()),
        bitrate: raw.format.as_ref().and_then(|f| f.bit_rate.as_ref()).and_then(|b| b.parse().ok()),
        video,
        audio,
    }
}
