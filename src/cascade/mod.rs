pub mod generic_proxy;
pub mod subprocess_tool;
pub mod tidal;

use crate::errors::{FlacVaultError, Result};
use crate::model::{AudioCandidate, QualityDowngrade, TrackInfo, VideoMetadata};
use std::path::{Path, PathBuf};

pub use generic_proxy::GenericProxyProvider;
pub use subprocess_tool::SubprocessToolProvider;
pub use tidal::TidalProvider;

/// Rank table for quality-downgrade detection (§4.3).
pub fn quality_rank(label: &str) -> u8 {
    match label.to_lowercase().as_str() {
        "hi_res" | "hires" | "24bit" | "highest" => 3,
        "lossless" | "flac" | "16bit" => 2,
        "high" | "lossy" | "mp3" => 1,
        _ => 0,
    }
}

pub fn detect_downgrade(requested: &str, actual: &str) -> Option<QualityDowngrade> {
    let requested_rank = quality_rank(requested);
    let actual_rank = quality_rank(actual);
    if actual_rank < requested_rank {
        Some(QualityDowngrade { requested_rank, actual_rank })
    } else {
        None
    }
}

/// Tagged capability set implemented by each cascade tier (§9 design note):
/// a stable trait, no dynamic reflection. Providers are held as concrete
/// fields on `Cascade` rather than `dyn Provider`, so the methods stay plain
/// `async fn` without requiring a boxing macro.
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn is_available(&self) -> bool;
    fn supports_format(&self, format: &str) -> bool;
    async fn download(&self, track_url: &str, out_dir: &Path, format: &str) -> Result<ProviderResult>;
}

pub struct ProviderResult {
    pub file_path: PathBuf,
    pub track_title: Option<String>,
    pub track_artist: Option<String>,
    pub quality_label: String,
}

pub struct AudioOutcome {
    pub file_path: PathBuf,
    pub platform_label: String,
    pub quality_downgrade: Option<QualityDowngrade>,
}

/// Runs the fixed-ordered cascade of §4.3 for a single job.
pub struct Cascade {
    pub tidal: TidalProvider,
    pub generic_proxy: GenericProxyProvider,
    pub subprocess_tool: SubprocessToolProvider,
    pub platform_preference: Vec<String>,
}

impl Cascade {
    pub fn new(tidal: TidalProvider, generic_proxy: GenericProxyProvider, subprocess_tool: SubprocessToolProvider, platform_preference: Vec<String>) -> Self {
        Self { tidal, generic_proxy, subprocess_tool, platform_preference }
    }

    pub async fn run(&self, track: &TrackInfo, requested_format: &str, out_dir: &Path) -> Result<AudioOutcome> {
        for platform in &self.platform_preference {
            let Some(track_url) = track.platform_urls.get(platform) else {
                continue;
            };
            if track_url.is_empty() {
                continue;
            }

            if platform == "tidal" && self.tidal.is_available().await {
                crate::utils::logger::Logger::log_provider_attempt(self.tidal.name(), platform);
                match self.tidal.download(track_url, out_dir, requested_format).await {
                    Ok(result) => return Ok(self.finish(result, "tidal", requested_format)),
                    Err(e) => crate::utils::logger::Logger::log_provider_failed(self.tidal.name(), &e.to_string()),
                }
            }

            crate::utils::logger::Logger::log_provider_attempt(self.generic_proxy.name(), platform);
            match self.generic_proxy.download(track_url, out_dir, requested_format).await {
                Ok(result) => return Ok(self.finish(result, "generic-proxy", requested_format)),
                Err(e) => crate::utils::logger::Logger::log_provider_failed(self.generic_proxy.name(), &e.to_string()),
            }

            if self.subprocess_tool.is_available().await {
                crate::utils::logger::Logger::log_provider_attempt(self.subprocess_tool.name(), platform);
                match self.subprocess_tool.download(track_url, out_dir, requested_format).await {
                    Ok(result) => return Ok(self.finish(result, "subprocess-tool", requested_format)),
                    Err(e) => crate::utils::logger::Logger::log_provider_failed(self.subprocess_tool.name(), &e.to_string()),
                }
            }
        }

        // Every platform failed: fall back to a direct-tidal metadata search.
        if self.tidal.is_available().await {
            let query = format!("{} {}", track.artist, track.title);
            match self.tidal.search_and_download(&query, out_dir, requested_format).await {
                Ok(result) => return Ok(self.finish(result, "tidal-search", requested_format)),
                Err(e) => crate::utils::logger::Logger::log_provider_failed(self.tidal.name(), &e.to_string()),
            }
        }

        Err(FlacVaultError::NoAudioSource("every cascade tier failed".to_string()))
    }

    fn finish(&self, result: ProviderResult, platform_label: &str, requested_format: &str) -> AudioOutcome {
        crate::utils::logger::Logger::log_provider_succeeded(platform_label, &result.quality_label);
        AudioOutcome {
            file_path: result.file_path,
            platform_label: platform_label.to_string(),
            quality_downgrade: detect_downgrade(requested_format, &result.quality_label),
        }
    }

    /// Extracts the video's own audio track when every cascade tier and the
    /// tidal-search fallback failed but the video download succeeded (§4.3 step 3).
    pub async fn extract_from_video(&self, video_path: &Path, out_dir: &Path, _video_meta: &VideoMetadata) -> Result<AudioOutcome> {
        let output = out_dir.join("extracted_audio.m4a");
        let status = tokio::process::Command::new("ffmpeg")
            .args([
                "-y",
                "-i",
                video_path.to_str().unwrap_or_default(),
                "-map",
                "0:a:0",
                "-c:a",
                "copy",
                output.to_str().unwrap_or_default(),
            ])
            .status()
            .await
            .map_err(FlacVaultError::Io)?;

        if !status.success() {
            return Err(FlacVaultError::NoAudioSource("could not extract audio from video".to_string()));
        }

        Ok(AudioOutcome { file_path: output, platform_label: "extracted".to_string(), quality_downgrade: None })
    }
}

pub fn candidate_from_track(info: &TrackInfo, platform: &str, url: &str, priority_rank: u8) -> AudioCandidate {
    AudioCandidate {
        platform: platform.to_string(),
        track_url: url.to_string(),
        title: info.title.clone(),
        artist: info.artist.clone(),
        album: None,
        isrc: info.isrc.clone(),
        duration_secs: None,
        quality_label: "lossless".to_string(),
        priority_rank,
    }
}
