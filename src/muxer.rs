use crate::errors::{FlacVaultError, Result};
use crate::model::{MuxContainer, MuxPlan};
use std::time::Instant;
use tokio::process::Command;

pub struct MuxOutcome {
    pub duration_secs: Option<f64>,
    pub size: u64,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub elapsed: std::time::Duration,
    pub has_cover: bool,
    pub has_metadata: bool,
}

/// Produces the final Matroska (video+audio+cover+metadata) or a standalone
/// FLAC when no video is available (§4.5). Single ffmpeg-subprocess code
/// path for both modes (§9 Open Question resolution).
pub struct Muxer {
    binary: String,
}

impl Muxer {
    pub fn new() -> Self {
        Self { binary: "ffmpeg".to_string() }
    }

    pub async fn mux(&self, plan: &MuxPlan) -> Result<MuxOutcome> {
        if !plan.audio_path.exists() {
            return Err(FlacVaultError::MissingInput(format!("audio input missing: {}", plan.audio_path.display())));
        }
        if let Some(video) = &plan.video_path {
            if !video.exists() {
                return Err(FlacVaultError::MissingInput(format!("video input missing: {}", video.display())));
            }
        }

        let start = Instant::now();
        let args = self.build_args(plan);
        crate::utils::logger::Logger::log_subprocess_call(&self.binary, &args);

        let output = Command::new(&self.binary).args(&args).output().await.map_err(FlacVaultError::Io)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(FlacVaultError::MuxFailed(stderr));
        }

        let size = std::fs::metadata(&plan.output_path).map(|m| m.len()).unwrap_or(0);

        Ok(MuxOutcome {
            duration_secs: None,
            size,
            video_codec: plan.video_path.as_ref().map(|_| "copy".to_string()),
            audio_codec: Some(if plan.container == MuxContainer::Flac { "flac".to_string() } else { "copy".to_string() }),
            elapsed: start.elapsed(),
            has_cover: plan.cover_path.is_some(),
            has_metadata: !plan.metadata.is_empty(),
        })
    }

    fn build_args(&self, plan: &MuxPlan) -> Vec<String> {
        let mut args = vec!["-y".to_string()];

        match (&plan.video_path, plan.container) {
            (Some(video), MuxContainer::Matroska) => {
                args.push("-i".into());
                args.push(video.to_string_lossy().to_string());
                args.push("-i".into());
                args.push(plan.audio_path.to_string_lossy().to_string());
                if let Some(cover) = &plan.cover_path {
                    args.push("-i".into());
                    args.push(cover.to_string_lossy().to_string());
                }
                args.push("-map".into());
                args.push("0:v:0".into());
                args.push("-map".into());
                args.push("1:a:0".into());
                if plan.cover_path.is_some() {
                    args.push("-map".into());
                    args.push("2:0".into());
                }
                args.push("-c:v".into());
                args.push("copy".into());
                args.push("-c:a".into());
                args.push("copy".into());
                if plan.cover_path.is_some() {
                    args.push("-c:v:1".into());
                    args.push("mjpeg".into());
                    args.push("-disposition:v:1".into());
                    args.push("attached_pic".into());
                }
                for (k, v) in &plan.metadata {
                    args.push("-metadata".into());
                    args.push(format!("{k}={v}"));
                }
                args.push("-f".into());
                args.push("matroska".into());
            }
            _ => {
                // Audio-only FLAC mode.
                args.push("-i".into());
                args.push(plan.audio_path.to_string_lossy().to_string());
                if let Some(cover) = &plan.cover_path {
                    args.push("-i".into());
                    args.push(cover.to_string_lossy().to_string());
                }
                args.push("-map".into());
                args.push("0:a".into());
                if plan.cover_path.is_some() {
                    args.push("-map".into());
                    args.push("1:0".into());
                }
                args.push("-c:a".into());
                if is_already_flac(&plan.audio_path) {
                    args.push("copy".into());
                } else {
                    args.push("flac".into());
                    args.push("-compression_level".into());
                    args.push("8".into());
                }
                if plan.cover_path.is_some() {
                    args.push("-c:v".into());
                    args.push("mjpeg".into());
                    args.push("-disposition:v".into());
                    args.push("attached_pic".into());
                }
                for (k, v) in &plan.metadata {
                    args.push("-metadata".into());
                    args.push(format!("{}={v}", k.to_uppercase()));
                }
            }
        }

        args.push(plan.output_path.to_string_lossy().to_string());
        args
    }
}

impl Default for Muxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Muxer {
    /// Re-muxes in place (stream copy, no re-encode) to add extra metadata
    /// keys after the main mux — used to embed lyrics (§4.8) once fetched,
    /// since the fetch happens after the initial mux in the pipeline order.
    pub async fn patch_metadata(&self, target: &std::path::Path, extra: &std::collections::HashMap<String, String>) -> Result<()> {
        if extra.is_empty() {
            return Ok(());
        }
        let tmp = target.with_extension(format!("{}.tmp", target.extension().and_then(|e| e.to_str()).unwrap_or("out")));

        let mut args = vec!["-y".to_string(), "-i".to_string(), target.to_string_lossy().to_string(), "-map".to_string(), "0".to_string(), "-c".to_string(), "copy".to_string()];
        for (k, v) in extra {
            args.push("-metadata".to_string());
            args.push(format!("{k}={v}"));
        }
        args.push(tmp.to_string_lossy().to_string());

        let output = Command::new(&self.binary).args(&args).output().await.map_err(FlacVaultError::Io)?;
        if !output.status.success() {
            return Err(FlacVaultError::MuxFailed(String::from_utf8_lossy(&output.stderr).to_string()));
        }
        std::fs::rename(&tmp, target)?;
        Ok(())
    }

    /// Muxes an SRT subtitle track into an existing Matroska file alongside
    /// metadata patching, used for synced-lyrics embedding (§4.8).
    pub async fn embed_subtitle(&self, target: &std::path::Path, srt_path: &std::path::Path, extra: &std::collections::HashMap<String, String>) -> Result<()> {
        let tmp = target.with_extension("subtitled.tmp.mkv");
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            target.to_string_lossy().to_string(),
            "-i".to_string(),
            srt_path.to_string_lossy().to_string(),
            "-map".to_string(),
            "0".to_string(),
            "-map".to_string(),
            "1:0".to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-c:s".to_string(),
            "srt".to_string(),
        ];
        for (k, v) in extra {
            args.push("-metadata".to_string());
            args.push(format!("{k}={v}"));
        }
        args.push(tmp.to_string_lossy().to_string());

        let output = Command::new(&self.binary).args(&args).output().await.map_err(FlacVaultError::Io)?;
        if !output.status.success() {
            return Err(FlacVaultError::MuxFailed(String::from_utf8_lossy(&output.stderr).to_string()));
        }
        std::fs::rename(&tmp, target)?;
        Ok(())
    }
}

fn is_already_flac(path: &std::path::Path) -> bool {
    path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("flac")).unwrap_or(false)
}

pub fn standard_metadata(title: &str, artist: &str, album: Option<&str>, year: Option<&str>, isrc: Option<&str>) -> std::collections::HashMap<String, String> {
    let mut map = std::collections::HashMap::new();
    map.insert("title".to_string(), title.to_string());
    map.insert("artist".to_string(), artist.to_string());
    if let Some(album) = album {
        map.insert("album".to_string(), album.to_string());
    }
    if let Some(year) = year {
        map.insert("date".to_string(), year.to_string());
    }
    if let Some(isrc) = isrc {
        map.insert("ISRC".to_string(), isrc.to_string());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn audio_only_mode_skips_video_map() {
        let muxer = Muxer::new();
        let plan = MuxPlan {
            video_path: None,
            audio_path: PathBuf::from("audio.flac"),
            output_path: PathBuf::from("out.flac"),
            metadata: standard_metadata("Title", "Artist", None, None, None),
            cover_path: None,
            container: MuxContainer::Flac,
        };
        let args = muxer.build_args(&plan);
        assert!(args.contains(&"copy".to_string()));
        assert!(!args.iter().any(|a| a == "0:v:0"));
    }

    #[test]
    fn video_mode_maps_three_streams_with_cover() {
        let muxer = Muxer::new();
        let plan = MuxPlan {
            video_path: Some(PathBuf::from("v.mp4")),
            audio_path: PathBuf::from("a.flac"),
            output_path: PathBuf::from("out.mkv"),
            metadata: standard_metadata("Title", "Artist", Some("Album"), Some("2024"), Some("US1234567890")),
            cover_path: Some(PathBuf::from("cover.jpg")),
            container: MuxContainer::Matroska,
        };
        let args = muxer.build_args(&plan);
        assert!(args.contains(&"attached_pic".to_string()));
        assert!(args.contains(&"matroska".to_string()));
    }
}
