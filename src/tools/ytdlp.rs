use crate::errors::{FlacVaultError, Result};
use crate::model::{PlaylistEntry, PlaylistInfo, QualityTier, VideoMetadata};
use crate::tools::cookies::cookie_browser_arg;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const METADATA_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct YtDlpInfoRaw {
    id: String,
    title: Option<String>,
    artist: Option<String>,
    creator: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    album: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    description: Option<String>,
    upload_date: Option<String>,
    view_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct YtDlpPlaylistEntryRaw {
    id: String,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    url: Option<String>,
    playlist_title: Option<String>,
    playlist_uploader: Option<String>,
}

/// Wraps the `yt-dlp` subprocess, used both for metadata/playlist queries and
/// the actual video download. Mirrors the teacher's `YtDlpDownloader`: always
/// a vector of args, non-zero exit treated as failure, stderr captured.
pub struct YtDlpAdapter {
    binary: String,
}

impl YtDlpAdapter {
    pub fn new() -> Self {
        Self { binary: "yt-dlp".to_string() }
    }

    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    pub async fn fetch_video_metadata(&self, video_url: &str) -> Result<VideoMetadata> {
        let args = vec!["--dump-json".to_string(), "--no-download".to_string(), "--no-playlist".to_string(), video_url.to_string()];
        crate::utils::logger::Logger::log_subprocess_call(&self.binary, &args);

        let output = timeout(METADATA_TIMEOUT, Command::new(&self.binary).args(&args).output())
            .await
            .map_err(|_| FlacVaultError::Timeout("yt-dlp metadata fetch".to_string()))?
            .map_err(FlacVaultError::Io)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            crate::utils::logger::Logger::log_subprocess_failed(&self.binary, &stderr);
            return Err(FlacVaultError::MetadataUnavailable(stderr));
        }

        let raw: YtDlpInfoRaw = serde_json::from_slice(&output.stdout)?;
        Ok(normalise_metadata(raw))
    }

    pub async fn fetch_playlist_entries(&self, playlist_url: &str) -> Result<PlaylistInfo> {
        let args = vec![
            "--flat-playlist".to_string(),
            "-j".to_string(),
            "--no-warnings".to_string(),
            playlist_url.to_string(),
        ];
        crate::utils::logger::Logger::log_subprocess_call(&self.binary, &args);

        let output = Command::new(&self.binary).args(&args).output().await.map_err(FlacVaultError::Io)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(FlacVaultError::MetadataUnavailable(stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut entries = Vec::new();
        let mut title = None;
        let mut author = None;

        for (idx, line) in stdout.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let raw: YtDlpPlaylistEntryRaw = match serde_json::from_str(line) {
                Ok(r) => r,
                Err(_) => continue, // malformed entries are skipped
            };
            if title.is_none() {
                title = raw.playlist_title.clone();
            }
            if author.is_none() {
                author = raw.playlist_uploader.clone();
            }
            let artist = raw.uploader.or(raw.channel).unwrap_or_else(|| "Unknown".to_string());
            entries.push(PlaylistEntry {
                url: raw.url.unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", raw.id)),
                id: raw.id,
                title: strip_topic_suffix(&raw.title.unwrap_or_else(|| "Unknown".to_string())),
                artist: strip_topic_suffix(&artist),
                duration_secs: raw.duration.map(|d| d as u64),
                thumbnail_url: raw.thumbnail,
                position: (idx + 1) as u32,
            });
        }

        Ok(PlaylistInfo {
            title: title.unwrap_or_else(|| "Playlist".to_string()),
            author,
            entries,
        })
    }

    pub async fn download_video(
        &self,
        video_id: &str,
        quality: QualityTier,
        out_dir: &Path,
        cookie_browser: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let url = format!("https://www.youtube.com/watch?v={video_id}");
        let out_template = out_dir.join(format!("{video_id}.%(ext)s"));

        let mut args = vec![
            "-f".to_string(),
            quality.format_selector(),
            "--no-playlist".to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "-o".to_string(),
            out_template.to_string_lossy().to_string(),
        ];
        if let Some(browser) = cookie_browser {
            args.push("--cookies-from-browser".to_string());
            args.push(cookie_browser_arg(browser));
        }
        args.push(url);

        crate::utils::logger::Logger::log_subprocess_call(&self.binary, &args);

        let mut child = Command::new(&self.binary).args(&args).spawn().map_err(FlacVaultError::Io)?;

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(FlacVaultError::Cancelled);
            }
            status = child.wait() => status.map_err(FlacVaultError::Io)?,
        };

        if !status.success() {
            return Err(FlacVaultError::VideoUnavailable(format!("yt-dlp exited with {status}")));
        }

        let expected = out_dir.join(format!("{video_id}.mp4"));
        if expected.exists() {
            return Ok(expected);
        }
        find_newest_with_stem(out_dir, video_id).ok_or_else(|| FlacVaultError::VideoUnavailable("no output file produced".to_string()))
    }
}

impl Default for YtDlpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn normalise_metadata(raw: YtDlpInfoRaw) -> VideoMetadata {
    let channel = raw.channel.clone();
    let artist = raw
        .artist
        .or(raw.creator)
        .or(raw.uploader.clone())
        .or(channel.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    let artist = strip_topic_suffix(&artist);

    let mut title = raw.title.unwrap_or_else(|| "Unknown".to_string());
    let prefix = format!("{artist} - ");
    if title.starts_with(&prefix) && channel.as_deref() == Some(artist.as_str()) {
        title = title[prefix.len()..].to_string();
    }
    let title = strip_title_noise(&title);

    VideoMetadata {
        id: raw.id,
        title,
        artist,
        album: raw.album,
        duration_secs: raw.duration.map(|d| d as u64),
        thumbnail_url: raw.thumbnail,
        description: raw.description,
        channel: raw.channel,
        upload_date: raw.upload_date,
        view_count: raw.view_count,
    }
}

fn strip_topic_suffix(s: &str) -> String {
    s.strip_suffix(" - Topic").unwrap_or(s).to_string()
}

/// Strips common platform-added noise from a raw video title, e.g.
/// "(Official Video)", "[HD]" -- the display-title counterpart to the file
/// index's key normalisation in `index.rs`.
fn strip_title_noise(title: &str) -> String {
    static NOISE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let re = NOISE.get_or_init(|| {
        regex::Regex::new(r"(?i)\s*[\(\[](official\s*(video|audio|music video|lyric video)?|hd|4k|lyrics?)[\)\]]\s*").unwrap()
    });
    re.replace_all(title, " ").trim().to_string()
}

fn find_newest_with_stem(dir: &Path, stem: &str) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.file_stem().and_then(|s| s.to_str()) == Some(stem))
        .max_by_key(|p| std::fs::metadata(p).and_then(|m| m.modified()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_topic_suffix() {
        assert_eq!(strip_topic_suffix("Rick Astley - Topic"), "Rick Astley");
        assert_eq!(strip_topic_suffix("Rick Astley"), "Rick Astley");
    }

    #[test]
    fn normalise_strips_redundant_artist_prefix() {
        let raw = YtDlpInfoRaw {
            id: "dQw4w9WgXcQ".to_string(),
            title: Some("Rick Astley - Never Gonna Give You Up (Official Video)".to_string()),
            artist: None,
            creator: None,
            uploader: None,
            channel: Some("Rick Astley".to_string()),
            album: None,
            duration: Some(213.0),
            thumbnail: None,
            description: None,
            upload_date: None,
            view_count: None,
        };
        let meta = normalise_metadata(raw);
        assert_eq!(meta.artist, "Rick Astley");
        assert_eq!(meta.title, "Never Gonna Give You Up");
    }
}
