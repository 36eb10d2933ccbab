use crate::errors::{FlacVaultError, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::warn;

const NOISE_FLOOR_DB: &str = "-50dB";
const MIN_SILENCE_DURATION: &str = "0.05";

#[derive(Debug, Clone, Copy)]
struct Silence {
    start: f64,
    end: f64,
}

/// Detects leading silence in sourced audio and trims it to match the video
/// track (§4.4). Typical music-service FLAC masters carry 100-400ms of
/// digital silence that YouTube audio does not.
pub struct Aligner {
    binary: String,
}

impl Aligner {
    pub fn new() -> Self {
        Self { binary: "ffmpeg".to_string() }
    }

    /// Returns the (possibly unchanged) audio path. Detection/trim failures
    /// are logged and the original audio is returned untouched.
    pub async fn align(&self, audio_path: &Path, out_dir: &Path) -> PathBuf {
        match self.try_align(audio_path, out_dir).await {
            Ok(trimmed) => trimmed,
            Err(e) => {
                warn!("A/V align failed, proceeding untrimmed: {e}");
                audio_path.to_path_buf()
            }
        }
    }

    async fn try_align(&self, audio_path: &Path, out_dir: &Path) -> Result<PathBuf> {
        let silence = self.detect_leading_silence(audio_path).await?;

        let Some(silence) = silence else {
            return Ok(audio_path.to_path_buf());
        };

        if !(silence.start < 0.01 && silence.end > 0.1) {
            return Ok(audio_path.to_path_buf());
        }

        let output = out_dir.join("aligned.flac");
        let filter = format!("atrim=start={:.6},asetpts=PTS-STARTPTS", silence.end);
        let status = Command::new(&self.binary)
            .args([
                "-y",
                "-i",
                audio_path.to_str().unwrap_or_default(),
                "-af",
                &filter,
                "-c:a",
                "flac",
                "-compression_level",
                "5",
                output.to_str().unwrap_or_default(),
            ])
            .status()
            .await
            .map_err(FlacVaultError::Io)?;

        if !status.success() {
            return Err(FlacVaultError::Subprocess("ffmpeg trim failed".to_string()));
        }

        Ok(output)
    }

    async fn detect_leading_silence(&self, audio_path: &Path) -> Result<Option<Silence>> {
        let filter = format!("silencedetect=noise={NOISE_FLOOR_DB}:d={MIN_SILENCE_DURATION}");
        let output = Command::new(&self.binary)
            .args(["-i", audio_path.to_str().unwrap_or_default(), "-af", &filter, "-f", "null", "-"])
            .output()
            .await
            .map_err(FlacVaultError::Io)?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(parse_first_silence(&stderr))
    }
}

impl Default for Aligner {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_first_silence(stderr: &str) -> Option<Silence> {
    let start = stderr
        .lines()
        .find_map(|l| l.split("silence_start:").nth(1))
        .and_then(|rest| rest.trim().split_whitespace().next())
        .and_then(|v| v.parse::<f64>().ok())?;

    let end = stderr
        .lines()
        .find_map(|l| l.split("silence_end:").nth(1))
        .and_then(|rest| rest.trim().split_whitespace().next())
        .and_then(|v| v.parse::<f64>().ok())?;

    Some(Silence { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_silencedetect_stderr() {
        let stderr = "[silencedetect @ 0x0] silence_start: 0\n[silencedetect @ 0x0] silence_end: 0.234 | silence_duration: 0.234\n";
        let silence = parse_first_silence(stderr).unwrap();
        assert_eq!(silence.start, 0.0);
        assert!((silence.end - 0.234).abs() < 1e-6);
    }

    #[test]
    fn no_silence_returns_none() {
        assert!(parse_first_silence("no markers here").is_none());
    }
}
