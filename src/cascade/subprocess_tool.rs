use crate::cascade::{Provider, ProviderResult};
use crate::errors::{FlacVaultError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

const SUBPROCESS_TIMEOUT: Duration = Duration::from_secs(300);

/// Wraps an externally-installed command-line downloader (§4.3): invoked
/// with the track URL as its sole argument, then the output directory and a
/// known default location are scanned for the most recently modified `.flac`.
pub struct SubprocessToolProvider {
    binary: String,
    default_scan_dir: PathBuf,
}

impl SubprocessToolProvider {
    pub fn new(binary: impl Into<String>, default_scan_dir: PathBuf) -> Self {
        Self { binary: binary.into(), default_scan_dir }
    }

    fn newest_flac(dir: &Path) -> Option<PathBuf> {
        std::fs::read_dir(dir)
            .ok()?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("flac"))
            .max_by_key(|p| std::fs::metadata(p).and_then(|m| m.modified()).ok())
    }
}

impl Provider for SubprocessToolProvider {
    fn name(&self) -> &'static str {
        "subprocess-tool"
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary).arg("--version").output().await.map(|o| o.status.success()).unwrap_or(false)
    }

    fn supports_format(&self, format: &str) -> bool {
        format.eq_ignore_ascii_case("flac")
    }

    async fn download(&self, track_url: &str, out_dir: &Path, _format: &str) -> Result<ProviderResult> {
        std::fs::create_dir_all(out_dir)?;

        let args = vec![track_url.to_string()];
        crate::utils::logger::Logger::log_subprocess_call(&self.binary, &args);

        let status = timeout(SUBPROCESS_TIMEOUT, Command::new(&self.binary).args(&args).current_dir(out_dir).status())
            .await
            .map_err(|_| FlacVaultError::Timeout("subprocess-tool download".to_string()))?
            .map_err(FlacVaultError::Io)?;

        if !status.success() {
            return Err(FlacVaultError::NoAudioSource(format!("subprocess tool exited with {status}")));
        }

        let found = Self::newest_flac(out_dir).or_else(|| Self::newest_flac(&self.default_scan_dir));
        found
            .map(|file_path| ProviderResult { file_path, track_title: None, track_artist: None, quality_label: "lossless".to_string() })
            .ok_or_else(|| FlacVaultError::NoAudioSource("no .flac file produced".to_string()))
    }
}
