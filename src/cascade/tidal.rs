use crate::cascade::{Provider, ProviderResult};
use crate::errors::{FlacVaultError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Vec<SearchTrack>,
}

#[derive(Debug, Deserialize)]
struct SearchTrack {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct TrackManifestEnvelope {
    manifest: String,
}

#[derive(Debug, Deserialize)]
struct TrackManifest {
    urls: Vec<String>,
}

/// Direct-tidal provider (§4.3): search -> info -> track endpoints; the track
/// endpoint returns a base64-encoded JSON manifest carrying one or more
/// direct FLAC URLs, the first of which is used.
pub struct TidalProvider {
    client: Client,
    base_url: String,
}

impl TidalProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build().unwrap_or_else(|_| Client::new());
        Self { client, base_url: base_url.into() }
    }

    /// Accepts `tidal.com/(browse/)?track/ID`, `listen.tidal.com/track/ID`, `tidal:track:ID`.
    pub fn extract_track_id(url: &str) -> Option<String> {
        if let Some(rest) = url.strip_prefix("tidal:track:") {
            return Some(rest.to_string());
        }
        let marker = "track/";
        url.find(marker).map(|idx| {
            let rest = &url[idx + marker.len()..];
            rest.split(|c: char| !c.is_ascii_digit()).next().unwrap_or("").to_string()
        }).filter(|s| !s.is_empty())
    }

    async fn download_by_id(&self, track_id: &str, out_dir: &Path, format: &str) -> Result<ProviderResult> {
        let manifest_url = format!("{}/track/{}/manifest", self.base_url, track_id);
        let response = self.client.get(&manifest_url).send().await?;
        if !response.status().is_success() {
            return Err(FlacVaultError::NoAudioSource(format!("tidal manifest request failed: {}", response.status())));
        }
        let envelope: TrackManifestEnvelope = response.json().await?;
        let decoded = STANDARD.decode(envelope.manifest.as_bytes()).map_err(|e| FlacVaultError::Other(e.to_string()))?;
        let manifest: TrackManifest = serde_json::from_slice(&decoded)?;
        let flac_url = manifest.urls.first().ok_or_else(|| FlacVaultError::NoAudioSource("manifest carried no URLs".to_string()))?;

        let out_path = out_dir.join(format!("{track_id}.{format}"));
        let bytes = self.client.get(flac_url).send().await?.bytes().await?;
        std::fs::create_dir_all(out_dir)?;
        std::fs::write(&out_path, &bytes)?;

        Ok(ProviderResult { file_path: out_path, track_title: None, track_artist: None, quality_label: "lossless".to_string() })
    }

    pub async fn search_and_download(&self, query: &str, out_dir: &Path, format: &str) -> Result<ProviderResult> {
        let search_url = format!("{}/search?q={}", self.base_url, urlencoding::encode(query));
        let response = self.client.get(&search_url).send().await?;
        if !response.status().is_success() {
            return Err(FlacVaultError::NoAudioSource(format!("tidal search failed: {}", response.status())));
        }
        let search: SearchResponse = response.json().await?;
        let track = search.tracks.first().ok_or_else(|| FlacVaultError::NoAudioSource("no tidal search results".to_string()))?;
        self.download_by_id(&track.id.to_string(), out_dir, format).await
    }
}

impl Provider for TidalProvider {
    fn name(&self) -> &'static str {
        "tidal-direct"
    }

    async fn is_available(&self) -> bool {
        self.client.get(format!("{}/health", self.base_url)).send().await.map(|r| r.status().is_success()).unwrap_or(false)
    }

    fn supports_format(&self, format: &str) -> bool {
        format.eq_ignore_ascii_case("flac")
    }

    async fn download(&self, track_url: &str, out_dir: &Path, format: &str) -> Result<ProviderResult> {
        let track_id = Self::extract_track_id(track_url)
            .ok_or_else(|| FlacVaultError::NoAudioSource(format!("unrecognised tidal URL: {track_url}")))?;
        self.download_by_id(&track_id, out_dir, format).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_track_id_from_browse_url() {
        assert_eq!(TidalProvider::extract_track_id("https://tidal.com/browse/track/123456").unwrap(), "123456");
    }

    #[test]
    fn extracts_track_id_from_listen_url() {
        assert_eq!(TidalProvider::extract_track_id("https://listen.tidal.com/track/987654").unwrap(), "987654");
    }

    #[test]
    fn extracts_track_id_from_uri_form() {
        assert_eq!(TidalProvider::extract_track_id("tidal:track:42").unwrap(), "42");
    }
}
