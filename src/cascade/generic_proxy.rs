use crate::cascade::{Provider, ProviderResult};
use crate::errors::{FlacVaultError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Deserialize)]
struct LoadResponse {
    formats: Vec<LoadFormat>,
}

#[derive(Debug, Deserialize)]
struct LoadFormat {
    format: String,
    url: String,
}

/// Multi-platform web-API proxy provider (§4.3): posts the track URL to a
/// "load" endpoint on each of several candidate hosts in order, taking the
/// first response in the 2xx/3xx/4xx range (5xx means try the next host).
pub struct GenericProxyProvider {
    client: Client,
    hosts: Vec<String>,
}

impl GenericProxyProvider {
    pub fn new(hosts: Vec<String>) -> Self {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build().unwrap_or_else(|_| Client::new());
        Self { client, hosts }
    }

    fn pick_format<'a>(formats: &'a [LoadFormat], requested: &str) -> Option<&'a LoadFormat> {
        if let Some(exact) = formats.iter().find(|f| f.format.eq_ignore_ascii_case(requested)) {
            return Some(exact);
        }
        for fallback in ["flac", "wav", "mp3"] {
            if let Some(found) = formats.iter().find(|f| f.format.eq_ignore_ascii_case(fallback)) {
                return Some(found);
            }
        }
        None
    }
}

impl Provider for GenericProxyProvider {
    fn name(&self) -> &'static str {
        "generic-proxy"
    }

    async fn is_available(&self) -> bool {
        !self.hosts.is_empty()
    }

    fn supports_format(&self, _format: &str) -> bool {
        true
    }

    async fn download(&self, track_url: &str, out_dir: &Path, requested_format: &str) -> Result<ProviderResult> {
        let mut last_error = FlacVaultError::NoAudioSource("no generic-proxy hosts configured".to_string());

        for host in &self.hosts {
            let load_url = format!("{host}/api/load");
            let response = match self
                .client
                .post(&load_url)
                .header("User-Agent", DESKTOP_USER_AGENT)
                .header("Origin", host.as_str())
                .header("Referer", host.as_str())
                .json(&serde_json::json!({ "url": track_url }))
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = FlacVaultError::NoAudioSource(e.to_string());
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() {
                continue; // 5xx => try next host
            }
            if !(status.is_success() || status.is_redirection() || status.is_client_error()) {
                continue;
            }

            let body: LoadResponse = match response.json().await {
                Ok(b) => b,
                Err(e) => {
                    last_error = FlacVaultError::NoAudioSource(e.to_string());
                    continue;
                }
            };

            let Some(chosen) = Self::pick_format(&body.formats, requested_format) else {
                last_error = FlacVaultError::NoAudioSource("no acceptable format returned".to_string());
                continue;
            };

            let bytes = match self.client.get(&chosen.url).send().await {
                Ok(r) => match r.bytes().await {
                    Ok(b) => b,
                    Err(e) => {
                        last_error = FlacVaultError::NoAudioSource(e.to_string());
                        continue;
                    }
                },
                Err(e) => {
                    last_error = FlacVaultError::NoAudioSource(e.to_string());
                    continue;
                }
            };

            std::fs::create_dir_all(out_dir)?;
            let out_path = out_dir.join(format!("proxy_track.{}", chosen.format));
            std::fs::write(&out_path, &bytes)?;

            return Ok(ProviderResult {
                file_path: out_path,
                track_title: None,
                track_artist: None,
                quality_label: chosen.format.clone(),
            });
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_exact_format_first() {
        let formats = vec![
            LoadFormat { format: "mp3".to_string(), url: "http://a/1".to_string() },
            LoadFormat { format: "flac".to_string(), url: "http://a/2".to_string() },
        ];
        let picked = GenericProxyProvider::pick_format(&formats, "flac").unwrap();
        assert_eq!(picked.format, "flac");
    }

    #[test]
    fn falls_back_to_wav_then_mp3() {
        let formats = vec![LoadFormat { format: "mp3".to_string(), url: "http://a/1".to_string() }];
        let picked = GenericProxyProvider::pick_format(&formats, "flac").unwrap();
        assert_eq!(picked.format, "mp3");
    }
}
