use crate::errors::{FlacVaultError, Result};
use crate::model::{TrackInfo, TrackKind};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const MIN_INTERVAL: Duration = Duration::from_secs(7);
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Process-wide 7-second minimum-interval gate (§4.2, §9 design note): a
/// single owned `Mutex<Instant>`, not a per-API table, since there is exactly
/// one upstream behind this client.
#[derive(Clone)]
pub struct RateGate {
    last_call: Arc<Mutex<Option<Instant>>>,
}

impl RateGate {
    pub fn new() -> Self {
        Self { last_call: Arc::new(Mutex::new(None)) }
    }

    async fn wait_turn(&self) {
        let mut guard = self.last_call.lock().await;
        if let Some(last) = *guard {
            let elapsed = last.elapsed();
            if elapsed < MIN_INTERVAL {
                let remaining = MIN_INTERVAL - elapsed;
                crate::utils::logger::Logger::log_rate_limit_wait(remaining.as_secs_f64());
                tokio::time::sleep(remaining).await;
            }
        }
        *guard = Some(Instant::now());
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct ResolverResponse {
    title: String,
    #[serde(default)]
    artist: String,
    #[serde(rename = "thumbnailUrl")]
    thumbnail_url: Option<String>,
    #[serde(rename = "type", default)]
    kind: String,
    isrc: Option<String>,
    #[serde(default)]
    links: HashMap<String, String>,
}

/// Calls the cross-platform music link resolver (C2). Extracts per-platform
/// track URLs and ISRC, gated by the process-wide 7-second rate limit.
pub struct LinkResolverClient {
    client: Client,
    base_url: String,
    gate: RateGate,
}

impl LinkResolverClient {
    pub fn new(base_url: impl Into<String>, gate: RateGate) -> Self {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build().unwrap_or_else(|_| Client::new());
        Self { client, base_url: base_url.into(), gate }
    }

    pub async fn resolve(&self, any_platform_url: &str) -> Result<TrackInfo> {
        self.gate.wait_turn().await;

        let url = format!("{}/api/search?url={}", self.base_url, urlencoding::encode(any_platform_url));
        let response = crate::utils::Utils::retry_with_backoff(|| self.client.get(&url).send(), 2, 300).await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(FlacVaultError::RateLimited("link resolver returned 429".to_string()));
        }
        if !response.status().is_success() {
            return Err(FlacVaultError::MetadataUnavailable(format!(
                "link resolver request failed with {}",
                response.status()
            )));
        }

        let body: ResolverResponse = response.json().await?;
        Ok(to_track_info(body))
    }

    pub async fn get_platform_urls_by_isrc(&self, isrc: &str) -> Result<TrackInfo> {
        self.gate.wait_turn().await;

        let url = format!("{}/api/search?isrc={}", self.base_url, urlencoding::encode(isrc));
        let response = crate::utils::Utils::retry_with_backoff(|| self.client.get(&url).send(), 2, 300).await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(FlacVaultError::RateLimited("link resolver returned 429".to_string()));
        }
        if !response.status().is_success() {
            return Err(FlacVaultError::MetadataUnavailable(format!(
                "ISRC lookup failed with {}",
                response.status()
            )));
        }

        let body: ResolverResponse = response.json().await?;
        Ok(to_track_info(body))
    }
}

fn to_track_info(body: ResolverResponse) -> TrackInfo {
    TrackInfo {
        title: body.title,
        artist: body.artist,
        thumbnail_url: body.thumbnail_url,
        kind: if body.kind == "album" { TrackKind::Album } else { TrackKind::Song },
        isrc: body.isrc,
        platform_urls: body.links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant as TokioInstant;

    #[tokio::test]
    #[ignore = "sleeps ~7s to exercise the real minimum-interval gate"]
    async fn rate_gate_serialises_calls() {
        let gate = RateGate::new();
        let start = TokioInstant::now();
        gate.wait_turn().await;
        gate.wait_turn().await;
        assert!(start.elapsed() >= Duration::from_secs(7));
    }
}
