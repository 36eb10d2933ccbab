use crate::config::LyricsEmbedMode;
use crate::errors::{FlacVaultError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const LYRICS_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct LyricsLine {
    pub timestamp_ms: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub enum LyricsResult {
    Synced(Vec<LyricsLine>),
    Unsynced(String),
}

#[derive(Debug, Deserialize)]
struct LrcLibEntry {
    #[serde(rename = "trackName")]
    track_name: String,
    #[serde(rename = "artistName")]
    artist_name: String,
    #[serde(rename = "syncedLyrics")]
    synced_lyrics: Option<String>,
    #[serde(rename = "plainLyrics")]
    plain_lyrics: Option<String>,
    #[serde(rename = "instrumental", default)]
    instrumental: bool,
}

/// Fetches and formats lyrics for C8's sidecar writer (§4.8). Grounded on the
/// teacher's LRClib client, trimmed to the one upstream and extended with
/// LRC->SRT conversion.
pub struct LyricsFetcher {
    client: reqwest::Client,
}

impl LyricsFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder().timeout(LYRICS_TIMEOUT).build().unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Searches by (artist, title[, album[, duration]]), preferring synced
    /// results and discarding instrumentals.
    pub async fn fetch(&self, artist: &str, title: &str, album: Option<&str>, duration_secs: Option<u64>) -> Result<LyricsResult> {
        let mut query = format!("{artist} {title}");
        if let Some(album) = album {
            query.push(' ');
            query.push_str(album);
        }

        let url = format!("https://lrclib.net/api/search?q={}", urlencoding::encode(&query));
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FlacVaultError::Other(format!("lyrics search failed: {}", response.status())));
        }

        let entries: Vec<LrcLibEntry> = response.json().await?;
        let candidates: Vec<&LrcLibEntry> = entries
            .iter()
            .filter(|e| !e.instrumental)
            .filter(|e| {
                duration_secs.is_none()
                    || e.track_name.to_lowercase().contains(&title.to_lowercase())
                    || e.artist_name.to_lowercase().contains(&artist.to_lowercase())
            })
            .collect();

        if let Some(entry) = candidates.iter().find(|e| e.synced_lyrics.is_some()) {
            let lines = parse_lrc(entry.synced_lyrics.as_ref().unwrap())?;
            return Ok(LyricsResult::Synced(lines));
        }
        if let Some(entry) = candidates.iter().find(|e| e.plain_lyrics.is_some()) {
            return Ok(LyricsResult::Unsynced(entry.plain_lyrics.clone().unwrap()));
        }

        Err(FlacVaultError::Other("no lyrics found".to_string()))
    }

    /// Writes the `.lrc`/`.txt` sidecar per the `lrc`/`both` embed modes.
    pub fn write_sidecar(&self, base_path: &Path, result: &LyricsResult, artist: &str, title: &str, album: Option<&str>, duration_secs: Option<u64>) -> Result<()> {
        match result {
            LyricsResult::Synced(lines) => {
                let lrc_path = base_path.with_extension("lrc");
                std::fs::write(&lrc_path, render_lrc(lines, artist, title, album, duration_secs))?;
            }
            LyricsResult::Unsynced(text) => {
                let txt_path = base_path.with_extension("txt");
                std::fs::write(&txt_path, text)?;
            }
        }
        Ok(())
    }

    /// Value to embed in container metadata for the `embed`/`both` modes.
    pub fn embed_value(result: &LyricsResult) -> String {
        match result {
            LyricsResult::Synced(lines) => lines.iter().map(|l| format!("[{}]{}", format_timestamp(l.timestamp_ms), l.text)).collect::<Vec<_>>().join("\n"),
            LyricsResult::Unsynced(text) => text.clone(),
        }
    }

    pub fn should_embed(mode: LyricsEmbedMode) -> bool {
        matches!(mode, LyricsEmbedMode::Embed | LyricsEmbedMode::Both)
    }

    pub fn should_write_file(mode: LyricsEmbedMode) -> bool {
        matches!(mode, LyricsEmbedMode::Lrc | LyricsEmbedMode::Both)
    }
}

impl Default for LyricsFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn render_lrc(lines: &[LyricsLine], artist: &str, title: &str, album: Option<&str>, duration_secs: Option<u64>) -> String {
    let mut out = String::new();
    out.push_str(&format!("[ti:{title}]\n"));
    out.push_str(&format!("[ar:{artist}]\n"));
    if let Some(album) = album {
        out.push_str(&format!("[al:{album}]\n"));
    }
    if let Some(duration) = duration_secs {
        out.push_str(&format!("[length:{}:{:02}]\n", duration / 60, duration % 60));
    }
    out.push_str("[by:flacvault]\n");
    out.push_str("[re:flacvault]\n");
    for line in lines {
        out.push_str(&format!("[{}]{}\n", format_timestamp(line.timestamp_ms), line.text));
    }
    out
}

fn format_timestamp(ms: u32) -> String {
    let minutes = ms / 60000;
    let seconds = (ms % 60000) / 1000;
    let centis = (ms % 1000) / 10;
    format!("{minutes:02}:{seconds:02}.{centis:02}")
}

/// Parses LRC content into timestamped lines; accepts `mm:ss.xx`, `m:ss.xx`,
/// and `mm:ss:xx` timestamp forms (§4.8).
pub fn parse_lrc(content: &str) -> Result<Vec<LyricsLine>> {
    let mut lines = Vec::new();
    for raw_line in content.lines() {
        let raw_line = raw_line.trim();
        let Some(bracket_end) = raw_line.find(']') else { continue };
        let timestamp_str = &raw_line[1..bracket_end];
        let text = &raw_line[bracket_end + 1..];
        if let Some(timestamp_ms) = parse_timestamp(timestamp_str) {
            lines.push(LyricsLine { timestamp_ms, text: text.to_string() });
        }
    }
    if lines.is_empty() {
        return Err(FlacVaultError::Other("no valid LRC lines found".to_string()));
    }
    Ok(lines)
}

fn parse_timestamp(raw: &str) -> Option<u32> {
    let (minutes_part, rest) = raw.split_once(':')?;
    let minutes: u32 = minutes_part.parse().ok()?;
    let (seconds_part, fraction_part) = if let Some(idx) = rest.find(['.', ':']) {
        (&rest[..idx], &rest[idx + 1..])
    } else {
        (rest, "0")
    };
    let seconds: u32 = seconds_part.parse().ok()?;
    let fraction: u32 = fraction_part.parse().ok()?;
    let centiseconds = if fraction_part.len() >= 3 { fraction / 10 } else { fraction };
    Some(minutes * 60_000 + seconds * 1_000 + centiseconds * 10)
}

/// Converts parsed LRC lines to SRT subtitle cues for embedding in Matroska.
/// Each line runs until the next line's timestamp, or +5s for the last line.
pub fn lrc_to_srt(lines: &[LyricsLine]) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let start = line.timestamp_ms;
        let end = lines.get(i + 1).map(|l| l.timestamp_ms).unwrap_or(start + 5000);
        out.push_str(&format!("{}\n{} --> {}\n{}\n\n", i + 1, srt_timestamp(start), srt_timestamp(end), line.text));
    }
    out
}

fn srt_timestamp(ms: u32) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mm_ss_xx_timestamp() {
        assert_eq!(parse_timestamp("01:23.45"), Some(83_450));
    }

    #[test]
    fn parses_m_ss_xx_timestamp() {
        assert_eq!(parse_timestamp("1:23.45"), Some(83_450));
    }

    #[test]
    fn parses_mm_ss_colon_xx_timestamp() {
        assert_eq!(parse_timestamp("01:23:45"), Some(83_450));
    }

    #[test]
    fn lrc_round_trip_preserves_line_count() {
        let lrc = "[ti:Title]\n[ar:Artist]\n[00:01.00]First\n[00:05.00]Second\n";
        let lines = parse_lrc(lrc).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "First");
    }

    #[test]
    fn srt_conversion_uses_next_line_start_as_end() {
        let lines = vec![
            LyricsLine { timestamp_ms: 1000, text: "a".to_string() },
            LyricsLine { timestamp_ms: 4000, text: "b".to_string() },
        ];
        let srt = lrc_to_srt(&lines);
        assert!(srt.contains("00:00:01,000 --> 00:00:04,000"));
        assert!(srt.contains("00:00:04,000 --> 00:00:09,000"));
    }
}
