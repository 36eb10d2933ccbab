pub mod fs;
pub mod logger;

use crate::errors::{FlacVaultError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Grab-bag of small pure helpers shared across components.
pub struct Utils;

impl Utils {
    /// Per-segment sanitisation for the naming engine (§4.7): strip forbidden
    /// characters and control bytes, collapse whitespace, trim dots/spaces,
    /// cap length, fall back to "Unknown" when empty.
    pub fn sanitize_segment(segment: &str) -> String {
        let stripped: String = segment
            .chars()
            .filter(|c| !c.is_control())
            .map(|c| match c {
                '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
                other => other,
            })
            .collect();

        let collapsed = whitespace_re().replace_all(&stripped, " ").to_string();
        let trimmed = collapsed.trim_matches(|c: char| c == '.' || c == ' ');
        let capped: String = trimmed.chars().take(200).collect();

        if capped.is_empty() {
            "Unknown".to_string()
        } else {
            capped
        }
    }

    pub fn format_file_size(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;
        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }
        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.1} {}", size, UNITS[unit_index])
        }
    }

    pub fn format_duration(seconds: u64) -> String {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        let secs = seconds % 60;
        if hours > 0 {
            format!("{hours}:{minutes:02}:{secs:02}")
        } else {
            format!("{minutes}:{secs:02}")
        }
    }

    /// Collision resolution (§4.7): append " (N)" for the smallest unique N in
    /// 1..=100, else a unix-timestamp suffix.
    pub fn generate_unique_path(base_path: &Path, now_unix: u64) -> PathBuf {
        if !base_path.exists() {
            return base_path.to_path_buf();
        }
        let parent = base_path.parent().unwrap_or(base_path);
        let stem = base_path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
        let extension = base_path.extension().and_then(|s| s.to_str()).unwrap_or("");

        for counter in 1..=100u32 {
            let candidate = if extension.is_empty() {
                parent.join(format!("{stem} ({counter})"))
            } else {
                parent.join(format!("{stem} ({counter}).{extension}"))
            };
            if !candidate.exists() {
                return candidate;
            }
        }
        if extension.is_empty() {
            parent.join(format!("{stem}-{now_unix}"))
        } else {
            parent.join(format!("{stem}-{now_unix}.{extension}"))
        }
    }

    /// Exponential backoff retry used by the link resolver and cascade HTTP calls.
    pub async fn retry_with_backoff<F, Fut, T, E>(mut operation: F, max_retries: u32, initial_delay_ms: u64) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut delay = initial_delay_ms;
        for attempt in 0..=max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt == max_retries {
                        return Err(FlacVaultError::Other(format!(
                            "operation failed after {} attempts: {}",
                            max_retries + 1,
                            e
                        )));
                    }
                    tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
                    delay *= 2;
                }
            }
        }
        unreachable!()
    }
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_segment_strips_forbidden_chars() {
        assert_eq!(Utils::sanitize_segment("AC/DC: Back in Black"), "AC_DC_ Back in Black");
    }

    #[test]
    fn sanitize_segment_empty_becomes_unknown() {
        assert_eq!(Utils::sanitize_segment("   "), "Unknown");
    }

    #[test]
    fn sanitize_segment_caps_length() {
        let long = "a".repeat(300);
        assert_eq!(Utils::sanitize_segment(&long).len(), 200);
    }
}
