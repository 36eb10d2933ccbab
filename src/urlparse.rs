use crate::errors::{FlacVaultError, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

const ALLOWED_HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "youtu.be", "music.youtube.com"];
const MAX_URL_LEN: usize = 2048;

fn video_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap())
}

/// Parses a YouTube URL into its 11-character video id (§4.9 step 1, §6 URL
/// recognition). Accepts `youtu.be/ID`, `youtube.com/watch?v=ID`,
/// `music.youtube.com/watch?v=ID`, `embed/ID`, `v/ID`, `shorts/ID`, or a bare id.
pub fn parse_video_id(input: &str) -> Result<String> {
    if video_id_re().is_match(input) {
        return Ok(input.to_string());
    }

    validate_youtube_url(input)?;
    let url = Url::parse(input).map_err(|_| FlacVaultError::InvalidUrl(input.to_string()))?;

    if url.host_str() == Some("youtu.be") {
        let id = url.path().trim_start_matches('/');
        if video_id_re().is_match(id) {
            return Ok(id.to_string());
        }
        return Err(FlacVaultError::InvalidUrl(input.to_string()));
    }

    if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
        if video_id_re().is_match(v.as_ref()) {
            return Ok(v.to_string());
        }
    }

    for prefix in ["/embed/", "/v/", "/shorts/"] {
        if let Some(rest) = url.path().strip_prefix(prefix) {
            let id = rest.split('/').next().unwrap_or("");
            if video_id_re().is_match(id) {
                return Ok(id.to_string());
            }
        }
    }

    Err(FlacVaultError::InvalidUrl(input.to_string()))
}

/// `https` scheme, an allowed YouTube host, length <= 2048, and parseable (§6).
pub fn validate_youtube_url(input: &str) -> Result<()> {
    if input.len() > MAX_URL_LEN {
        return Err(FlacVaultError::InvalidUrl("URL exceeds maximum length".to_string()));
    }
    let url = Url::parse(input).map_err(|_| FlacVaultError::InvalidUrl(input.to_string()))?;
    if url.scheme() != "https" {
        return Err(FlacVaultError::InvalidUrl("only https URLs are accepted".to_string()));
    }
    let host = url.host_str().unwrap_or("");
    if !ALLOWED_HOSTS.contains(&host) {
        return Err(FlacVaultError::InvalidUrl(format!("host {host} is not a recognised YouTube host")));
    }
    Ok(())
}

pub fn extract_playlist_id(input: &str) -> Option<String> {
    Url::parse(input).ok().and_then(|u| u.query_pairs().find(|(k, _)| k == "list").map(|(_, v)| v.to_string()))
}

/// Rejects output-directory targets that resolve under a protected system root.
pub fn is_forbidden_output_root(path: &std::path::Path) -> bool {
    const FORBIDDEN: &[&str] = &["/etc", "/root", "/proc", "/sys", "/bin", "/sbin", "/usr/bin", "/dev", "/boot"];
    let s = path.to_string_lossy();
    FORBIDDEN.iter().any(|root| s == *root || s.starts_with(&format!("{root}/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_watch_url() {
        assert_eq!(parse_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
    }

    #[test]
    fn parses_short_url() {
        assert_eq!(parse_video_id("https://youtu.be/dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
    }

    #[test]
    fn parses_bare_id() {
        assert_eq!(parse_video_id("dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
    }

    #[test]
    fn rejects_non_https() {
        assert!(validate_youtube_url("http://www.youtube.com/watch?v=dQw4w9WgXcQ").is_err());
    }

    #[test]
    fn rejects_unknown_host() {
        assert!(validate_youtube_url("https://evil.example/watch?v=dQw4w9WgXcQ").is_err());
    }

    #[test]
    fn extracts_playlist_id() {
        assert_eq!(
            extract_playlist_id("https://www.youtube.com/playlist?list=PLabc123"),
            Some("PLabc123".to_string())
        );
    }
}
