use crate::model::Job;
use crate::utils::Utils;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Forced template for playlist entries (§4.7): a playlist-named folder
/// holding one subfolder per track.
const PLAYLIST_TEMPLATE: &str = "{track} - {artist} - {title}/{track} - {artist} - {title}";

/// Expands a placeholder template against a job's resolved metadata and
/// resolves collisions against the filesystem (§4.7). Pure with respect to
/// its inputs except for the final existence check.
pub struct NamingEngine;

impl NamingEngine {
    /// Computes the final output path (without extension) under `base_dir`.
    pub fn resolve_target(base_dir: &Path, job: &Job, template: &str) -> PathBuf {
        let template = if job.playlist_name.is_some() { PLAYLIST_TEMPLATE } else { template };
        let expanded = Self::apply(template, job);
        let cleaned = Self::clean_path(&expanded);

        let mut path = base_dir.to_path_buf();
        if let Some(playlist) = &job.playlist_name {
            path.push(Utils::sanitize_segment(playlist));
        }
        for segment in cleaned.split('/') {
            if !segment.is_empty() {
                path.push(segment);
            }
        }
        path
    }

    /// Substitutes every `{placeholder}` with its sanitised value. Each path
    /// segment is sanitised independently so separators inside a value (e.g.
    /// a title containing `/`) never escape into directory structure.
    pub fn apply(template: &str, job: &Job) -> String {
        let track = job.playlist_position.map(|p| format!("{p:02}")).unwrap_or_else(|| "00".to_string());
        let year = job
            .upload_date
            .as_deref()
            .and_then(|d| d.get(0..4))
            .map(str::to_string)
            .unwrap_or_else(|| "Unknown".to_string());

        let values: &[(&str, String)] = &[
            ("artist", job.artist.clone().unwrap_or_else(|| "Unknown Artist".to_string())),
            ("title", job.title.clone().unwrap_or_else(|| "Unknown Title".to_string())),
            ("album", job.album.clone().unwrap_or_else(|| "Unknown Album".to_string())),
            ("year", year),
            ("track", track),
            ("genre", "Unknown".to_string()),
            ("youtube_id", job.video_id.clone().unwrap_or_else(|| job.source_url.clone())),
        ];

        template
            .split('/')
            .map(|segment| Self::apply_segment(segment, values))
            .collect::<Vec<_>>()
            .join("/")
    }

    fn apply_segment(segment: &str, values: &[(&str, String)]) -> String {
        let mut out = segment.to_string();
        for (key, value) in values {
            out = out.replace(&format!("{{{key}}}"), &Utils::sanitize_segment(value));
        }
        out
    }

    /// Collapses repeated separators, drops empty/`-`-only segments, strips
    /// leading/trailing separators.
    fn clean_path(raw: &str) -> String {
        raw.split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "-")
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Resolves a filename collision (§4.7 collision resolution).
    pub fn resolve_collision(path: &Path) -> PathBuf {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        Utils::generate_unique_path(path, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QualityTier;

    fn sample_job() -> Job {
        let mut job = Job::new("https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(), QualityTier::Best, None);
        job.title = Some("Never Gonna Give You Up".to_string());
        job.artist = Some("Rick Astley".to_string());
        job
    }

    #[test]
    fn jellyfin_layout_expands() {
        let job = sample_job();
        let expanded = NamingEngine::apply("{artist}/{title}/{title}", &job);
        assert_eq!(expanded, "Rick Astley/Never Gonna Give You Up/Never Gonna Give You Up");
    }

    #[test]
    fn playlist_forces_track_prefixed_template() {
        let mut job = sample_job();
        job.playlist_name = Some("My Mix".to_string());
        job.playlist_position = Some(1);
        let target = NamingEngine::resolve_target(Path::new("/out"), &job, "{artist}/{title}/{title}");
        assert_eq!(target, PathBuf::from("/out/My Mix/01 - Rick Astley - Never Gonna Give You Up/01 - Rick Astley - Never Gonna Give You Up"));
    }

    #[test]
    fn path_cleaning_drops_dash_only_segments() {
        assert_eq!(NamingEngine::clean_path("a//-/b/"), "a/b");
    }
}
