use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Best,
    #[serde(rename = "1080p")]
    Q1080p,
    #[serde(rename = "720p")]
    Q720p,
    #[serde(rename = "480p")]
    Q480p,
    #[serde(rename = "360p")]
    Q360p,
}

impl QualityTier {
    pub fn height_cap(self) -> Option<u32> {
        match self {
            QualityTier::Best => None,
            QualityTier::Q1080p => Some(1080),
            QualityTier::Q720p => Some(720),
            QualityTier::Q480p => Some(480),
            QualityTier::Q360p => Some(360),
        }
    }

    pub fn format_selector(self) -> String {
        match self.height_cap() {
            Some(h) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
            None => "bestvideo+bestaudio/best".to_string(),
        }
    }
}

impl std::str::FromStr for QualityTier {
    type Err = crate::errors::FlacVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best" => Ok(QualityTier::Best),
            "1080p" => Ok(QualityTier::Q1080p),
            "720p" => Ok(QualityTier::Q720p),
            "480p" => Ok(QualityTier::Q480p),
            "360p" => Ok(QualityTier::Q360p),
            other => Err(crate::errors::FlacVaultError::ConfigInvalid(format!(
                "unknown quality tier: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    FetchingInfo,
    DownloadingVideo,
    DownloadingAudio,
    Muxing,
    Organizing,
    Complete,
    Error,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Complete | JobState::Error | JobState::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityDowngrade {
    pub requested_rank: u8,
    pub actual_rank: u8,
}

/// One end-to-end download request, owned by the queue from submission to a
/// terminal state. Intermediate files live in a job-scoped temp directory that
/// is destroyed on every exit path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub source_url: String,
    pub cross_platform_url: Option<String>,
    pub quality: QualityTier,

    pub video_id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_secs: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub isrc: Option<String>,
    pub upload_date: Option<String>,
    pub description: Option<String>,
    pub channel: Option<String>,

    pub playlist_name: Option<String>,
    pub playlist_position: Option<u32>,

    pub state: JobState,
    pub progress: u8,
    pub stage_label: String,
    pub error: Option<String>,

    pub output_path: Option<PathBuf>,
    pub output_size: Option<u64>,
    pub audio_source: Option<String>,
    pub audio_only: bool,
    pub quality_downgrade: Option<QualityDowngrade>,

    pub created_at: u64,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,

    #[serde(skip)]
    pub cancel: Option<CancellationToken>,
}

impl Job {
    pub fn new(source_url: String, quality: QualityTier, cross_platform_url: Option<String>) -> Self {
        Job {
            id: Uuid::new_v4().to_string(),
            source_url,
            cross_platform_url,
            quality,
            video_id: None,
            title: None,
            artist: None,
            album: None,
            duration_secs: None,
            thumbnail_url: None,
            isrc: None,
            upload_date: None,
            description: None,
            channel: None,
            playlist_name: None,
            playlist_position: None,
            state: JobState::Pending,
            progress: 0,
            stage_label: "Queued".to_string(),
            error: None,
            output_path: None,
            output_size: None,
            audio_source: None,
            audio_only: false,
            quality_downgrade: None,
            created_at: now_ms(),
            started_at: None,
            completed_at: None,
            cancel: Some(CancellationToken::new()),
        }
    }

    /// Advances progress; never regresses (P1).
    pub fn set_progress(&mut self, value: u8, label: impl Into<String>) {
        if value > self.progress {
            self.progress = value;
        }
        self.stage_label = label.into();
    }

    pub fn transition(&mut self, state: JobState) {
        if self.state.is_terminal() {
            return; // P2: terminal once.
        }
        self.state = state;
        if state.is_terminal() {
            self.completed_at = Some(now_ms());
        }
    }

    pub fn mark_complete(&mut self, output_path: PathBuf, size: u64, audio_source: String) {
        if self.state.is_terminal() {
            return;
        }
        self.output_path = Some(output_path);
        self.output_size = Some(size);
        self.audio_source = Some(audio_source);
        self.set_progress(100, "Complete");
        self.transition(JobState::Complete);
    }

    pub fn mark_error(&mut self, err: &crate::errors::FlacVaultError) {
        if self.state.is_terminal() {
            return;
        }
        self.error = Some(err.to_string());
        self.transition(JobState::Error);
    }

    pub fn mark_cancelled(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.transition(JobState::Cancelled);
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_secs: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub description: Option<String>,
    pub channel: Option<String>,
    pub upload_date: Option<String>,
    pub view_count: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub duration_secs: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub url: String,
    pub position: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistInfo {
    pub title: String,
    pub author: Option<String>,
    pub entries: Vec<PlaylistEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaStreamInfo {
    pub codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration_secs: Option<f64>,
    pub bitrate: Option<u64>,
    pub video: Option<MediaStreamInfo>,
    pub audio: Option<MediaStreamInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    pub thumbnail_url: Option<String>,
    pub kind: TrackKind,
    pub isrc: Option<String>,
    pub platform_urls: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Song,
    Album,
}

/// Produced by the link resolver / cascade; consumed by the audio providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioCandidate {
    pub platform: String,
    pub track_url: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub isrc: Option<String>,
    pub duration_secs: Option<u64>,
    pub quality_label: String,
    pub priority_rank: u8,
}

#[derive(Debug, Clone)]
pub struct MuxPlan {
    pub video_path: Option<PathBuf>,
    pub audio_path: PathBuf,
    pub output_path: PathBuf,
    pub metadata: std::collections::HashMap<String, String>,
    pub cover_path: Option<PathBuf>,
    pub container: MuxContainer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxContainer {
    Matroska,
    Flac,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub source_url: String,
    pub title: String,
    pub artist: String,
    pub audio_source: Option<String>,
    pub quality: QualityTier,
    pub output_path: Option<PathBuf>,
    pub duration_secs: Option<u64>,
    pub size: Option<u64>,
    pub timestamp: u64,
    pub status: String,
    pub error: Option<String>,
}

impl HistoryEntry {
    pub fn from_job(job: &Job) -> Self {
        HistoryEntry {
            id: job.id.clone(),
            source_url: job.source_url.clone(),
            title: job.title.clone().unwrap_or_else(|| "Unknown".to_string()),
            artist: job.artist.clone().unwrap_or_else(|| "Unknown".to_string()),
            audio_source: job.audio_source.clone(),
            quality: job.quality,
            output_path: job.output_path.clone(),
            duration_secs: job.duration_secs,
            size: job.output_size,
            timestamp: job.completed_at.unwrap_or_else(now_ms),
            status: match job.state {
                JobState::Complete => "complete".to_string(),
                JobState::Error => "error".to_string(),
                JobState::Cancelled => "cancelled".to_string(),
                _ => "unknown".to_string(),
            },
            error: job.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIndexEntry {
    pub path: PathBuf,
    pub normalised_title: String,
    pub normalised_artist: String,
    pub duration_secs: Option<u64>,
    pub size: u64,
    pub indexed_at: u64,
}

impl FileIndexEntry {
    pub fn new(path: PathBuf, normalised_title: String, normalised_artist: String, duration_secs: Option<u64>, size: u64) -> Self {
        FileIndexEntry {
            path,
            normalised_title,
            normalised_artist,
            duration_secs,
            size,
            indexed_at: now_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Added { job_id: String, snapshot: Job },
    Updated { job_id: String, progress: Option<u8>, state: Option<JobState> },
    Completed { job_id: String, snapshot: Job },
    Error { job_id: String, error: String },
    Removed { job_id: String },
}

impl Event {
    pub fn job_id(&self) -> &str {
        match self {
            Event::Added { job_id, .. }
            | Event::Updated { job_id, .. }
            | Event::Completed { job_id, .. }
            | Event::Error { job_id, .. }
            | Event::Removed { job_id } => job_id,
        }
    }

    /// Events in this category are never dropped for a lagging subscriber.
    pub fn is_terminal_category(&self) -> bool {
        matches!(self, Event::Completed { .. } | Event::Error { .. })
    }
}
