mod events;

pub use events::{Event, EventBus};

use crate::errors::{FlacVaultError, Result};
use crate::history::History;
use crate::model::{Job, JobState, QualityTier};
use crate::pipeline::{self, PipelineContext};
use crate::urlparse;
use crate::utils::fs::FileUtils;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::interval;

const DISPATCH_INTERVAL: Duration = Duration::from_millis(500);
const PERSIST_INTERVAL: Duration = Duration::from_secs(30);
const DISPATCH_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Serialize, Deserialize)]
struct QueueDocument {
    jobs: Vec<Job>,
    updated_at: u64,
}

/// Owns every job from submission to a terminal state, the fixed worker
/// pool, and the event bus (§4.10). `RwLock` guards the job map the way the
/// teacher's queue guards its item slice: readers take a read lock, every
/// mutation takes a write lock.
pub struct Queue {
    jobs: RwLock<Vec<Job>>,
    dispatch_tx: mpsc::Sender<String>,
    offered: Mutex<HashSet<String>>,
    events: EventBus,
    history: Arc<History>,
    ctx: Arc<PipelineContext>,
    persist_path: PathBuf,
    worker_count: u32,
}

impl Queue {
    pub fn new(ctx: Arc<PipelineContext>, history: Arc<History>, persist_path: PathBuf, worker_count: u32) -> Arc<Self> {
        let worker_count = worker_count.max(1);
        let (dispatch_tx, dispatch_rx) = mpsc::channel(DISPATCH_CHANNEL_CAPACITY);

        let queue = Arc::new(Self {
            jobs: RwLock::new(Vec::new()),
            dispatch_tx,
            offered: Mutex::new(HashSet::new()),
            events: EventBus::new(),
            history,
            ctx,
            persist_path,
            worker_count,
        });

        queue.clone().spawn_workers(dispatch_rx);
        queue.clone().spawn_dispatcher();
        queue.clone().spawn_persistence();
        queue
    }

    /// Reloads queue state from disk; transient-state jobs are demoted to
    /// `pending` with a `(resumed)` stage suffix (P8).
    pub async fn load(&self) -> Result<()> {
        if !self.persist_path.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(&self.persist_path).map_err(FlacVaultError::Io)?;
        let doc: QueueDocument = serde_json::from_str(&content)?;

        let mut jobs = self.jobs.write().await;
        for mut job in doc.jobs {
            if !job.state.is_terminal() && job.state != JobState::Pending {
                job.state = JobState::Pending;
                job.stage_label = format!("{} (resumed)", job.stage_label);
            }
            job.cancel = Some(tokio_util::sync::CancellationToken::new());
            jobs.push(job);
        }
        Ok(())
    }

    pub async fn submit_job(&self, video_url: &str, quality: QualityTier, cross_platform_url: Option<String>) -> Result<String> {
        urlparse::validate_youtube_url(video_url)?;
        let job = Job::new(video_url.to_string(), quality, cross_platform_url);
        let id = job.id.clone();
        crate::utils::logger::Logger::log_job_submitted(&id, video_url);
        self.events.emit(Event::Added { job_id: id.clone(), snapshot: job.clone() });
        self.jobs.write().await.push(job);
        Ok(id)
    }

    pub async fn submit_playlist(&self, playlist_url: &str, quality: QualityTier) -> Result<Vec<String>> {
        let info = self.ctx.ytdlp.fetch_playlist_entries(playlist_url).await?;
        let mut ids = Vec::with_capacity(info.entries.len());
        let mut jobs = self.jobs.write().await;
        for entry in info.entries {
            let mut job = Job::new(entry.url, quality, None);
            job.title = Some(entry.title);
            job.artist = Some(entry.artist);
            job.duration_secs = entry.duration_secs;
            job.thumbnail_url = entry.thumbnail_url;
            job.playlist_name = Some(info.title.clone());
            job.playlist_position = Some(entry.position);
            ids.push(job.id.clone());
            crate::utils::logger::Logger::log_job_submitted(&job.id, &job.source_url);
            self.events.emit(Event::Added { job_id: job.id.clone(), snapshot: job.clone() });
            jobs.push(job);
        }
        Ok(ids)
    }

    pub async fn snapshot(&self) -> Vec<Job> {
        self.jobs.read().await.clone()
    }

    pub async fn get_job(&self, id: &str) -> Option<Job> {
        self.jobs.read().await.iter().find(|j| j.id == id).cloned()
    }

    /// Triggers the job's cancellation handle (§4.10). The in-flight stage
    /// honours it at its next suspension point.
    pub async fn cancel_job(&self, id: &str) -> Result<()> {
        let jobs = self.jobs.read().await;
        let job = jobs.iter().find(|j| j.id == id).ok_or_else(|| FlacVaultError::JobNotFound(id.to_string()))?;
        if let Some(cancel) = &job.cancel {
            cancel.cancel();
        }
        Ok(())
    }

    pub async fn remove_job(&self, id: &str) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|j| j.id != id);
        if jobs.len() == before {
            return Err(FlacVaultError::JobNotFound(id.to_string()));
        }
        drop(jobs);
        self.events.emit(Event::Removed { job_id: id.to_string() });
        Ok(())
    }

    /// Repositions a `pending` job; has no effect on in-flight jobs.
    pub async fn move_job(&self, id: &str, new_index: usize) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let current = jobs.iter().position(|j| j.id == id).ok_or_else(|| FlacVaultError::JobNotFound(id.to_string()))?;
        if jobs[current].state != JobState::Pending {
            return Ok(());
        }
        let job = jobs.remove(current);
        let idx = new_index.min(jobs.len());
        jobs.insert(idx, job);
        Ok(())
    }

    pub async fn clear_completed(&self) -> Result<usize> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|j| !j.state.is_terminal());
        Ok(before - jobs.len())
    }

    /// Resets every `error` job back to `pending` (§4.10).
    pub async fn retry_failed(&self) -> Result<usize> {
        let mut jobs = self.jobs.write().await;
        let mut count = 0;
        for job in jobs.iter_mut() {
            if job.state == JobState::Error {
                job.state = JobState::Pending;
                job.error = None;
                job.progress = 0;
                job.stage_label = format!("{} (retry)", job.stage_label);
                job.cancel = Some(tokio_util::sync::CancellationToken::new());
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub async fn persist(&self) -> Result<()> {
        let jobs = self.jobs.read().await.clone();
        let count = jobs.len();
        let doc = QueueDocument { jobs, updated_at: now_secs() };
        let json = serde_json::to_string_pretty(&doc)?;
        FileUtils::write_atomic(&self.persist_path, json.as_bytes())?;
        crate::utils::logger::Logger::log_queue_persisted(&self.persist_path.display().to_string(), count);
        Ok(())
    }

    /// Offers every still-`pending` job not already sitting in the dispatch
    /// channel (§4.10: "for each pending job not already assigned"). `offered`
    /// tracks ids between being sent and being dequeued by a worker, so a job
    /// outstanding across several ticks is never re-offered and can't crowd a
    /// newly-submitted job out of the bounded channel.
    fn spawn_dispatcher(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = interval(DISPATCH_INTERVAL);
            loop {
                ticker.tick().await;
                let pending_ids: Vec<String> = {
                    let jobs = self.jobs.read().await;
                    jobs.iter().filter(|j| j.state == JobState::Pending).map(|j| j.id.clone()).collect()
                };
                let mut offered = self.offered.lock().await;
                for id in pending_ids {
                    if offered.contains(&id) {
                        continue;
                    }
                    if self.dispatch_tx.try_send(id.clone()).is_ok() {
                        offered.insert(id);
                    }
                }
            }
        });
    }

    fn spawn_workers(self: Arc<Self>, dispatch_rx: mpsc::Receiver<String>) {
        let rx = Arc::new(Mutex::new(dispatch_rx));
        for _ in 0..self.worker_count {
            let queue = self.clone();
            let rx = rx.clone();
            tokio::spawn(async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(job_id) = next else { break };
                    queue.offered.lock().await.remove(&job_id);
                    queue.run_one(job_id).await;
                }
            });
        }
    }

    async fn run_one(self: &Arc<Self>, job_id: String) {
        let mut job = {
            let mut jobs = self.jobs.write().await;
            let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) else { return };
            if job.state != JobState::Pending {
                return;
            }
            job.transition(JobState::FetchingInfo);
            job.started_at = Some(now_secs());
            job.clone()
        };

        let events = self.events.clone();
        let on_update = move |snapshot: &Job| {
            crate::utils::logger::Logger::log_stage_transition(&snapshot.id, &snapshot.stage_label, snapshot.progress);
            events.emit(Event::Updated { job_id: snapshot.id.clone(), progress: Some(snapshot.progress), state: Some(snapshot.state) });
        };

        let result = pipeline::run(&self.ctx, &mut job, &on_update).await;

        {
            let mut jobs = self.jobs.write().await;
            if let Some(slot) = jobs.iter_mut().find(|j| j.id == job_id) {
                *slot = job.clone();
            }
        }

        match result {
            Ok(()) => {
                let output = job.output_path.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
                crate::utils::logger::Logger::log_job_complete(&job.id, &output);
                let _ = self.history.record(crate::model::HistoryEntry::from_job(&job));
                self.events.emit(Event::Completed { job_id: job.id.clone(), snapshot: job.clone() });
            }
            Err(FlacVaultError::Cancelled) => {
                // P6/§4.10: no history entry, no sidecars, temp dir already destroyed.
                crate::utils::logger::Logger::log_job_cancelled(&job.id);
            }
            Err(e) => {
                crate::utils::logger::Logger::log_job_failed(&job.id, &e.to_string());
                let _ = self.history.record(crate::model::HistoryEntry::from_job(&job));
                self.events.emit(Event::Error { job_id: job.id.clone(), error: e.to_string() });
            }
        }
    }

    fn spawn_persistence(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = interval(PERSIST_INTERVAL);
            loop {
                ticker.tick().await;
                let _ = self.persist().await;
            }
        });
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs()
}
