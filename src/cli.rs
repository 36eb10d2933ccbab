use crate::errors::Result;
use crate::history::History;
use crate::model::{Event, JobState, QualityTier};
use crate::queue::Queue;
use clap::{Parser, Subcommand};
use std::sync::Arc;

/// flacvault - turns a YouTube video or playlist into a lossless Matroska or
/// FLAC file, sourcing the highest-quality audio it can find.
#[derive(Parser)]
#[command(name = "flacvault")]
#[command(about = "Download and archive music videos as lossless Matroska/FLAC")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a single video and wait for it to finish.
    Submit {
        url: String,
        #[arg(short, long, default_value = "best")]
        quality: QualityTier,
        /// Optional Tidal/streaming-service URL used to resolve the audio source directly.
        #[arg(long)]
        link: Option<String>,
    },
    /// Submit every entry in a playlist and wait for all of them to finish.
    SubmitPlaylist {
        playlist_url: String,
        #[arg(short, long, default_value = "best")]
        quality: QualityTier,
    },
    /// Print the current queue snapshot.
    Queue,
    /// Print one job's full state.
    Job { id: String },
    /// Cancel an in-flight or pending job.
    Cancel { id: String },
    /// Remove a job from the queue.
    Remove { id: String },
    /// Reposition a pending job.
    Move { id: String, index: usize },
    /// Drop every job already in a terminal state.
    ClearCompleted,
    /// Reset every errored job back to pending.
    RetryFailed,
    /// Drive already-queued and newly-submitted jobs to completion, then exit.
    Run,
    #[command(subcommand)]
    History(HistoryCommands),
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List history entries, optionally filtered by a title/artist substring.
    List {
        #[arg(long)]
        search: Option<String>,
    },
    Stats,
    Delete { id: String },
    Clear,
    /// Resubmit a past download by its history entry id.
    Redownload { id: String },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub async fn execute(self, queue: Arc<Queue>, history: Arc<History>) -> Result<()> {
        match self.command {
            Commands::Submit { url, quality, link } => {
                let id = queue.submit_job(&url, quality, link).await?;
                println!("submitted {id}");
                await_completion(&queue, &[id]).await;
            }
            Commands::SubmitPlaylist { playlist_url, quality } => {
                let ids = queue.submit_playlist(&playlist_url, quality).await?;
                println!("submitted {} jobs", ids.len());
                await_completion(&queue, &ids).await;
            }
            Commands::Queue => {
                for job in queue.snapshot().await {
                    print_job_line(&job);
                }
            }
            Commands::Job { id } => match queue.get_job(&id).await {
                Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
                None => println!("no such job: {id}"),
            },
            Commands::Cancel { id } => {
                queue.cancel_job(&id).await?;
                println!("cancelled {id}");
            }
            Commands::Remove { id } => {
                queue.remove_job(&id).await?;
                println!("removed {id}");
            }
            Commands::Move { id, index } => {
                queue.move_job(&id, index).await?;
                println!("moved {id} to {index}");
            }
            Commands::ClearCompleted => {
                let n = queue.clear_completed().await?;
                println!("cleared {n} completed jobs");
            }
            Commands::RetryFailed => {
                let n = queue.retry_failed().await?;
                println!("requeued {n} failed jobs");
            }
            Commands::Run => {
                let pending: Vec<String> = queue.snapshot().await.into_iter().filter(|j| !j.state.is_terminal()).map(|j| j.id).collect();
                println!("running {} job(s)", pending.len());
                await_completion(&queue, &pending).await;
            }
            Commands::History(cmd) => run_history(cmd, &queue, &history).await?,
        }
        Ok(())
    }
}

async fn run_history(cmd: HistoryCommands, queue: &Arc<Queue>, history: &Arc<History>) -> Result<()> {
    match cmd {
        HistoryCommands::List { search } => {
            let entries = match search {
                Some(q) => history.search(&q)?,
                None => history.get_all()?,
            };
            for entry in entries {
                let size = entry.size.map(crate::utils::Utils::format_file_size).unwrap_or_default();
                let duration = entry.duration_secs.map(crate::utils::Utils::format_duration).unwrap_or_default();
                println!("{}  {} - {}  [{}]  {} {}", entry.id, entry.artist, entry.title, entry.status, duration, size);
            }
        }
        HistoryCommands::Stats => {
            let stats = history.stats()?;
            println!(
                "total: {}  complete: {}  error: {}  cancelled: {}  bytes: {}",
                stats.total,
                stats.completed,
                stats.errored,
                stats.cancelled,
                crate::utils::Utils::format_file_size(stats.total_bytes)
            );
        }
        HistoryCommands::Delete { id } => {
            history.delete(&id)?;
            println!("deleted {id}");
        }
        HistoryCommands::Clear => {
            history.clear()?;
            println!("history cleared");
        }
        HistoryCommands::Redownload { id } => {
            let Some(entry) = history.get(&id)? else {
                println!("no such history entry: {id}");
                return Ok(());
            };
            let job_id = queue.submit_job(&entry.source_url, entry.quality, None).await?;
            println!("resubmitted as {job_id}");
            await_completion(queue, &[job_id]).await;
        }
    }
    Ok(())
}

/// Blocks until every listed job id reaches a terminal state, printing
/// lifecycle events as they arrive (mirrors the teacher's download-and-await
/// CLI call, generalized to many concurrent jobs).
async fn await_completion(queue: &Arc<Queue>, ids: &[String]) {
    if ids.is_empty() {
        return;
    }
    let mut remaining: std::collections::HashSet<String> = ids.iter().cloned().collect();
    let mut rx = queue.subscribe();

    while !remaining.is_empty() {
        match rx.recv().await {
            Ok(Event::Updated { job_id, state: Some(JobState::Cancelled), .. }) if remaining.contains(&job_id) => {
                println!("{job_id}: cancelled");
                remaining.remove(&job_id);
            }
            Ok(Event::Updated { job_id, progress, state }) if remaining.contains(&job_id) => {
                if let (Some(progress), Some(state)) = (progress, state) {
                    println!("{job_id}: {state:?} {progress}%");
                }
            }
            Ok(Event::Completed { job_id, snapshot }) if remaining.contains(&job_id) => {
                println!("{job_id}: complete -> {}", snapshot.output_path.map(|p| p.display().to_string()).unwrap_or_default());
                remaining.remove(&job_id);
            }
            Ok(Event::Error { job_id, error }) if remaining.contains(&job_id) => {
                println!("{job_id}: error -> {error}");
                remaining.remove(&job_id);
            }
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                for id in remaining.clone() {
                    if let Some(job) = queue.get_job(&id).await {
                        if job.state.is_terminal() {
                            remaining.remove(&id);
                        }
                    }
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_job_line(job: &crate::model::Job) {
    let state = match job.state {
        JobState::Complete => "complete",
        JobState::Error => "error",
        JobState::Cancelled => "cancelled",
        _ => "active",
    };
    println!("{}  {}  {}%  {}  {}", job.id, state, job.progress, job.stage_label, job.title.clone().unwrap_or_else(|| job.source_url.clone()));
}
