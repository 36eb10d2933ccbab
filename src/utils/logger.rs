use crate::errors::Result;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Thin wrapper around `tracing` init plus a handful of domain-specific
/// logging helpers used throughout the queue/pipeline/cascade.
pub struct Logger;

impl Logger {
    pub fn init() -> Result<()> {
        Self::init_with_level(Level::INFO)
    }

    pub fn init_with_level(level: Level) -> Result<()> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .init();
        Ok(())
    }

    pub fn log_job_submitted(job_id: &str, url: &str) {
        info!("job {} submitted for {}", job_id, url);
    }

    pub fn log_stage_transition(job_id: &str, stage: &str, progress: u8) {
        debug!("job {} -> {} ({}%)", job_id, stage, progress);
    }

    pub fn log_provider_attempt(provider: &str, platform: &str) {
        debug!("trying provider {} on platform {}", provider, platform);
    }

    pub fn log_provider_failed(provider: &str, error: &str) {
        warn!("provider {} failed: {}", provider, error);
    }

    pub fn log_provider_succeeded(provider: &str, quality: &str) {
        info!("provider {} succeeded at quality {}", provider, quality);
    }

    pub fn log_subprocess_call(tool: &str, args: &[String]) {
        debug!("invoking {} {}", tool, args.join(" "));
    }

    pub fn log_subprocess_failed(tool: &str, stderr: &str) {
        error!("{} exited non-zero: {}", tool, stderr.trim());
    }

    pub fn log_job_complete(job_id: &str, output: &str) {
        info!("job {} complete -> {}", job_id, output);
    }

    pub fn log_job_failed(job_id: &str, error: &str) {
        error!("job {} failed: {}", job_id, error);
    }

    pub fn log_job_cancelled(job_id: &str) {
        warn!("job {} cancelled", job_id);
    }

    pub fn log_config_loaded(path: &str) {
        info!("configuration loaded from {}", path);
    }

    pub fn log_config_saved(path: &str) {
        info!("configuration saved to {}", path);
    }

    pub fn log_queue_persisted(path: &str, count: usize) {
        debug!("queue persisted ({} jobs) -> {}", count, path);
    }

    pub fn log_rate_limit_wait(seconds_f: f64) {
        debug!("rate limit gate: sleeping {:.1}s", seconds_f);
    }
}
