mod aligner;
mod cascade;
mod cli;
mod config;
mod errors;
mod history;
mod index;
mod link_resolver;
mod lyrics;
mod model;
mod muxer;
mod naming;
mod pipeline;
mod queue;
mod settings;
mod sidecar;
mod tools;
mod urlparse;
mod utils;

use cli::Cli;
use errors::Result;
use std::sync::Arc;
use utils::logger::Logger;

const TIDAL_BASE_URL: &str = "https://api.tidal.com";
const LINK_RESOLVER_BASE_URL: &str = "https://api.song.link";
const GENERIC_PROXY_HOSTS: &[&str] = &["https://api.proxy1.example.com", "https://api.proxy2.example.com"];
const SUBPROCESS_TOOL_BINARY: &str = "zotify";

#[tokio::main]
async fn main() -> Result<()> {
    Logger::init()?;

    let settings = settings::Settings::load().unwrap_or_else(|_| {
        let settings = settings::Settings::default();
        settings.save().ok();
        settings
    });
    let config = settings.config().clone();

    let index_path = config::Config::config_dir()?.join("file_index.json");
    let queue_path = config::Config::config_dir()?.join("queue.json");
    let history_path = config::Config::config_dir()?.join("history.json");

    let file_index = Arc::new(index::FileIndex::load(index_path)?);
    let history = Arc::new(history::History::load(history_path)?);
    let worker_count = config.concurrent_downloads;

    let ctx = Arc::new(pipeline::PipelineContext {
        ytdlp: tools::ytdlp::YtDlpAdapter::new(),
        link_resolver: link_resolver::LinkResolverClient::new(LINK_RESOLVER_BASE_URL, link_resolver::RateGate::new()),
        cascade: cascade::Cascade::new(
            cascade::TidalProvider::new(TIDAL_BASE_URL),
            cascade::GenericProxyProvider::new(GENERIC_PROXY_HOSTS.iter().map(|s| s.to_string()).collect()),
            cascade::SubprocessToolProvider::new(SUBPROCESS_TOOL_BINARY, std::env::temp_dir()),
            config.audio_source_priority.clone(),
        ),
        aligner: aligner::Aligner::new(),
        muxer: muxer::Muxer::new(),
        prober: tools::prober::Prober::new(),
        lyrics: lyrics::LyricsFetcher::new(),
        sidecars: sidecar::SidecarWriter::new(),
        index: file_index.clone(),
        config,
    });

    let queue = queue::Queue::new(ctx, history.clone(), queue_path, worker_count);
    queue.load().await?;

    let cli = Cli::parse();
    cli.execute(queue, history).await?;

    Ok(())
}
