use crate::aligner::Aligner;
use crate::cascade::Cascade;
use crate::config::Config;
use crate::errors::{FlacVaultError, Result};
use crate::index::{normalise, FileIndex};
use crate::link_resolver::LinkResolverClient;
use crate::lyrics::{self, LyricsFetcher, LyricsResult};
use crate::model::{FileIndexEntry, Job, JobState, MuxContainer, MuxPlan};
use crate::muxer::{standard_metadata, Muxer};
use crate::naming::NamingEngine;
use crate::sidecar::SidecarWriter;
use crate::tools::prober::Prober;
use crate::tools::ytdlp::YtDlpAdapter;
use crate::urlparse;
use crate::utils::fs::FileUtils;
use std::path::PathBuf;
use std::sync::Arc;

/// Per-job stage dependencies handed down from the queue (§4.9). Shared
/// across every worker; nothing here is job-specific mutable state.
pub struct PipelineContext {
    pub config: Config,
    pub ytdlp: YtDlpAdapter,
    pub link_resolver: LinkResolverClient,
    pub cascade: Cascade,
    pub aligner: Aligner,
    pub muxer: Muxer,
    pub prober: Prober,
    pub lyrics: LyricsFetcher,
    pub sidecars: SidecarWriter,
    pub index: Arc<FileIndex>,
}

/// Invoked by the queue after every progress/state change so it can emit an
/// `Updated` lifecycle event (§4.10).
pub type OnUpdate<'a> = dyn Fn(&Job) + Send + Sync + 'a;

/// Runs the thirteen-step pipeline for a single job (§4.9), honouring the
/// monotonic progress budget and checking cancellation between every stage.
pub async fn run(ctx: &PipelineContext, job: &mut Job, on_update: &OnUpdate<'_>) -> Result<()> {
    let cancel = job.cancellation_token();
    let temp_dir = FileUtils::job_temp_dir(&job.id)?;

    let outcome = run_stages(ctx, job, &temp_dir, on_update).await;

    let _ = FileUtils::delete_directory(&temp_dir);

    match outcome {
        Ok(()) => Ok(()),
        Err(FlacVaultError::Cancelled) => {
            job.mark_cancelled();
            on_update(job);
            Err(FlacVaultError::Cancelled)
        }
        Err(e) => {
            job.mark_error(&e);
            on_update(job);
            Err(e)
        }
    }
    .map_err(|e| {
        let _ = cancel; // cancellation already observed via stage checks
        e
    })
}

async fn run_stages(ctx: &PipelineContext, job: &mut Job, temp_dir: &std::path::Path, on_update: &OnUpdate<'_>) -> Result<()> {
    let cancel = job.cancellation_token();

    // 1. Parse URL.
    let video_id = urlparse::parse_video_id(&job.source_url)?;
    job.video_id = Some(video_id.clone());
    job.set_progress(5, "Parsed URL");
    on_update(job);
    check_cancel(&cancel)?;

    // 2. Fetch metadata, unless a playlist submission already filled it in.
    if job.title.is_none() {
        job.transition(JobState::FetchingInfo);
        let meta = ctx.ytdlp.fetch_video_metadata(&job.source_url).await?;
        job.title = Some(meta.title);
        job.artist = Some(meta.artist);
        job.album = meta.album;
        job.duration_secs = meta.duration_secs;
        job.thumbnail_url = meta.thumbnail_url;
        job.upload_date = meta.upload_date;
        job.description = meta.description;
        job.channel = meta.channel;
    }
    job.set_progress(10, "Fetched metadata");
    check_cancel(&cancel)?;
    on_update(job);

    // 3. Skip check.
    let template = ctx.config.naming_template.resolve();
    let target_no_ext = NamingEngine::resolve_target(&ctx.config.output_directory, job, &template);
    if let Some(existing) = ctx.index.find_match(job.title.as_deref().unwrap_or(""), job.artist.as_deref().unwrap_or(""))? {
        job.set_progress(15, "Checking existing library");
        on_update(job);
        let target_with_ext = target_no_ext.with_extension(existing.path.extension().unwrap_or_default());
        if existing.path == target_with_ext {
            job.set_progress(20, "Skipped (already exists)");
            on_update(job);
            finish_job(ctx, job, target_with_ext, existing.size, "existing".to_string())?;
            return Ok(());
        }
        std::fs::create_dir_all(target_with_ext.parent().unwrap_or(&target_with_ext))?;
        FileUtils::copy_file(&existing.path, &target_with_ext)?;
        ctx.index.add_entry(FileIndexEntry::new(
            target_with_ext.clone(),
            existing.normalised_title.clone(),
            existing.normalised_artist.clone(),
            existing.duration_secs,
            existing.size,
        ))?;
        job.set_progress(20, "Copied from existing library");
        on_update(job);
        finish_job(ctx, job, target_with_ext, existing.size, "existing".to_string())?;
        return Ok(());
    }
    check_cancel(&cancel)?;

    // 4. Video download.
    job.transition(JobState::DownloadingVideo);
    std::fs::create_dir_all(temp_dir)?;
    let video_path = match ctx
        .ytdlp
        .download_video(&video_id, job.quality, temp_dir, ctx.config.cookies_browser.as_deref(), &cancel)
        .await
    {
        Ok(path) => Some(path),
        Err(FlacVaultError::Cancelled) => return Err(FlacVaultError::Cancelled),
        Err(_) => {
            job.audio_only = true;
            None
        }
    };
    job.set_progress(40, "Video stage complete");
    check_cancel(&cancel)?;
    on_update(job);

    // 5. Audio cascade.
    job.transition(JobState::DownloadingAudio);
    let track_info = ctx.link_resolver.resolve(&job.cross_platform_url.clone().unwrap_or_else(|| job.source_url.clone())).await.ok();
    let audio_outcome = if let Some(track) = &track_info {
        job.isrc = track.isrc.clone();
        ctx.cascade.run(track, "flac", temp_dir).await.ok()
    } else {
        None
    };

    let (audio_path, audio_source) = match (audio_outcome, &video_path) {
        (Some(outcome), _) => (outcome.file_path, outcome.platform_label),
        (None, Some(video)) => {
            let meta = crate::model::VideoMetadata {
                id: video_id.clone(),
                title: job.title.clone().unwrap_or_default(),
                artist: job.artist.clone().unwrap_or_default(),
                album: job.album.clone(),
                duration_secs: job.duration_secs,
                thumbnail_url: job.thumbnail_url.clone(),
                description: None,
                channel: None,
                upload_date: job.upload_date.clone(),
                view_count: None,
            };
            let extracted = ctx.cascade.extract_from_video(video, temp_dir, &meta).await?;
            (extracted.file_path, extracted.platform_label)
        }
        (None, None) => return Err(FlacVaultError::NoAudioSource("video download failed and audio cascade yielded nothing".to_string())),
    };
    job.audio_source = Some(audio_source.clone());
    job.set_progress(55, "Audio stage complete");
    check_cancel(&cancel)?;
    on_update(job);

    // 6. A/V align (only with both streams present).
    let aligned_audio_path = if video_path.is_some() { ctx.aligner.align(&audio_path, temp_dir).await } else { audio_path.clone() };
    job.set_progress(65, "Aligned audio");
    check_cancel(&cancel)?;
    on_update(job);

    // 7. Target path compute.
    job.transition(JobState::Organizing);
    let container = if video_path.is_some() { MuxContainer::Matroska } else { MuxContainer::Flac };
    let extension = if container == MuxContainer::Matroska { "mkv" } else { "flac" };
    let target = target_no_ext.with_extension(extension);
    std::fs::create_dir_all(target.parent().unwrap_or(&target))?;
    let final_target = NamingEngine::resolve_collision(&target);
    check_cancel(&cancel)?;

    // 8. Mux.
    job.transition(JobState::Muxing);
    let metadata = standard_metadata(
        job.title.as_deref().unwrap_or("Unknown"),
        job.artist.as_deref().unwrap_or("Unknown"),
        job.album.as_deref(),
        job.upload_date.as_deref().and_then(|d| d.get(0..4)),
        job.isrc.as_deref(),
    );
    let cover_path = fetch_cover(ctx, job, temp_dir).await;
    let plan = MuxPlan {
        video_path: video_path.clone(),
        audio_path: aligned_audio_path,
        output_path: final_target.clone(),
        metadata,
        cover_path: cover_path.clone(),
        container,
    };
    let mux_outcome = ctx.muxer.mux(&plan).await?;
    job.set_progress(80, "Muxed");
    check_cancel(&cancel)?;
    on_update(job);

    // 9. Lyrics.
    if ctx.config.lyrics_enabled {
        if let Ok(lyrics_result) = ctx
            .lyrics
            .fetch(job.artist.as_deref().unwrap_or(""), job.title.as_deref().unwrap_or(""), job.album.as_deref(), job.duration_secs)
            .await
        {
            write_lyrics(ctx, job, &final_target, container, &lyrics_result).await;
        }
    }
    job.set_progress(85, "Lyrics stage complete");
    on_update(job);

    // 10. Sidecars.
    if ctx.config.generate_nfo {
        let media = ctx.prober.probe(&final_target).await.ok();
        let poster_relpath = if let Some(url) = &job.thumbnail_url {
            ctx.sidecars.write_poster(&final_target, url).await.ok().and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        } else {
            None
        };
        let _ = ctx.sidecars.write_nfo(&final_target, job, media.as_ref(), poster_relpath.as_deref()).await;
    }
    job.set_progress(90, "Sidecars written");
    check_cancel(&cancel)?;
    on_update(job);

    // 11. Index add.
    ctx.index.add_entry(FileIndexEntry::new(
        final_target.clone(),
        normalise(job.title.as_deref().unwrap_or("")),
        normalise(job.artist.as_deref().unwrap_or("")),
        job.duration_secs,
        mux_outcome.size,
    ))?;
    job.set_progress(95, "Indexed");
    on_update(job);

    // 12 & 13. History + mark complete happen in the caller via finish_job.
    finish_job(ctx, job, final_target, mux_outcome.size, audio_source)?;
    Ok(())
}

fn finish_job(ctx: &PipelineContext, job: &mut Job, output_path: PathBuf, size: u64, audio_source: String) -> Result<()> {
    let _ = ctx;
    job.audio_only = job.audio_only || output_path.extension().and_then(|e| e.to_str()) == Some("flac");
    job.mark_complete(output_path, size, audio_source);
    Ok(())
}

async fn fetch_cover(ctx: &PipelineContext, job: &Job, temp_dir: &std::path::Path) -> Option<PathBuf> {
    if !ctx.config.embed_cover_art {
        return None;
    }
    let url = job.thumbnail_url.as_ref()?;
    let dest = temp_dir.join("cover.jpg");
    ctx.sidecars.write_poster(&dest.with_extension(""), url).await.ok()?;
    let written = dest.with_file_name("cover-poster.jpg");
    if written.exists() {
        Some(written)
    } else {
        None
    }
}

async fn write_lyrics(ctx: &PipelineContext, job: &Job, output_path: &std::path::Path, container: MuxContainer, result: &LyricsResult) {
    if LyricsFetcher::should_write_file(ctx.config.lyrics_embed_mode) {
        let _ = ctx.lyrics.write_sidecar(output_path, result, job.artist.as_deref().unwrap_or(""), job.title.as_deref().unwrap_or(""), job.album.as_deref(), job.duration_secs);
    }
    if LyricsFetcher::should_embed(ctx.config.lyrics_embed_mode) {
        match (container, result) {
            (MuxContainer::Matroska, LyricsResult::Synced(lines)) => {
                let srt_path = output_path.with_extension("srt.tmp");
                if std::fs::write(&srt_path, lyrics::lrc_to_srt(lines)).is_ok() {
                    let _ = ctx.muxer.embed_subtitle(output_path, &srt_path, &std::collections::HashMap::new()).await;
                    let _ = std::fs::remove_file(&srt_path);
                }
            }
            _ => {
                let mut extra = std::collections::HashMap::new();
                let key = match (container, result) {
                    (MuxContainer::Flac, LyricsResult::Synced(_)) => "LYRICS",
                    (MuxContainer::Flac, LyricsResult::Unsynced(_)) => "UNSYNCEDLYRICS",
                    (MuxContainer::Matroska, LyricsResult::Unsynced(_)) => "LYRICS",
                    _ => unreachable!(),
                };
                extra.insert(key.to_string(), lyrics::LyricsFetcher::embed_value(result));
                let _ = ctx.muxer.patch_metadata(output_path, &extra).await;
            }
        }
    }
}

fn check_cancel(cancel: &tokio_util::sync::CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(FlacVaultError::Cancelled)
    } else {
        Ok(())
    }
}
