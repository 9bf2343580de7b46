mod cli;
mod config;
mod episodes;
mod error;
mod http;
mod logging;
mod naming;
mod orchestrator;
mod progress;

use std::process;
use std::sync::Arc;

use anidl_engine::{FfmpegDownloader, MkvmergeMuxer, progress_channel};
use clap::Parser;
use subtitles::SessionContext;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cli::Args;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::http::HttpClient;
use crate::orchestrator::{Orchestrator, RunSummary};

const PROGRESS_CHANNEL_CAPACITY: usize = 64;
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match run(args).await {
        Ok(summary) if summary.is_success() => {}
        Ok(summary) if summary.cancelled => process::exit(EXIT_CANCELLED),
        Ok(_) => process::exit(1),
        Err(e) => {
            error!("Application error: {e:#}");
            eprintln!("Error: {e:#}");
            let code = match e.downcast_ref::<AppError>() {
                Some(app) if app.is_cancelled() => EXIT_CANCELLED,
                _ => 1,
            };
            process::exit(code);
        }
    }
}

async fn run(args: Args) -> anyhow::Result<RunSummary> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply_args(&args);

    let _log_guard = logging::init_logging(args.verbose, args.quiet, config.log_dir.as_deref())?;

    let episodes = args.episodes.clone().unwrap_or_default();
    let settings = config.run_settings(episodes)?;
    let ctx = SessionContext::new(args.session_id.clone(), args.premium);

    info!(
        quality = %settings.quality,
        sub_type = settings.sub_type.title(),
        output = %settings.output_dir.display(),
        "Starting {} episode(s)",
        args.sources.len()
    );

    let client = Arc::new(HttpClient::new(
        config.request_timeout(),
        &config.user_agent,
    )?);
    let downloader = Arc::new(FfmpegDownloader::with_config(config.downloader_config()));
    let muxer = Arc::new(MkvmergeMuxer::with_config(config.muxer_config()));

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let (progress, progress_rx) = progress_channel(PROGRESS_CHANNEL_CAPACITY);
    let renderer = progress::spawn_renderer(progress_rx, !args.quiet);

    let orchestrator = Orchestrator::new(
        client.clone(),
        client,
        downloader,
        muxer,
        settings,
        ctx,
    )
    .with_progress(progress)
    .with_cancellation(cancel);

    let summary = orchestrator.run(&args.sources).await;

    // Dropping the orchestrator closes the progress channel.
    drop(orchestrator);
    if let Err(e) = renderer.await {
        warn!("Progress renderer stopped abnormally: {e}");
    }

    report(&summary);
    Ok(summary)
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, stopping...");
                cancel.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {e}"),
        }
    });
}

fn report(summary: &RunSummary) {
    info!(
        completed = summary.completed.len(),
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        "Run finished"
    );

    for failure in &summary.failed {
        error!("{}: {}", failure.source, failure.error);
    }

    if summary.cancelled {
        warn!("Run was cancelled before all episodes were processed");
    }
}
