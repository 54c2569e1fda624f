//! CLI entry point for trackfetch.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};
use trackfetch_core::{
    ArchiveWriter, BatchControl, BatchRunner, BatchSummary, CatalogEndpoints, FetchConfig,
    ManifestWriter, RenderServiceSource, RenderedPageSource, TrackFetcher, TrackListFile,
    WordOverlapMatcher, remove_partial_files,
};

mod app_config;
mod cli;

use app_config::FileConfig;
use cli::Args;

/// Exit status when every track of a non-empty list failed.
const EXIT_ALL_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let file_config = app_config::load_file_config(args.config.as_deref())?.unwrap_or_default();
    let config = build_fetch_config(&args, &file_config);
    config.validate().context("Invalid configuration")?;

    let output_dir = args
        .output
        .clone()
        .or_else(|| file_config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create output directory '{}'", output_dir.display()))?;

    if args.clean_partials {
        let removed = remove_partial_files(&output_dir)
            .await
            .with_context(|| format!("Failed to scan '{}'", output_dir.display()))?;
        info!(removed, "removed leftover working files");
    }

    let client = config.build_client()?;
    let renderer = config.endpoints.render.as_ref().map(|template| {
        Arc::new(RenderServiceSource::new(client.clone(), template.clone()))
            as Arc<dyn RenderedPageSource>
    });
    let fetcher = TrackFetcher::from_config(&config, client, renderer, &output_dir)?
        .with_matcher(Arc::new(WordOverlapMatcher));
    let runner = BatchRunner::from_config(fetcher, &config)?;

    info!(
        tracks_file = %args.tracks_file.display(),
        output_dir = %output_dir.display(),
        concurrency = runner.concurrency(),
        "trackfetch starting"
    );

    let control = BatchControl::new();
    let cancel = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing tracks already started");
            cancel.cancel();
        }
    });

    let use_spinner = io::stderr().is_terminal() && !args.quiet;
    let (progress_handle, progress_stop) = spawn_progress_ui(use_spinner, control.clone());

    let provider = TrackListFile::new(&args.tracks_file);
    let summary = runner.run_playlist(&provider, &control).await;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    if args.manifest && summary.input_available {
        let path = ManifestWriter
            .publish(&output_dir, &summary)
            .await
            .context("Failed to write manifest")?;
        info!(path = %path.display(), "manifest written");
    }

    print_summary(&summary, &args.tracks_file, &output_dir);

    if summary.total > 0 && summary.succeeded == 0 {
        return Ok(ExitCode::from(EXIT_ALL_FAILED));
    }
    Ok(ExitCode::SUCCESS)
}

/// CLI flags > config file > defaults.
fn build_fetch_config(args: &Args, file: &FileConfig) -> FetchConfig {
    let endpoints = CatalogEndpoints {
        primary: args
            .primary_endpoint
            .clone()
            .or_else(|| file.primary_endpoint.clone()),
        backup: args
            .backup_endpoint
            .clone()
            .or_else(|| file.backup_endpoint.clone()),
        render: args
            .render_endpoint
            .clone()
            .or_else(|| file.render_endpoint.clone()),
    };

    let mut config = FetchConfig::new(endpoints);
    if let Some(concurrency) = args.concurrency.or(file.concurrency) {
        config.concurrency = usize::from(concurrency);
    }
    if let Some(max_retries) = args.max_retries.or(file.max_retries) {
        config.max_retries = u32::from(max_retries);
    }
    if let Some(rate_limit) = args.rate_limit.or(file.rate_limit) {
        config.domain_spacing = Duration::from_millis(rate_limit);
    }
    if args.fast || file.polite == Some(false) {
        debug!("politeness delays disabled");
        config = config.with_delays_disabled();
    }
    config
}

/// Spinner fed from the batch's live counters.
/// Returns (handle, stop); when disabled the handle is `None` and stop is set.
fn spawn_progress_ui(
    use_spinner: bool,
    control: BatchControl,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let task_stop = Arc::clone(&stop);
    let handle = tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        while !task_stop.load(Ordering::SeqCst) {
            let progress = control.progress();
            spinner.set_message(format!(
                "{} tracks finished ({} stored, {} failed)",
                progress.total(),
                progress.succeeded(),
                progress.failed()
            ));
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        spinner.finish_and_clear();
    });
    (Some(handle), stop)
}

fn print_summary(summary: &BatchSummary, tracks_file: &Path, output_dir: &Path) {
    if !summary.input_available {
        println!("No input: could not read '{}'", tracks_file.display());
        return;
    }
    if summary.total == 0 {
        println!("No tracks to fetch");
        return;
    }

    for result in &summary.results {
        match (&result.failure, result.succeeded) {
            (_, true) => println!("  ok    {}", result.final_filename),
            (Some(reason), false) => {
                println!("  fail  {} - {} ({reason})", result.title, result.artist);
            }
            (None, false) => println!("  fail  {} - {}", result.title, result.artist),
        }
    }
    println!(
        "{}/{} tracks stored in '{}' ({:.1}% success, {} failed)",
        summary.succeeded,
        summary.total,
        output_dir.display(),
        summary.success_rate,
        summary.failed
    );
}
