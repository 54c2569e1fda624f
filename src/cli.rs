//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Search catalog sites for a list of tracks and store verified audio files.
///
/// Each track goes through a cascade of searches, link extraction, cheap-first
/// validation and a size-capped transfer, retried a bounded number of times.
#[derive(Parser, Debug)]
#[command(name = "trackfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Track list: a JSON array of {"title", "artist"} objects (.json) or
    /// `Title - Artist` lines
    pub tracks_file: PathBuf,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Directory verified files are written to (default: current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Tracks processed at once (1-16)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub concurrency: Option<u8>,

    /// Attempts per track (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_retries: Option<u8>,

    /// Minimum delay between requests to same domain in milliseconds (0 to disable, max 60000)
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit: Option<u64>,

    /// Config file (default: $XDG_CONFIG_HOME/trackfetch/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Primary catalog base URL
    #[arg(long)]
    pub primary_endpoint: Option<String>,

    /// Backup catalog base URL
    #[arg(long)]
    pub backup_endpoint: Option<String>,

    /// Render service URL template containing `{url}`
    #[arg(long)]
    pub render_endpoint: Option<String>,

    /// Disable politeness delays (local testing only)
    #[arg(long)]
    pub fast: bool,

    /// Write manifest.json into the output directory
    #[arg(long)]
    pub manifest: bool,

    /// Remove leftover *.part files from the output directory before starting
    #[arg(long)]
    pub clean_partials: bool,
}
