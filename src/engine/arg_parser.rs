use clap::Parser;
use std::path::PathBuf;

use crate::classifier::BackendId;

struct DefaultArgs;

impl DefaultArgs {
    pub const DIR: &'static str = ".";
}

/// Batch image classifier with a pluggable scoring backend.
#[derive(Clone, Parser)]
#[command(name = "imgsieve")]
#[command(about = "Scan a directory for images and classify them with the selected backend.")]
pub struct Cli {
    /// Directory to scan. Default: current directory.
    #[arg(value_name = "DIR", default_value = DefaultArgs::DIR)]
    pub dir: PathBuf,

    /// Classification backend.
    #[arg(long, short, value_enum)]
    pub backend: Option<BackendId>,

    /// Decision threshold in [0,1] for binary backends. Default: 0.8.
    #[arg(long, short)]
    pub threshold: Option<f32>,

    /// Override worker thread count. Default: min(16, available cores).
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Follow symbolic links.
    #[arg(long, short = 'f', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub follow_links: Option<bool>,

    /// Verbose output (progress bar and per-item log lines).
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    /// Print the final report as JSON.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub json: Option<bool>,
}
