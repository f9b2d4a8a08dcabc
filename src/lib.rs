//! Imgsieve: batch image classifier with a pluggable scoring backend
//!
//! Scans a directory tree for supported images, then classifies each file on a bounded
//! worker pool. Per-item outcomes flow through a channel to a single consumer that
//! updates records, drives progress, and aggregates the final report. Cancellation is
//! cooperative throughout.

pub mod classifier;
pub mod controller;
pub mod engine;
pub mod errors;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use classifier::{BackendId, Classifier};
pub use controller::{RunController, RunState};
pub use errors::{LoadError, PredictError};
pub use pipeline::ScanSummary;

use log::debug;
use std::path::Path;

/// Result alias used by public imgsieve API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: scan `root`, classify every image found with `opts.backend`,
/// and return the aggregate report.
///
/// - **`on_event: None`** → run silently; inspect the returned [`RunReport`].
/// - **`on_event: Some(f)`** → `f` is invoked on the consumer thread for each
///   [`Event`] (scan completion, per-item updates, progress, log lines, terminal
///   completion). Keep it fast or forward to a channel.
///
/// For cancellation or access to per-record results, drive a
/// [`RunController`](controller::RunController) directly instead.
pub fn classify_dir<F>(root: &Path, opts: &Opts, on_event: Option<F>) -> Result<RunReport>
where
    F: FnMut(&Event),
{
    let config_str = format!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        opts
    );
    debug!("{}", config_str);

    let mut controller = RunController::new();
    let mut on_event = on_event;
    let scan = controller.scan(root, opts.follow_links, on_event.as_mut())?;
    debug!("scan found {} images", scan.found);
    if !scan.completed {
        // Interrupted while walking: report the partial file list, classify nothing.
        return Ok(RunReport {
            total: scan.found,
            cancelled: true,
            ..RunReport::default()
        });
    }
    controller.select_backend(opts.backend)?;
    controller.analyze(opts.threshold, opts.num_workers, on_event.as_mut())
}
