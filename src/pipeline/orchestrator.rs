//! Run wiring: scan collection and the analysis fan-out/fan-in.
//!
//! `run_analysis` owns the whole analysis phase: freeze the task snapshot, spawn the
//! pool and the dispatcher, drain outcomes on the calling thread (the single
//! consumer), then join everything with a bounded shutdown wait.

use log::debug;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::aggregate::{Aggregator, render_report, run_consumer_loop};
use super::context::{EventSink, ScanContext, create_analysis_channels};
use super::dispatch::{spawn_analysis_workers, spawn_dispatcher};
use super::scanner::collect_records;
use crate::classifier::Classifier;
use crate::types::{AnalysisTask, Event, FileRecord, RunReport};
use crate::utils::config::{SCAN_BATCH_SIZE, WorkerLimits};

/// Parameters for one analysis run over a frozen record snapshot.
pub struct AnalysisParams {
    /// Decision threshold in [0,1]; meaningful only for binary-kind backends.
    pub threshold: f32,
    /// Worker override; None means `min(16, available cores)`.
    pub num_workers: Option<usize>,
    /// Shared cooperative cancellation flag.
    pub cancel: Arc<AtomicBool>,
    /// Bound on draining in-flight tasks once cancellation is observed. Exceeding it
    /// is logged, not fatal; overrunning workers are detached.
    pub shutdown_wait: Duration,
}

/// Scan `root` into a fresh record vector. Returns the records and whether the scan
/// ran to natural completion.
pub fn run_scan(
    root: &Path,
    follow_links: bool,
    cancel: Arc<AtomicBool>,
    emit: EventSink<'_>,
) -> anyhow::Result<(Vec<FileRecord>, bool)> {
    let root = root
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("cannot scan {}: {}", root.display(), e))?;
    let ctx = ScanContext {
        root,
        follow_links,
        cancel,
        batch_size: SCAN_BATCH_SIZE,
    };
    let (records, summary) = collect_records(ctx, emit)?;
    Ok((records, summary.completed))
}

/// Classify every record with `classifier`, mutating record status/score through the
/// consumer, and return the aggregate report. The snapshot of tasks is frozen here;
/// records added by a concurrent rescan cannot join an in-flight run.
pub fn run_analysis(
    records: &mut [FileRecord],
    classifier: Arc<dyn Classifier>,
    params: &AnalysisParams,
    emit: EventSink<'_>,
) -> RunReport {
    let total = records.len();
    let num_workers = WorkerLimits::effective(params.num_workers);
    emit(&Event::Log(format!(
        "cores available: {} | workers: {}",
        rayon::current_num_threads(),
        num_workers
    )));

    // Frozen snapshot: one task per record, owned by the dispatcher from here on.
    let tasks: Vec<AnalysisTask> = records
        .iter()
        .map(|r| AnalysisTask {
            path: r.path.clone(),
            threshold: params.threshold,
        })
        .collect();

    let channels = create_analysis_channels();
    let pool = spawn_analysis_workers(
        channels.task_rx,
        &channels.outcome_tx,
        classifier,
        Arc::clone(&params.cancel),
        num_workers,
    );
    // Workers hold clones; dropping ours lets the outcome channel close when they exit.
    drop(channels.outcome_tx);
    let dispatcher = spawn_dispatcher(tasks, channels.task_tx, Arc::clone(&params.cancel));

    let mut aggregator = Aggregator::new(total);
    run_consumer_loop(
        channels.outcome_rx,
        records,
        &mut aggregator,
        &params.cancel,
        params.shutdown_wait,
        emit,
    );

    let launched = dispatcher.join().unwrap_or(0);
    debug!("dispatcher sent {} of {} tasks", launched, total);
    if !pool.join_with_timeout(params.shutdown_wait) {
        log::warn!(
            "worker pool did not drain within {:?}",
            params.shutdown_wait
        );
    }

    let cancelled = params.cancel.load(Ordering::Relaxed);
    let report = aggregator.finalize(cancelled);
    emit(&Event::Log(render_report(&report)));
    emit(&Event::Status(if cancelled {
        "Analysis cancelled".to_string()
    } else {
        "Analysis complete".to_string()
    }));
    emit(&Event::AnalysisComplete);
    report
}
