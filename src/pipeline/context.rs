//! Pipeline contexts, channels, and handles shared between threads.

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::JoinHandle;

use crate::types::{AnalysisOutcome, AnalysisTask, FileRecord};
use crate::utils::config::{SCAN_CHANNEL_CAP, TASK_CHANNEL_CAP};

/// Sink for UI events emitted from the consumer side. The callback runs on the
/// consumer thread only; keep it fast.
pub type EventSink<'a> = &'a mut dyn FnMut(&crate::types::Event);

/// Shared context for the scan thread.
pub struct ScanContext {
    pub root: PathBuf,
    pub follow_links: bool,
    /// Cooperative cancellation, checked between files (never mid-file).
    pub cancel: Arc<AtomicBool>,
    /// Records per delivered batch; a performance knob, not a correctness one.
    pub batch_size: usize,
}

/// What the scan thread reports when it exits.
#[derive(Clone, Copy, Debug)]
pub struct ScanSummary {
    /// Records sent before exit.
    pub found: usize,
    /// False when the walk stopped early on cancellation.
    pub completed: bool,
}

/// Handles returned by the scan spawn: receive batches, then join.
pub struct ScanHandles {
    pub batch_rx: Receiver<Vec<FileRecord>>,
    pub walk_handle: JoinHandle<ScanSummary>,
}

/// Channels for one analysis run. The task channel is bounded; the outcome channel is
/// unbounded so worker sends never block.
pub struct AnalysisChannels {
    pub task_tx: Sender<AnalysisTask>,
    pub task_rx: Receiver<AnalysisTask>,
    pub outcome_tx: Sender<AnalysisOutcome>,
    pub outcome_rx: Receiver<AnalysisOutcome>,
}

pub fn create_scan_channel() -> (Sender<Vec<FileRecord>>, Receiver<Vec<FileRecord>>) {
    bounded(SCAN_CHANNEL_CAP)
}

pub fn create_analysis_channels() -> AnalysisChannels {
    let (task_tx, task_rx) = bounded::<AnalysisTask>(TASK_CHANNEL_CAP);
    let (outcome_tx, outcome_rx) = unbounded::<AnalysisOutcome>();
    AnalysisChannels {
        task_tx,
        task_rx,
        outcome_tx,
        outcome_rx,
    }
}
