//! Run-state controller: the single writer of the scan/analyze state machine.
//!
//! Lifecycle: `Idle → Scanning → Ready → Analyzing → {Completed, Cancelled} → Ready`.
//! The controller owns the record set, the active classifier handle (passed by
//! reference into the pool; no global model state), and the cancellation flag.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Result;
use crate::classifier::{BackendId, Classifier};
use crate::pipeline::{AnalysisParams, ScanSummary, run_analysis, run_scan};
use crate::types::{Event, FileRecord, RunReport};
use crate::utils::config::SHUTDOWN_WAIT;

/// Process-wide run state. Transitions happen only through [`RunController`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Scanning,
    Ready,
    Analyzing,
    Cancelling,
}

impl RunState {
    /// A scan may start from Idle or Ready; re-entering while analyzing is rejected.
    pub fn may_start_scan(self) -> bool {
        matches!(self, RunState::Idle | RunState::Ready)
    }

    /// Analyzing may only be entered from Ready.
    pub fn may_start_analysis(self) -> bool {
        self == RunState::Ready
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Scanning => "scanning",
            RunState::Ready => "ready",
            RunState::Analyzing => "analyzing",
            RunState::Cancelling => "cancelling",
        };
        write!(f, "{s}")
    }
}

/// Owns one scan-then-analyze cycle at a time.
pub struct RunController {
    state: RunState,
    records: Vec<FileRecord>,
    classifier: Option<Arc<dyn Classifier>>,
    cancel: Arc<AtomicBool>,
}

impl RunController {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            records: Vec::new(),
            classifier: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// Shared cancellation flag; give this to a signal handler. Setting it stops new
    /// task launches; in-flight tasks complete.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn request_cancel(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if self.state == RunState::Analyzing {
            self.state = RunState::Cancelling;
        }
    }

    /// Enumerate image files under `root`, replacing any previous record set (a rescan
    /// is a full reset). Defensively rejected unless Idle or Ready. An interrupted walk
    /// is not an error; the summary reports `completed: false` and the partial record
    /// set is kept, so callers can decide whether to analyze what was found.
    pub fn scan<F>(
        &mut self,
        root: &Path,
        follow_links: bool,
        on_event: Option<F>,
    ) -> Result<ScanSummary>
    where
        F: FnMut(&Event),
    {
        if !self.state.may_start_scan() {
            anyhow::bail!("cannot start a scan while {}", self.state);
        }
        self.state = RunState::Scanning;
        self.cancel.store(false, Ordering::Relaxed);

        let mut sink = into_sink(on_event);
        let result = run_scan(root, follow_links, Arc::clone(&self.cancel), &mut *sink);
        match result {
            Ok((records, completed)) => {
                self.records = records;
                self.state = RunState::Ready;
                Ok(ScanSummary {
                    found: self.records.len(),
                    completed,
                })
            }
            Err(e) => {
                self.state = RunState::Idle;
                Err(e)
            }
        }
    }

    /// Select and load a backend. Tears down the previous classifier's in-memory model
    /// before loading the new one. A failed load leaves no usable classifier, so a run
    /// cannot start.
    pub fn select_backend(&mut self, id: BackendId) -> Result<()> {
        if self.state == RunState::Analyzing || self.state == RunState::Cancelling {
            anyhow::bail!("cannot switch backends while {}", self.state);
        }
        self.classifier = None;
        let classifier = id.build();
        classifier.load()?;
        log::debug!("backend `{}` ready", id);
        self.classifier = Some(classifier);
        Ok(())
    }

    /// Analyze the current record snapshot. Only permitted from Ready with a loaded
    /// classifier, a threshold in [0,1], and no pending cancellation: a cancel
    /// requested since the scan (Ctrl+C between the phases, say) refuses the run
    /// instead of being silently cleared. Starting a new scan resets the flag.
    /// Returns to Ready whether the run completed or was cancelled.
    pub fn analyze<F>(
        &mut self,
        threshold: f32,
        num_workers: Option<usize>,
        on_event: Option<F>,
    ) -> Result<RunReport>
    where
        F: FnMut(&Event),
    {
        if !self.state.may_start_analysis() {
            anyhow::bail!("cannot start analysis while {}", self.state);
        }
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("threshold {} outside [0,1]", threshold);
        }
        if self.cancel.load(Ordering::Relaxed) {
            anyhow::bail!("cancellation requested; start a new scan before analyzing");
        }
        let classifier = self
            .classifier
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| anyhow::anyhow!("no backend selected; call select_backend first"))?;

        self.state = RunState::Analyzing;
        let params = AnalysisParams {
            threshold,
            num_workers,
            cancel: Arc::clone(&self.cancel),
            shutdown_wait: SHUTDOWN_WAIT,
        };

        let mut sink = into_sink(on_event);
        let report = run_analysis(&mut self.records, classifier, &params, &mut *sink);

        // Drained: both the completed and the cancelled paths land back in Ready.
        // A cancelled run's flag is acknowledged here so the next run can start.
        if report.cancelled {
            self.cancel.store(false, Ordering::Relaxed);
        }
        self.state = RunState::Ready;
        Ok(report)
    }
}

impl Default for RunController {
    fn default() -> Self {
        Self::new()
    }
}

fn into_sink<'a, F>(on_event: Option<F>) -> Box<dyn FnMut(&Event) + 'a>
where
    F: FnMut(&Event) + 'a,
{
    match on_event {
        Some(f) => Box::new(f),
        None => Box::new(|_| {}),
    }
}
