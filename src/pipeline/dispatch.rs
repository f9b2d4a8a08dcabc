//! Worker pool and task dispatch for the analysis phase.
//!
//! The pool guarantees: tasks launched ≤ snapshot size; exactly one outcome per
//! launched task, never two; no task failure aborts the pool. Cancellation is
//! advisory, checked before each dispatch and at the top of each task body; tasks
//! already running are allowed to finish.

use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::classifier::Classifier;
use crate::errors::PredictError;
use crate::types::{
    AnalysisOutcome, AnalysisTask, ClassifierDescriptor, ClassifierOutput, OutputKind, StatusTag,
};
use crate::utils::config::SHUTDOWN_POLL;

/// Running pool: worker thread handles plus the in-flight task gauge.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    in_flight: Arc<AtomicUsize>,
}

/// Spawn `num_workers` analysis workers reading tasks from `task_rx` and sending one
/// outcome per executed task on `outcome_tx`. Workers exit when the task channel
/// closes. The classifier must be loaded before the first task arrives.
pub fn spawn_analysis_workers(
    task_rx: Receiver<AnalysisTask>,
    outcome_tx: &Sender<AnalysisOutcome>,
    classifier: Arc<dyn Classifier>,
    cancel: Arc<AtomicBool>,
    num_workers: usize,
) -> WorkerPool {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let handles = (0..num_workers)
        .map(|_| {
            let task_rx = task_rx.clone();
            let outcome_tx = outcome_tx.clone();
            let classifier = Arc::clone(&classifier);
            let cancel = Arc::clone(&cancel);
            let in_flight = Arc::clone(&in_flight);
            thread::spawn(move || {
                analysis_worker_loop(task_rx, outcome_tx, classifier, cancel, in_flight)
            })
        })
        .collect();
    WorkerPool { handles, in_flight }
}

fn analysis_worker_loop(
    task_rx: Receiver<AnalysisTask>,
    outcome_tx: Sender<AnalysisOutcome>,
    classifier: Arc<dyn Classifier>,
    cancel: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
) {
    while let Ok(task) = task_rx.recv() {
        if cancel.load(Ordering::Relaxed) {
            // Not launched: skip and emit nothing.
            continue;
        }
        in_flight.fetch_add(1, Ordering::SeqCst);
        let outcome = run_task(&*classifier, &task);
        let _ = outcome_tx.send(outcome);
        in_flight.fetch_sub(1, Ordering::SeqCst);
    }
    drop(outcome_tx);
}

/// Execute one task: predict, derive status, isolate failures as `Bad`.
pub fn run_task(classifier: &dyn Classifier, task: &AnalysisTask) -> AnalysisOutcome {
    let start = Instant::now();
    let result = classifier
        .predict(&task.path)
        .and_then(|out| derive_status(classifier.descriptor(), &out, task).map(|s| (out, s)));
    let elapsed_ms = start.elapsed().as_secs_f32() * 1000.0;
    match result {
        Ok((out, status)) => AnalysisOutcome {
            path: task.path.clone(),
            score: out.score,
            status,
            elapsed_ms,
            error: None,
        },
        Err(err) => AnalysisOutcome {
            path: task.path.clone(),
            score: 0.0,
            status: StatusTag::Bad,
            elapsed_ms,
            error: Some(err.to_string()),
        },
    }
}

/// Derive the record status from a backend output per the active output kind:
/// Binary compares against the task threshold, MultiClass takes the label verbatim.
pub fn derive_status(
    descriptor: &ClassifierDescriptor,
    out: &ClassifierOutput,
    task: &AnalysisTask,
) -> Result<StatusTag, PredictError> {
    match descriptor.output_kind {
        OutputKind::Binary => Ok(StatusTag::Binary(out.score >= task.threshold)),
        OutputKind::MultiClass => out
            .label
            .clone()
            .map(StatusTag::Label)
            .ok_or(PredictError::MissingLabel {
                path: task.path.clone(),
            }),
    }
}

/// Feed the frozen snapshot into the task channel, stopping once cancellation is
/// observed. Returns the number of tasks sent. Drops its sender when done so workers
/// exit after draining.
pub fn dispatch_tasks(
    tasks: Vec<AnalysisTask>,
    task_tx: Sender<AnalysisTask>,
    cancel: Arc<AtomicBool>,
) -> usize {
    let mut sent = 0usize;
    for task in tasks {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        if task_tx.send(task).is_err() {
            break;
        }
        sent += 1;
    }
    drop(task_tx);
    sent
}

pub fn spawn_dispatcher(
    tasks: Vec<AnalysisTask>,
    task_tx: Sender<AnalysisTask>,
    cancel: Arc<AtomicBool>,
) -> JoinHandle<usize> {
    thread::spawn(move || dispatch_tasks(tasks, task_tx, cancel))
}

impl WorkerPool {
    /// Tasks currently executing (not queued, not skipped).
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Join the workers, waiting at most `timeout` overall. Returns false when the
    /// bound was exceeded; remaining threads are detached and the overrun is logged.
    pub fn join_with_timeout(self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        for handle in &self.handles {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    log::warn!(
                        "shutdown wait exceeded; {} tasks still in flight",
                        self.in_flight.load(Ordering::SeqCst)
                    );
                    return false;
                }
                thread::sleep(SHUTDOWN_POLL);
            }
        }
        for handle in self.handles {
            let _ = handle.join();
        }
        true
    }
}
