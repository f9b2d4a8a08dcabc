//! Single event consumer and run aggregation.
//!
//! The consumer loop is the only writer of final record status/score and the sole
//! owner of the progress counter; workers only ever send outcomes on the channel.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::context::EventSink;
use crate::types::{AnalysisOutcome, Event, FileRecord, RunReport, StatusTag};
use crate::utils::config::SHUTDOWN_POLL;

/// Accumulates per-status counts and wall-clock time for one run.
pub struct Aggregator {
    started: Instant,
    total: usize,
    processed: usize,
    flagged: usize,
    clean: usize,
    bad: usize,
    label_counts: BTreeMap<String, usize>,
}

impl Aggregator {
    pub fn new(total: usize) -> Self {
        Self {
            started: Instant::now(),
            total,
            processed: 0,
            flagged: 0,
            clean: 0,
            bad: 0,
            label_counts: BTreeMap::new(),
        }
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn observe(&mut self, outcome: &AnalysisOutcome) {
        self.processed += 1;
        match &outcome.status {
            StatusTag::Binary(true) => self.flagged += 1,
            StatusTag::Binary(false) => self.clean += 1,
            StatusTag::Label(name) => *self.label_counts.entry(name.clone()).or_insert(0) += 1,
            StatusTag::Bad => self.bad += 1,
            StatusTag::Unclassified => {}
        }
    }

    pub fn finalize(self, cancelled: bool) -> RunReport {
        RunReport {
            total: self.total,
            processed: self.processed,
            flagged: self.flagged,
            clean: self.clean,
            label_counts: self.label_counts,
            bad: self.bad,
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
            cancelled,
        }
    }
}

/// Drain outcomes until every worker sender is gone, updating records (located by
/// path, never by position) and streaming UI events.
///
/// After cancellation is observed, draining is bounded by `shutdown_wait`: in-flight
/// tasks get that long to deliver their outcome, then the loop gives up so a hung
/// `predict` cannot block the run forever.
pub fn run_consumer_loop(
    outcome_rx: Receiver<AnalysisOutcome>,
    records: &mut [FileRecord],
    aggregator: &mut Aggregator,
    cancel: &AtomicBool,
    shutdown_wait: Duration,
    emit: EventSink<'_>,
) {
    let index: HashMap<PathBuf, usize> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (r.path.clone(), i))
        .collect();
    let total = records.len();
    let mut drain_deadline: Option<Instant> = None;

    loop {
        let outcome = match outcome_rx.recv_timeout(SHUTDOWN_POLL) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if cancel.load(Ordering::Relaxed) {
            let deadline = *drain_deadline.get_or_insert_with(|| Instant::now() + shutdown_wait);
            if outcome.is_none() && Instant::now() >= deadline {
                log::warn!("cancelled run did not drain within {:?}", shutdown_wait);
                break;
            }
        }
        let Some(outcome) = outcome else { continue };

        if let Some(&i) = index.get(&outcome.path) {
            records[i].score = Some(outcome.score);
            records[i].status = outcome.status.clone();
        } else {
            log::warn!("outcome for unknown path {}", outcome.path.display());
        }
        aggregator.observe(&outcome);

        emit(&Event::UpdateItem {
            path: outcome.path.clone(),
            score: outcome.score,
            status: outcome.status.clone(),
        });
        let name = outcome
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| outcome.path.display().to_string());
        match &outcome.error {
            Some(err) => emit(&Event::Log(format!(
                "{}: {:.1} ms | BAD: {}",
                name, outcome.elapsed_ms, err
            ))),
            None => emit(&Event::Log(format!(
                "{}: {:.1} ms | {:.4} {}",
                name, outcome.elapsed_ms, outcome.score, outcome.status
            ))),
        }
        emit(&Event::Progress(aggregator.processed()));
        emit(&Event::Status(format!(
            "Analyzing... ({} / {})",
            aggregator.processed(),
            total
        )));
    }
}

/// Render the end-of-run summary table.
pub fn render_report(report: &RunReport) -> String {
    let mut rows: Vec<(String, usize)> = vec![("Total".to_string(), report.total)];
    if report.flagged > 0 || report.clean > 0 || report.label_counts.is_empty() {
        rows.push(("Flagged".to_string(), report.flagged));
        rows.push(("Clean".to_string(), report.clean));
    }
    for (label, count) in &report.label_counts {
        rows.push((label.clone(), *count));
    }
    rows.push(("Bad".to_string(), report.bad));

    let mut out = String::from("\nResults\n┌──────────────────┬────────────┐\n");
    for (name, count) in rows {
        out.push_str(&format!("│ {:<16} │ {:<10} │\n", name, count));
    }
    out.push_str("└──────────────────┴────────────┘\n");
    out.push_str(&format!("Elapsed: {:.2} s\n", report.elapsed_seconds));
    if report.cancelled {
        out.push_str(&format!(
            "Cancelled after {} of {} items\n",
            report.processed, report.total
        ));
    }
    out
}
