//! Worker pool, event channel, and aggregation tests using fake classifiers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use imgsieve::classifier::{Classifier, Serialized};
use imgsieve::errors::{LoadError, PredictError};
use imgsieve::pipeline::{
    AnalysisParams, create_analysis_channels, run_analysis, spawn_analysis_workers,
};
use imgsieve::types::{
    AnalysisOutcome, AnalysisTask, ClassifierDescriptor, ClassifierOutput, Event, FileRecord,
    OutputKind, StatusTag,
};

// --- helpers ---

fn records(n: usize) -> Vec<FileRecord> {
    (1..=n)
        .map(|i| FileRecord {
            sequence: i,
            name: format!("img{i}.png"),
            path: PathBuf::from(format!("/virtual/img{i}.png")),
            size_bytes: 1024,
            modified_ns: 0,
            score: None,
            status: StatusTag::Unclassified,
        })
        .collect()
}

fn params(threshold: f32, workers: usize) -> AnalysisParams {
    AnalysisParams {
        threshold,
        num_workers: Some(workers),
        cancel: Arc::new(AtomicBool::new(false)),
        shutdown_wait: Duration::from_secs(5),
    }
}

const BINARY_DESC: ClassifierDescriptor = ClassifierDescriptor {
    id: "fake-binary",
    output_kind: OutputKind::Binary,
    labels: None,
};

/// Deterministic binary fake: scores looked up by path.
struct FixedScores {
    scores: HashMap<PathBuf, f32>,
}

impl FixedScores {
    fn for_records(records: &[FileRecord], scores: &[f32]) -> Self {
        let map = records
            .iter()
            .zip(scores)
            .map(|(r, &s)| (r.path.clone(), s))
            .collect();
        Self { scores: map }
    }
}

impl Classifier for FixedScores {
    fn descriptor(&self) -> &ClassifierDescriptor {
        &BINARY_DESC
    }
    fn load(&self) -> Result<(), LoadError> {
        Ok(())
    }
    fn predict(&self, path: &Path) -> Result<ClassifierOutput, PredictError> {
        Ok(ClassifierOutput {
            score: *self.scores.get(path).unwrap_or(&0.0),
            label: None,
        })
    }
}

/// Binary fake that fails on selected paths.
struct FailingOn {
    inner: FixedScores,
    fail: PathBuf,
}

impl Classifier for FailingOn {
    fn descriptor(&self) -> &ClassifierDescriptor {
        &BINARY_DESC
    }
    fn load(&self) -> Result<(), LoadError> {
        Ok(())
    }
    fn predict(&self, path: &Path) -> Result<ClassifierOutput, PredictError> {
        if path == self.fail {
            return Err(PredictError::MissingLabel {
                path: path.to_path_buf(),
            });
        }
        self.inner.predict(path)
    }
}

/// Binary fake for cancellation tests: the first `fast` calls return immediately,
/// later calls block until the shared cancel flag is set. Pins the schedule so the
/// number of processed items is bounded regardless of thread timing.
struct Gated {
    fast: usize,
    calls: AtomicUsize,
    cancel: Arc<AtomicBool>,
    score: f32,
}

impl Classifier for Gated {
    fn descriptor(&self) -> &ClassifierDescriptor {
        &BINARY_DESC
    }
    fn load(&self) -> Result<(), LoadError> {
        Ok(())
    }
    fn predict(&self, _path: &Path) -> Result<ClassifierOutput, PredictError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        while n > self.fast && !self.cancel.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(ClassifierOutput {
            score: self.score,
            label: None,
        })
    }
}

/// Binary fake whose predict never returns: signals entry, then sleeps out the test.
struct Hanging {
    entered: std::sync::mpsc::Sender<()>,
}

impl Classifier for Hanging {
    fn descriptor(&self) -> &ClassifierDescriptor {
        &BINARY_DESC
    }
    fn load(&self) -> Result<(), LoadError> {
        Ok(())
    }
    fn predict(&self, _path: &Path) -> Result<ClassifierOutput, PredictError> {
        let _ = self.entered.send(());
        std::thread::sleep(Duration::from_secs(300));
        Ok(ClassifierOutput {
            score: 0.0,
            label: None,
        })
    }
}

/// Instrumented fake counting concurrent predict entries.
#[derive(Default)]
struct Counters {
    current: AtomicUsize,
    max_seen: AtomicUsize,
}

struct Counting {
    counters: Arc<Counters>,
    delay: Duration,
}

impl Counting {
    fn new(delay: Duration) -> (Self, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        (
            Self {
                counters: Arc::clone(&counters),
                delay,
            },
            counters,
        )
    }
}

impl Classifier for Counting {
    fn descriptor(&self) -> &ClassifierDescriptor {
        &BINARY_DESC
    }
    fn load(&self) -> Result<(), LoadError> {
        Ok(())
    }
    fn predict(&self, _path: &Path) -> Result<ClassifierOutput, PredictError> {
        let now = self.counters.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_seen.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.counters.current.fetch_sub(1, Ordering::SeqCst);
        Ok(ClassifierOutput {
            score: 0.5,
            label: None,
        })
    }
}

const LABEL_SET: [&str; 3] = ["cat", "dog", "bird"];
const LABEL_DESC: ClassifierDescriptor = ClassifierDescriptor {
    id: "fake-labels",
    output_kind: OutputKind::MultiClass,
    labels: Some(&LABEL_SET),
};

/// Multi-class fake: label chosen by record sequence embedded in the file name.
struct Labeler;

impl Classifier for Labeler {
    fn descriptor(&self) -> &ClassifierDescriptor {
        &LABEL_DESC
    }
    fn load(&self) -> Result<(), LoadError> {
        Ok(())
    }
    fn predict(&self, path: &Path) -> Result<ClassifierOutput, PredictError> {
        let digits: String = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        let i: usize = digits.parse().unwrap_or(0);
        Ok(ClassifierOutput {
            score: 0.9,
            label: Some(LABEL_SET[i % LABEL_SET.len()].to_string()),
        })
    }
}

/// Multi-class fake that violates its contract by returning no label.
struct NoLabel;

impl Classifier for NoLabel {
    fn descriptor(&self) -> &ClassifierDescriptor {
        &LABEL_DESC
    }
    fn load(&self) -> Result<(), LoadError> {
        Ok(())
    }
    fn predict(&self, _path: &Path) -> Result<ClassifierOutput, PredictError> {
        Ok(ClassifierOutput {
            score: 0.9,
            label: None,
        })
    }
}

// --- scenario tests ---

#[test]
fn test_scenario_fixed_scores_against_threshold() {
    let mut recs = records(5);
    let scores = [0.9, 0.2, 0.75, 0.1, 0.5];
    let classifier = Arc::new(FixedScores::for_records(&recs, &scores));
    let p = params(0.7, 4);

    let report = run_analysis(&mut recs, classifier, &p, &mut |_| {});

    let expected = [true, false, true, false, false];
    for (rec, want) in recs.iter().zip(expected) {
        assert_eq!(rec.status, StatusTag::Binary(want), "{}", rec.name);
    }
    assert_eq!(report.total, 5);
    assert_eq!(report.processed, 5);
    assert_eq!(report.flagged, 2);
    assert_eq!(report.clean, 3);
    assert_eq!(report.bad, 0);
    assert!(!report.cancelled);
}

#[test]
fn test_scenario_one_failing_item_is_isolated() {
    let mut recs = records(3);
    let fail = recs[1].path.clone();
    let classifier = Arc::new(FailingOn {
        inner: FixedScores::for_records(&recs, &[0.9, 0.9, 0.9]),
        fail,
    });
    let p = params(0.5, 2);

    let report = run_analysis(&mut recs, classifier, &p, &mut |_| {});

    assert_eq!(recs[0].status, StatusTag::Binary(true));
    assert_eq!(recs[1].status, StatusTag::Bad);
    assert_eq!(recs[1].score, Some(0.0));
    assert_eq!(recs[2].status, StatusTag::Binary(true));
    assert_eq!(report.total, 3);
    assert_eq!(report.bad, 1);
    assert_eq!(report.flagged + report.clean + report.bad, report.total);
}

#[test]
fn test_scenario_cancellation_mid_run() {
    let mut recs = records(10);
    let p = params(0.5, 2);
    let cancel = Arc::clone(&p.cancel);
    // Calls beyond the first two block until the flag is set, so the workers cannot
    // race through the queue before the consumer reacts to Progress(2).
    let classifier = Arc::new(Gated {
        fast: 2,
        calls: AtomicUsize::new(0),
        cancel: Arc::clone(&cancel),
        score: 0.9,
    });

    let report = run_analysis(&mut recs, classifier, &p, &mut |event| {
        if let Event::Progress(n) = event
            && *n >= 2
        {
            cancel.store(true, Ordering::Relaxed);
        }
    });

    assert!(report.cancelled);
    assert!(report.processed >= 2);
    // Two fast tasks plus at most one gated task per worker.
    assert!(report.processed <= 4, "processed {}", report.processed);
    assert_eq!(report.flagged + report.clean + report.bad, report.processed);
    // Unprocessed records keep their pre-run status.
    let untouched = recs
        .iter()
        .filter(|r| r.status == StatusTag::Unclassified)
        .count();
    assert_eq!(untouched, 10 - report.processed);
}

#[test]
fn test_hung_predict_does_not_block_cancelled_shutdown() {
    let mut recs = records(4);
    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let classifier = Arc::new(Hanging {
        entered: entered_tx,
    });
    let p = AnalysisParams {
        threshold: 0.5,
        num_workers: Some(2),
        cancel: Arc::new(AtomicBool::new(false)),
        shutdown_wait: Duration::from_millis(200),
    };
    let cancel = Arc::clone(&p.cancel);
    let watcher = std::thread::spawn(move || {
        entered_rx.recv().unwrap();
        cancel.store(true, Ordering::Relaxed);
    });

    let start = std::time::Instant::now();
    let report = run_analysis(&mut recs, classifier, &p, &mut |_| {});

    // The bounded wait fires twice (consumer drain, then the pool join); either way
    // the run must return long before the hung predicts would.
    assert!(start.elapsed() < Duration::from_secs(30));
    assert!(report.cancelled);
    assert_eq!(report.processed, 0);
    assert!(recs.iter().all(|r| r.status == StatusTag::Unclassified));
    watcher.join().unwrap();
}

#[test]
fn test_join_with_timeout_reports_overrun() {
    let channels = create_analysis_channels();
    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let classifier = Arc::new(Hanging {
        entered: entered_tx,
    });
    let pool = spawn_analysis_workers(
        channels.task_rx,
        &channels.outcome_tx,
        classifier,
        Arc::new(AtomicBool::new(false)),
        1,
    );
    drop(channels.outcome_tx);
    channels
        .task_tx
        .send(AnalysisTask {
            path: PathBuf::from("/virtual/hang.png"),
            threshold: 0.5,
        })
        .unwrap();

    entered_rx.recv().unwrap();
    assert_eq!(pool.in_flight(), 1);
    assert!(!pool.join_with_timeout(Duration::from_millis(100)));
}

// --- property tests ---

#[test]
fn test_every_item_produces_exactly_one_update() {
    let n = 37;
    let mut recs = records(n);
    let scores: Vec<f32> = (0..n).map(|i| (i % 10) as f32 / 10.0).collect();
    let classifier = Arc::new(FixedScores::for_records(&recs, &scores));
    let p = params(0.5, 8);

    let mut updates: HashMap<PathBuf, usize> = HashMap::new();
    let mut max_progress = 0usize;
    let mut complete_events = 0usize;
    let report = run_analysis(&mut recs, classifier, &p, &mut |event| match event {
        Event::UpdateItem { path, .. } => *updates.entry(path.clone()).or_insert(0) += 1,
        Event::Progress(k) => {
            assert!(*k > max_progress, "progress must be monotonic");
            max_progress = *k;
        }
        Event::AnalysisComplete => complete_events += 1,
        _ => {}
    });

    assert_eq!(updates.len(), n);
    assert!(updates.values().all(|&c| c == 1));
    assert_eq!(max_progress, n);
    assert_eq!(complete_events, 1);
    assert_eq!(report.processed, n);
}

#[test]
fn test_empty_snapshot_completes_immediately() {
    let mut recs = records(0);
    let classifier = Arc::new(FixedScores {
        scores: HashMap::new(),
    });
    let p = params(0.5, 4);

    let mut saw_complete = false;
    let report = run_analysis(&mut recs, classifier, &p, &mut |event| {
        if matches!(event, Event::AnalysisComplete) {
            saw_complete = true;
        }
    });

    assert!(saw_complete);
    assert_eq!(report.total, 0);
    assert_eq!(report.processed, 0);
    assert!(!report.cancelled);
}

#[test]
fn test_concurrency_bound_respected() {
    let mut recs = records(32);
    let (counting, counters) = Counting::new(Duration::from_millis(5));
    let p = params(0.5, 4);

    let report = run_analysis(&mut recs, Arc::new(counting), &p, &mut |_| {});

    assert_eq!(report.processed, 32);
    let max = counters.max_seen.load(Ordering::SeqCst);
    assert!(max <= 4, "observed {max} concurrent predicts");
    assert!(max >= 1);
}

#[test]
fn test_serialized_backend_never_runs_concurrently() {
    let mut recs = records(16);
    let (counting, counters) = Counting::new(Duration::from_millis(2));
    let p = params(0.5, 4);

    let report = run_analysis(&mut recs, Arc::new(Serialized::new(counting)), &p, &mut |_| {});

    assert_eq!(report.processed, 16);
    assert_eq!(counters.max_seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_reclassification_is_idempotent() {
    let scores = [0.81, 0.3, 0.79, 0.99];
    let run = || {
        let mut recs = records(4);
        let classifier = Arc::new(FixedScores::for_records(&recs, &scores));
        let p = params(0.8, 3);
        run_analysis(&mut recs, classifier, &p, &mut |_| {});
        recs.into_iter().map(|r| r.status).collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_multiclass_statuses_come_from_label_set() {
    let mut recs = records(9);
    let classifier = Arc::new(Labeler);
    let p = params(0.5, 4);

    let report = run_analysis(&mut recs, classifier, &p, &mut |_| {});

    for rec in &recs {
        match &rec.status {
            StatusTag::Label(name) => assert!(LABEL_SET.contains(&name.as_str())),
            other => panic!("expected label status, got {other:?}"),
        }
    }
    assert_eq!(report.flagged, 0);
    assert_eq!(report.clean, 0);
    assert_eq!(report.label_counts.values().sum::<usize>(), 9);
}

#[test]
fn test_multiclass_without_label_becomes_bad() {
    let mut recs = records(2);
    let classifier = Arc::new(NoLabel);
    let p = params(0.5, 2);

    let report = run_analysis(&mut recs, classifier, &p, &mut |_| {});

    assert_eq!(report.bad, 2);
    assert!(recs.iter().all(|r| r.status == StatusTag::Bad));
}

// --- run_task unit-level checks through the public surface ---

#[test]
fn test_run_task_records_elapsed_and_error() {
    let recs = records(1);
    let classifier = FailingOn {
        inner: FixedScores::for_records(&recs, &[0.9]),
        fail: recs[0].path.clone(),
    };
    let task = AnalysisTask {
        path: recs[0].path.clone(),
        threshold: 0.5,
    };
    let outcome: AnalysisOutcome = imgsieve::pipeline::run_task(&classifier, &task);
    assert_eq!(outcome.status, StatusTag::Bad);
    assert_eq!(outcome.score, 0.0);
    assert!(outcome.error.is_some());
    assert!(outcome.elapsed_ms >= 0.0);
}

#[test]
fn test_outcomes_locate_records_by_path_not_position() {
    // Shuffled record order must not matter: statuses land on the right paths.
    let mut recs = records(6);
    recs.reverse();
    let scores = [0.9, 0.1, 0.9, 0.1, 0.9, 0.1];
    let classifier = Arc::new(FixedScores::for_records(&recs, &scores));
    let p = params(0.5, 3);
    run_analysis(&mut recs, classifier, &p, &mut |_| {});

    for (i, rec) in recs.iter().enumerate() {
        let want = scores[i] >= 0.5;
        assert_eq!(rec.status, StatusTag::Binary(want), "{}", rec.name);
    }
}

// --- events carry usable display data ---

#[test]
fn test_update_events_match_final_record_state() {
    let mut recs = records(4);
    let scores = [0.9, 0.2, 0.8, 0.1];
    let classifier = Arc::new(FixedScores::for_records(&recs, &scores));
    let p = params(0.5, 2);

    let mut seen: HashMap<PathBuf, (f32, StatusTag)> = HashMap::new();
    run_analysis(&mut recs, classifier, &p, &mut |event| {
        if let Event::UpdateItem {
            path,
            score,
            status,
        } = event
        {
            seen.insert(path.clone(), (*score, status.clone()));
        }
    });

    for rec in &recs {
        let (score, status) = seen.get(&rec.path).expect("event for every record");
        assert_eq!(Some(*score), rec.score);
        assert_eq!(status, &rec.status);
    }
}
