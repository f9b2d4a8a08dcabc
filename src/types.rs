//! Public and internal types for the imgsieve API and pipeline.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::classifier::BackendId;

/// One image file found by the scanner.
///
/// Created by the scanner with `status = Unclassified`; `score` and `status` are written
/// only by the event consumer after analysis, never by workers. Uniquely identified by
/// `path` within a run.
#[derive(Clone, Debug)]
pub struct FileRecord {
    /// 1-based discovery order within the scan.
    pub sequence: usize,
    /// File name without directory components.
    pub name: String,
    /// Absolute path; the key used by the consumer to locate this record.
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Modification time in nanoseconds since epoch.
    pub modified_ns: i64,
    /// Raw backend score, once classified.
    pub score: Option<f32>,
    pub status: StatusTag,
}

/// Classification status of a record.
///
/// Exactly one interpretation is active per run, determined by the selected backend's
/// [`OutputKind`]: Binary-kind backends produce `Binary`, multi-class backends produce
/// `Label`. `Bad` marks a file that could not be scored (decode failure etc.).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusTag {
    Unclassified,
    /// Binary verdict: `true` when `score >= threshold`.
    Binary(bool),
    /// Arg-max label from the backend's fixed taxonomy, verbatim.
    Label(String),
    /// Could not be scored; counts toward `bad`, not toward flagged/clean.
    Bad,
}

impl StatusTag {
    /// Short row tag for the UI layer (used for coloring).
    pub fn tag(&self) -> &'static str {
        match self {
            StatusTag::Unclassified => "unclassified",
            StatusTag::Binary(true) => "flagged",
            StatusTag::Binary(false) => "clean",
            StatusTag::Label(_) => "label",
            StatusTag::Bad => "bad",
        }
    }
}

impl fmt::Display for StatusTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusTag::Unclassified => write!(f, ""),
            StatusTag::Binary(true) => write!(f, "✓"),
            StatusTag::Binary(false) => write!(f, "✗"),
            StatusTag::Label(name) => write!(f, "{name}"),
            StatusTag::Bad => write!(f, "BAD"),
        }
    }
}

/// How a backend's output is interpreted when deriving a [`StatusTag`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputKind {
    /// `score` is compared against the user threshold.
    Binary,
    /// `label` is the arg-max class from a fixed label set; threshold is ignored.
    MultiClass,
}

/// Immutable description of a loaded backend.
#[derive(Clone, Debug)]
pub struct ClassifierDescriptor {
    pub id: &'static str,
    pub output_kind: OutputKind,
    /// Fixed, ordered label set for multi-class backends; `None` for binary ones.
    pub labels: Option<&'static [&'static str]>,
}

/// Raw result of one `predict` call, before status derivation.
#[derive(Clone, Debug)]
pub struct ClassifierOutput {
    pub score: f32,
    pub label: Option<String>,
}

/// One unit of work for the pool: ephemeral, exclusively owned by a worker until it
/// produces an [`AnalysisOutcome`].
#[derive(Clone, Debug)]
pub struct AnalysisTask {
    pub path: PathBuf,
    /// Decision threshold in [0,1]; meaningful only for binary-kind backends.
    pub threshold: f32,
}

/// Result of one task, sent from a worker to the consumer.
#[derive(Clone, Debug)]
pub struct AnalysisOutcome {
    pub path: PathBuf,
    pub score: f32,
    pub status: StatusTag,
    pub elapsed_ms: f32,
    /// Present when the item failed (status is `Bad`).
    pub error: Option<String>,
}

/// Messages streamed to the caller's event callback. Consumed by exactly one consumer
/// loop; the UI layer never touches pipeline state directly.
#[derive(Clone, Debug)]
pub enum Event {
    /// Scan finished naturally; N files found. Never emitted on a cancelled scan.
    ScanComplete(usize),
    /// One file's result is ready.
    UpdateItem {
        path: PathBuf,
        score: f32,
        status: StatusTag,
    },
    /// Monotonic processed counter, owned by the consumer.
    Progress(usize),
    /// Human-readable status line.
    Status(String),
    /// Free-form diagnostic line.
    Log(String),
    /// Run finished (success or cancelled). Terminal for the run.
    AnalysisComplete,
}

/// Aggregate report for one analysis run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunReport {
    /// Size of the frozen task snapshot.
    pub total: usize,
    /// Outcomes observed by the consumer. Equal to `total` for completed runs.
    pub processed: usize,
    /// Binary positives (`score >= threshold`).
    pub flagged: usize,
    /// Binary negatives.
    pub clean: usize,
    /// Per-label counts for multi-class runs.
    pub label_counts: BTreeMap<String, usize>,
    /// Files that could not be scored.
    pub bad: usize,
    pub elapsed_seconds: f64,
    pub cancelled: bool,
}

/// Options for [`classify_dir`](crate::classify_dir) and the controller.
#[derive(Clone, Debug)]
pub struct Opts {
    /// Backend resolved once at selection time into a concrete classifier.
    pub backend: BackendId,
    /// Decision threshold in [0,1] for binary-kind backends.
    pub threshold: f32,
    /// Override worker thread count. When None, `min(16, available cores)`.
    pub num_workers: Option<usize>,
    /// Follow symbolic links during the scan.
    pub follow_links: bool,
    /// Show progress bar and per-item log lines (CLI).
    pub verbose: bool,
    /// Print the final report as JSON instead of the table (CLI).
    pub json: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            backend: BackendId::Skin,
            threshold: crate::utils::config::DEFAULT_THRESHOLD,
            num_workers: None,
            follow_links: false,
            verbose: false,
            json: false,
        }
    }
}
