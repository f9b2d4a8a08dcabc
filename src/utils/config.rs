//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::time::Duration;

// ---- Scanner ----

/// File extensions the scanner considers images. Matched case-insensitively.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// Records per batch delivered by the scan thread. Bounds memory pressure on the
/// consumer side; any batch size ≤ total produces the same final record set.
pub const SCAN_BATCH_SIZE: usize = 100;

/// Capacity of the batch channel between the scan thread and the collector.
pub const SCAN_CHANNEL_CAP: usize = 8;

// ---- Worker pool ----

/// Worker-count policy for the analysis pool.
pub struct WorkerLimits;

impl WorkerLimits {
    /// Hard ceiling on analysis workers regardless of core count.
    pub const MAX_WORKERS: usize = 16;

    /// Effective worker count: the override when given, otherwise
    /// `min(MAX_WORKERS, available threads)`, never below 1.
    pub fn effective(num_workers: Option<usize>) -> usize {
        num_workers
            .unwrap_or_else(|| Self::MAX_WORKERS.min(rayon::current_num_threads()))
            .max(1)
    }
}

/// Capacity of the task channel feeding the pool.
pub const TASK_CHANNEL_CAP: usize = 1024;

/// Bounded wait for in-flight tasks when shutting the pool down. Exceeding it is
/// logged, not fatal.
pub const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

/// Poll interval while waiting on worker threads during shutdown.
pub const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

// ---- Classification ----

/// Default decision threshold for binary-kind backends.
pub const DEFAULT_THRESHOLD: f32 = 0.8;

// ---- Config file ----

/// Per-directory config file name read by the CLI.
pub const CONFIG_FILENAME: &str = ".imgsieve.toml";
