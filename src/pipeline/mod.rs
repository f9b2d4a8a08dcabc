//! Pipeline components: scanner, worker pool, event consumer, aggregation.

pub mod aggregate;
pub mod context;
pub mod dispatch;
pub mod orchestrator;
pub mod scanner;

pub use aggregate::{Aggregator, render_report, run_consumer_loop};
pub use context::{
    AnalysisChannels, EventSink, ScanContext, ScanHandles, ScanSummary, create_analysis_channels,
    create_scan_channel,
};
pub use dispatch::{
    WorkerPool, derive_status, dispatch_tasks, run_task, spawn_analysis_workers, spawn_dispatcher,
};
pub use orchestrator::{AnalysisParams, run_analysis, run_scan};
pub use scanner::{collect_records, is_supported_image, run_scan_loop, spawn_scan_thread};
