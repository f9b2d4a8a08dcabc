//! Directory scanner: walks the tree and produces [`FileRecord`] batches.
//!
//! Per-file metadata errors are logged and the file is skipped; they never abort the
//! scan. Cancellation is checked between files. Batches bound consumer-side memory;
//! the final record set is identical for any batch size.

use crossbeam_channel::Sender;
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

use super::context::{EventSink, ScanContext, ScanHandles, ScanSummary, create_scan_channel};
use crate::types::{Event, FileRecord, StatusTag};
use crate::utils::config::SUPPORTED_EXTENSIONS;

/// True when `path` has a supported image extension (case-insensitive).
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| ext.eq_ignore_ascii_case(s))
        })
}

fn record_for(path: &Path, sequence: usize, meta: &std::fs::Metadata) -> FileRecord {
    let modified_ns = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    FileRecord {
        sequence,
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: path.to_path_buf(),
        size_bytes: meta.len(),
        modified_ns,
        score: None,
        status: StatusTag::Unclassified,
    }
}

pub fn spawn_scan_thread(batch_tx: Sender<Vec<FileRecord>>, ctx: ScanContext) -> JoinHandle<ScanSummary> {
    thread::spawn(move || run_scan_loop(batch_tx, &ctx))
}

/// Walk `ctx.root`, filter to supported images, and send records in batches of
/// `ctx.batch_size`. Stops (without a terminal batch marker) when cancellation is
/// observed; the caller infers an interrupted scan from the returned summary.
pub fn run_scan_loop(batch_tx: Sender<Vec<FileRecord>>, ctx: &ScanContext) -> ScanSummary {
    let mut found = 0usize;
    let mut batch: Vec<FileRecord> = Vec::with_capacity(ctx.batch_size);

    for entry in WalkDir::new(&ctx.root).follow_links(ctx.follow_links) {
        if ctx.cancel.load(std::sync::atomic::Ordering::Relaxed) {
            log::debug!("scan interrupted after {} files", found);
            return ScanSummary {
                found,
                completed: false,
            };
        }
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                log::warn!("scan: skipping entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_supported_image(entry.path()) {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                log::warn!("scan: skipping {}: {}", entry.path().display(), err);
                continue;
            }
        };
        found += 1;
        batch.push(record_for(entry.path(), found, &meta));
        if batch.len() >= ctx.batch_size {
            if batch_tx
                .send(std::mem::replace(
                    &mut batch,
                    Vec::with_capacity(ctx.batch_size),
                ))
                .is_err()
            {
                // Receiver went away; treat like cancellation.
                return ScanSummary {
                    found,
                    completed: false,
                };
            }
        }
    }

    if !batch.is_empty() {
        let _ = batch_tx.send(batch);
    }
    ScanSummary {
        found,
        completed: true,
    }
}

/// Run a full scan and collect every batch into one record vector. Emits status lines
/// while batches arrive and `ScanComplete` only on natural completion.
pub fn collect_records(
    ctx: ScanContext,
    emit: EventSink<'_>,
) -> anyhow::Result<(Vec<FileRecord>, ScanSummary)> {
    let (batch_tx, batch_rx) = create_scan_channel();
    let handles = ScanHandles {
        batch_rx,
        walk_handle: spawn_scan_thread(batch_tx, ctx),
    };

    let mut records: Vec<FileRecord> = Vec::new();
    while let Ok(batch) = handles.batch_rx.recv() {
        records.extend(batch);
        emit(&Event::Status(format!("Scanning... ({})", records.len())));
    }

    let summary = handles
        .walk_handle
        .join()
        .map_err(|_| anyhow::anyhow!("scan thread panicked"))?;

    if summary.completed {
        emit(&Event::ScanComplete(summary.found));
        emit(&Event::Status(format!("Found {} images", summary.found)));
    } else {
        emit(&Event::Log("scan interrupted".to_string()));
    }
    Ok((records, summary))
}
