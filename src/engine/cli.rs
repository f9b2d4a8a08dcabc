//! CLI command handler: scan, select the backend, analyze, print the report.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::sync::atomic::Ordering;

use crate::Opts;
use crate::controller::RunController;
use crate::engine::arg_parser::Cli;
use crate::engine::progress::{ProgressBar, create_progress_bar, refresh_bar, update_progress_to};
use crate::pipeline::render_report;
use crate::types::Event;
use crate::utils::setup_logging;
use crate::utils::sieve_toml::{apply_file_to_opts, load_sieve_toml};

/// Merge defaults, `.imgsieve.toml` from the target directory, and CLI flags.
/// The command line wins.
fn setup_opts(cli: &Cli) -> Opts {
    let mut opts = Opts::default();
    if let Some(file) = load_sieve_toml(&cli.dir) {
        apply_file_to_opts(&file, &mut opts);
    }
    if let Some(backend) = cli.backend {
        opts.backend = backend;
    }
    if let Some(threshold) = cli.threshold {
        opts.threshold = threshold;
    }
    if let Some(workers) = cli.workers {
        opts.num_workers = Some(workers);
    }
    if let Some(follow) = cli.follow_links {
        opts.follow_links = follow;
    }
    if let Some(verbose) = cli.verbose {
        opts.verbose = verbose;
    }
    if let Some(json) = cli.json {
        opts.json = json;
    }
    setup_logging(opts.verbose);
    opts
}

fn scan_event(event: &Event) {
    match event {
        Event::Status(s) | Event::Log(s) => debug!("{s}"),
        Event::ScanComplete(n) => debug!("scan complete: {n} files"),
        _ => {}
    }
}

fn analysis_event(event: &Event, bar: &Option<ProgressBar>) {
    match event {
        Event::Progress(n) => {
            if let Some(bar) = bar {
                update_progress_to(bar, *n);
            }
        }
        Event::Status(s) | Event::Log(s) => debug!("{s}"),
        _ => {}
    }
}

/// Run one scan-then-analyze cycle over `cli.dir`. Ctrl+C requests cooperative
/// cancellation; in-flight items finish and a partial report is printed.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli);
    let mut controller = RunController::new();

    let cancel = controller.cancel_flag();
    ctrlc::set_handler(move || {
        cancel.store(true, Ordering::Relaxed);
    })
    .context("set Ctrl+C handler")?;

    let scan = controller.scan(&cli.dir, opts.follow_links, Some(|e: &Event| scan_event(e)))?;
    if !scan.completed {
        warn!(
            "Scan cancelled; {} images found before interruption",
            scan.found
        );
        return Ok(());
    }
    if scan.found == 0 {
        info!("No images found under {}", cli.dir.display());
        return Ok(());
    }
    info!("Found {} images", scan.found);

    controller.select_backend(opts.backend)?;
    if controller.cancel_flag().load(Ordering::Relaxed) {
        warn!("Run cancelled before analysis started");
        return Ok(());
    }

    let bar = opts.verbose.then(|| create_progress_bar(scan.found, "Classifying"));
    if let Some(bar) = &bar {
        refresh_bar(bar);
    }
    let report = controller.analyze(
        opts.threshold,
        opts.num_workers,
        Some(|e: &Event| analysis_event(e, &bar)),
    )?;
    if bar.is_some() {
        eprintln!();
    }

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    if report.cancelled {
        warn!(
            "Run cancelled; {} of {} items processed",
            report.processed, report.total
        );
    }
    Ok(())
}
