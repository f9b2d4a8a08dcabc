//! Imgsieve CLI: scan a directory for images and classify them in parallel.

use anyhow::Result;
use clap::Parser;
use imgsieve::engine::Cli;
use imgsieve::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
