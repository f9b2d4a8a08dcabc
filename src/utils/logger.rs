use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Configure the process logger: warnings from dependencies, debug or info from this
/// crate depending on `verbose`.
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME");
            let line = match record.level() {
                Level::Warn => format!(
                    "[{} {} {}] {}",
                    name.cyan(),
                    "WARN".yellow(),
                    record.target().to_string().white(),
                    record.args()
                ),
                Level::Error => format!(
                    "[{} {} {}] {}",
                    name.cyan(),
                    "ERROR".red(),
                    record.target().to_string().white(),
                    record.args()
                ),
                _ => format!("[{}] {}", name.cyan(), record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .init();
}
