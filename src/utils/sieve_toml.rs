//! Load `.imgsieve.toml` from the scanned directory (CLI only). Lib callers inject
//! config via `Opts` directly.

use clap::ValueEnum;
use serde::Deserialize;
use std::path::Path;

use crate::Opts;
use crate::classifier::BackendId;
use crate::utils::config::CONFIG_FILENAME;

#[derive(Debug, Deserialize)]
pub(crate) struct SieveToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    backend: Option<String>,
    threshold: Option<f32>,
    workers: Option<usize>,
    follow_links: Option<bool>,
    verbose: Option<bool>,
    json: Option<bool>,
}

/// Load `.imgsieve.toml` from `dir` if present. Returns None if the file is missing or
/// unreadable. CLI only.
pub(crate) fn load_sieve_toml(dir: &Path) -> Option<SieveToml> {
    let path = dir.join(CONFIG_FILENAME);
    let s = std::fs::read_to_string(&path).ok()?;
    toml::from_str(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($section:expr, $opts:expr, $field:ident) => {
        if let Some(v) = $section.$field {
            $opts.$field = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying
/// CLI flags so the command line wins.
pub(crate) fn apply_file_to_opts(file: &SieveToml, opts: &mut Opts) {
    let settings = &file.settings;
    if let Some(ref name) = settings.backend {
        match BackendId::from_str(name, true) {
            Ok(id) => opts.backend = id,
            Err(_) => log::warn!("unknown backend `{}` in {}", name, CONFIG_FILENAME),
        }
    }
    apply_file_opt!(settings, opts, threshold);
    if let Some(w) = settings.workers {
        opts.num_workers = Some(w);
    }
    apply_file_opt!(settings, opts, follow_links);
    apply_file_opt!(settings, opts, verbose);
    apply_file_opt!(settings, opts, json);
}
