//! Error taxonomy for the classification pipeline.
//!
//! Item-level errors ([`PredictError`]) never escalate past the owning task; they are
//! recorded as a `Bad` outcome. Run-level errors ([`LoadError`]) abort the transition
//! into analyzing and return control to the caller. Per-file scan I/O errors are plain
//! `io`/`walkdir` errors logged and skipped by the scanner; cancellation is a shared
//! flag, not an error.

use std::path::PathBuf;
use thiserror::Error;

/// Backend initialization failure. Fatal to starting a run: a run must not start
/// without a usable classifier.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("backend `{backend}` failed to initialize: {reason}")]
    Init {
        backend: &'static str,
        reason: String,
    },
}

/// Per-item prediction failure. Isolated to one file and recorded as `Bad`;
/// never fatal to the run.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// `predict` was called before `load` completed. Loading is a precondition of
    /// dispatch, so reaching this indicates a caller bug rather than a race.
    #[error("backend not loaded; call load() before predict()")]
    NotReady,
    #[error("multi-class backend returned no label for {path}")]
    MissingLabel { path: PathBuf },
}
