//! Pluggable classification backends.
//!
//! A backend turns an image path into a score and optional label. Binary-kind backends
//! are compared against a user threshold; multi-class backends return an arg-max label
//! from a fixed taxonomy and ignore the threshold. Backends are selected once per run
//! through [`BackendId`] and held behind an `Arc<dyn Classifier>` owned by the run
//! controller; there is no global model state.

pub mod preprocess;
pub mod skin;
pub mod taxonomy;

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::errors::{LoadError, PredictError};
use crate::types::{ClassifierDescriptor, ClassifierOutput};

pub use skin::SkinBackend;
pub use taxonomy::{FlaggedBackend, TAXONOMY_LABELS, TaxonomyBackend};

/// Capability set every backend implements.
pub trait Classifier: Send + Sync {
    fn descriptor(&self) -> &ClassifierDescriptor;

    /// Prepare the backend for prediction. May be expensive. Idempotent: loading an
    /// already-loaded backend is a no-op. Concurrent calls serialize; only the first
    /// performs the work, the others block until it completes or fails.
    fn load(&self) -> Result<(), LoadError>;

    /// Score one image. Requires a completed [`load`](Classifier::load) and must be
    /// safe to call from multiple worker threads at once; backends whose engine is
    /// not, wrap themselves in [`Serialized`].
    fn predict(&self, path: &Path) -> Result<ClassifierOutput, PredictError>;
}

/// Enumerated backend identifier, resolved once at selection time into a concrete
/// classifier instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendId {
    /// Binary: skin-chroma pixel coverage compared against the threshold.
    Skin,
    /// Multi-class: arg-max label from the fixed 5-way taxonomy.
    Taxonomy,
    /// Binary over the taxonomy score vector: max of the positive class scores.
    Flagged,
}

impl BackendId {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendId::Skin => "skin",
            BackendId::Taxonomy => "taxonomy",
            BackendId::Flagged => "flagged",
        }
    }

    /// Build the classifier this id names. The instance is unloaded; call
    /// [`Classifier::load`] before dispatching work to it.
    pub fn build(self) -> Arc<dyn Classifier> {
        match self {
            BackendId::Skin => Arc::new(SkinBackend::new()),
            BackendId::Taxonomy => Arc::new(TaxonomyBackend::new()),
            BackendId::Flagged => Arc::new(FlaggedBackend::new()),
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Serialize and deduplicate load work behind a `Mutex<Option<Arc<T>>>` slot.
///
/// The first caller runs `build` and stores the result; concurrent callers block on
/// the mutex until the work finishes; later calls return the stored state without
/// rebuilding. A failed build leaves the slot empty so load can be retried.
pub fn load_once<T, F>(slot: &Mutex<Option<Arc<T>>>, build: F) -> Result<Arc<T>, LoadError>
where
    F: FnOnce() -> Result<T, LoadError>,
{
    let mut guard = slot.lock().unwrap();
    if let Some(state) = guard.as_ref() {
        return Ok(Arc::clone(state));
    }
    let state = Arc::new(build()?);
    *guard = Some(Arc::clone(&state));
    Ok(state)
}

/// Wrapper for backends whose inference engine is not safe for concurrent calls:
/// serializes `predict` behind a mutex instead of exposing the hazard to callers.
pub struct Serialized<C> {
    inner: C,
    gate: Mutex<()>,
}

impl<C: Classifier> Serialized<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }
}

impl<C: Classifier> Classifier for Serialized<C> {
    fn descriptor(&self) -> &ClassifierDescriptor {
        self.inner.descriptor()
    }

    fn load(&self) -> Result<(), LoadError> {
        self.inner.load()
    }

    fn predict(&self, path: &Path) -> Result<ClassifierOutput, PredictError> {
        let _gate = self.gate.lock().unwrap();
        self.inner.predict(path)
    }
}
