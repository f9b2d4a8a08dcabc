//! Binary backend: scores an image by its skin-chroma pixel coverage.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::classifier::{Classifier, load_once, preprocess};
use crate::errors::{LoadError, PredictError};
use crate::types::{ClassifierDescriptor, ClassifierOutput, OutputKind};

const DESCRIPTOR: ClassifierDescriptor = ClassifierDescriptor {
    id: "skin",
    output_kind: OutputKind::Binary,
    labels: None,
};

/// Chroma lookup table, one bit per quantized RGB cell (5 bits per channel).
/// Built once at load; shared read-only across workers afterwards.
struct ChromaLut {
    bits: Vec<bool>,
}

impl ChromaLut {
    fn build() -> Self {
        let mut bits = vec![false; 32 * 32 * 32];
        for r in 0..32u16 {
            for g in 0..32u16 {
                for b in 0..32u16 {
                    // Cell center, mapped back to 8-bit.
                    let idx = (r as usize) << 10 | (g as usize) << 5 | b as usize;
                    bits[idx] = preprocess::is_skin_chroma(
                        (r * 8 + 4) as u8,
                        (g * 8 + 4) as u8,
                        (b * 8 + 4) as u8,
                    );
                }
            }
        }
        Self { bits }
    }

    fn contains(&self, r: u8, g: u8, b: u8) -> bool {
        let idx = ((r >> 3) as usize) << 10 | ((g >> 3) as usize) << 5 | (b >> 3) as usize;
        self.bits[idx]
    }
}

/// Binary-kind backend. Preprocessing is a fixed resize with `[0,1]`-range channels;
/// the score is the fraction of pixels falling in the skin-chroma region.
pub struct SkinBackend {
    state: Mutex<Option<Arc<ChromaLut>>>,
}

impl SkinBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    fn loaded(&self) -> Result<Arc<ChromaLut>, PredictError> {
        self.state
            .lock()
            .unwrap()
            .as_ref()
            .map(Arc::clone)
            .ok_or(PredictError::NotReady)
    }
}

impl Default for SkinBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for SkinBackend {
    fn descriptor(&self) -> &ClassifierDescriptor {
        &DESCRIPTOR
    }

    fn load(&self) -> Result<(), LoadError> {
        load_once(&self.state, || Ok(ChromaLut::build())).map(|_| ())
    }

    fn predict(&self, path: &Path) -> Result<ClassifierOutput, PredictError> {
        let lut = self.loaded()?;
        let img = preprocess::load_rgb(path, preprocess::INPUT_SIZE)?;
        let total = (img.width() * img.height()) as f32;
        let hits = img
            .pixels()
            .filter(|px| lut.contains(px.0[0], px.0[1], px.0[2]))
            .count() as f32;
        Ok(ClassifierOutput {
            score: (hits / total).clamp(0.0, 1.0),
            label: None,
        })
    }
}
