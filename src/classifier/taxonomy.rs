//! Multi-class taxonomy backend and its binary "flagged" variant.
//!
//! Both run the same 5-way scorer: global image features through a fixed linear head
//! and softmax. The taxonomy backend reports the arg-max label; the flagged backend
//! reduces the same vector to a single score, the max over the positive class
//! indices, for threshold-style use.

use image::RgbImage;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::classifier::{Classifier, load_once, preprocess};
use crate::errors::{LoadError, PredictError};
use crate::types::{ClassifierDescriptor, ClassifierOutput, OutputKind};

/// Fixed, ordered label set. Index order is load-bearing: [`FLAGGED_INDICES`] refers
/// into it.
pub const TAXONOMY_LABELS: [&str; 5] = ["drawing", "explicit", "neutral", "racy", "suggestive"];

/// Classes that count as positive for binary-style flagging. Part of the backend's
/// fixed configuration, not derived from scores.
const FLAGGED_INDICES: [usize; 3] = [1, 3, 4];

const TAXONOMY_DESCRIPTOR: ClassifierDescriptor = ClassifierDescriptor {
    id: "taxonomy",
    output_kind: OutputKind::MultiClass,
    labels: Some(&TAXONOMY_LABELS),
};

const FLAGGED_DESCRIPTOR: ClassifierDescriptor = ClassifierDescriptor {
    id: "flagged",
    output_kind: OutputKind::Binary,
    labels: None,
};

/// Fixed linear head over the feature vector. Stands in for the learned weights of a
/// real 5-way model; built at load and shared read-only across workers.
struct LinearHead {
    weights: [[f32; 4]; 5],
    bias: [f32; 5],
}

impl LinearHead {
    fn build() -> Self {
        // Rows follow TAXONOMY_LABELS; columns are [skin, saturation, luma, contrast].
        Self {
            weights: [
                [-2.0, 1.6, 0.4, -3.0], // drawing: flat, saturated
                [4.2, 0.3, 0.1, 0.8],   // explicit
                [-1.2, -0.6, 0.6, 1.4], // neutral
                [2.6, 0.2, 0.4, 1.0],   // racy
                [1.4, 0.5, 0.5, 0.6],   // suggestive
            ],
            bias: [0.0, -0.8, 0.6, -0.4, -0.2],
        }
    }

    fn scores(&self, feats: &[f32; 4]) -> [f32; 5] {
        let mut logits = [0f32; 5];
        for (i, row) in self.weights.iter().enumerate() {
            logits[i] = row.iter().zip(feats).map(|(w, f)| w * f).sum::<f32>() + self.bias[i];
        }
        softmax(logits)
    }
}

fn softmax(logits: [f32; 5]) -> [f32; 5] {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut out = [0f32; 5];
    let mut sum = 0f32;
    for (o, &l) in out.iter_mut().zip(&logits) {
        *o = (l - max).exp();
        sum += *o;
    }
    for o in &mut out {
        *o /= sum;
    }
    out
}

/// Global image features: skin-chroma ratio, mean saturation, mean luminance, and the
/// standard deviation of standardized luminance (contrast).
fn features(img: &RgbImage) -> [f32; 4] {
    let total = (img.width() * img.height()) as f32;

    let mut skin = 0f32;
    for px in img.pixels() {
        if preprocess::is_skin_chroma(px.0[0], px.0[1], px.0[2]) {
            skin += 1.0;
        }
    }
    skin /= total;

    let unit = preprocess::to_unit_floats(img);
    let mut sat = 0f32;
    let mut luma = 0f32;
    for px in unit.chunks_exact(3) {
        let max = px[0].max(px[1]).max(px[2]);
        let min = px[0].min(px[1]).min(px[2]);
        sat += max - min;
        luma += 0.299 * px[0] + 0.587 * px[1] + 0.114 * px[2];
    }
    sat /= total;
    luma /= total;

    let std_floats = preprocess::to_standardized_floats(img);
    let lumas: Vec<f32> = std_floats
        .chunks_exact(3)
        .map(|px| 0.299 * px[0] + 0.587 * px[1] + 0.114 * px[2])
        .collect();
    let mean = lumas.iter().sum::<f32>() / total;
    let contrast = (lumas.iter().map(|l| (l - mean).powi(2)).sum::<f32>() / total).sqrt();

    [skin, sat, luma, contrast]
}

fn score_vector(head: &LinearHead, path: &Path) -> Result<[f32; 5], PredictError> {
    let img = preprocess::load_rgb(path, preprocess::INPUT_SIZE)?;
    Ok(head.scores(&features(&img)))
}

/// Multi-class backend: arg-max label from [`TAXONOMY_LABELS`] plus its confidence.
/// Ignores the user threshold for status purposes.
pub struct TaxonomyBackend {
    state: Mutex<Option<Arc<LinearHead>>>,
}

impl TaxonomyBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }
}

impl Default for TaxonomyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for TaxonomyBackend {
    fn descriptor(&self) -> &ClassifierDescriptor {
        &TAXONOMY_DESCRIPTOR
    }

    fn load(&self) -> Result<(), LoadError> {
        load_once(&self.state, || Ok(LinearHead::build())).map(|_| ())
    }

    fn predict(&self, path: &Path) -> Result<ClassifierOutput, PredictError> {
        let head = loaded(&self.state)?;
        let scores = score_vector(&head, path)?;
        let (best, confidence) = scores
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((2, 0.0));
        Ok(ClassifierOutput {
            score: confidence,
            label: Some(TAXONOMY_LABELS[best].to_string()),
        })
    }
}

/// Binary backend over the multi-class vector: score is the max over
/// [`FLAGGED_INDICES`], compared against the user threshold like any binary backend.
pub struct FlaggedBackend {
    state: Mutex<Option<Arc<LinearHead>>>,
}

impl FlaggedBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }
}

impl Default for FlaggedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for FlaggedBackend {
    fn descriptor(&self) -> &ClassifierDescriptor {
        &FLAGGED_DESCRIPTOR
    }

    fn load(&self) -> Result<(), LoadError> {
        load_once(&self.state, || Ok(LinearHead::build())).map(|_| ())
    }

    fn predict(&self, path: &Path) -> Result<ClassifierOutput, PredictError> {
        let head = loaded(&self.state)?;
        let scores = score_vector(&head, path)?;
        let score = FLAGGED_INDICES
            .iter()
            .map(|&i| scores[i])
            .fold(0f32, f32::max);
        Ok(ClassifierOutput { score, label: None })
    }
}

fn loaded(state: &Mutex<Option<Arc<LinearHead>>>) -> Result<Arc<LinearHead>, PredictError> {
    state
        .lock()
        .unwrap()
        .as_ref()
        .map(Arc::clone)
        .ok_or(PredictError::NotReady)
}
