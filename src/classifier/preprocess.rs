//! Image loading and preprocessing shared by backends.
//!
//! Backends differ in normalization: the skin backend works on raw `[0,1]` channels
//! while the taxonomy scorer standardizes with fixed per-channel mean/std.

use image::{ImageReader, RgbImage, imageops::FilterType};
use std::path::Path;

use crate::errors::PredictError;

/// Input edge length every backend resizes to.
pub const INPUT_SIZE: u32 = 224;

/// Per-channel mean for standardized preprocessing.
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Per-channel std for standardized preprocessing.
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decode `path` and resize to `size` x `size` RGB. Open and decode failures map to
/// the per-item error taxonomy; a corrupt or truncated file surfaces as `Decode`.
pub fn load_rgb(path: &Path, size: u32) -> Result<RgbImage, PredictError> {
    let img = ImageReader::open(path)
        .map_err(|source| PredictError::Open {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|source| PredictError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(image::imageops::resize(
        &img.to_rgb8(),
        size,
        size,
        FilterType::Triangle,
    ))
}

/// Channels as `[0,1]` floats, interleaved RGB.
pub fn to_unit_floats(img: &RgbImage) -> Vec<f32> {
    img.as_raw().iter().map(|&b| b as f32 / 255.0).collect()
}

/// Channels standardized with [`MEAN`]/[`STD`], interleaved RGB.
pub fn to_standardized_floats(img: &RgbImage) -> Vec<f32> {
    img.as_raw()
        .chunks_exact(3)
        .flat_map(|px| {
            [
                (px[0] as f32 / 255.0 - MEAN[0]) / STD[0],
                (px[1] as f32 / 255.0 - MEAN[1]) / STD[1],
                (px[2] as f32 / 255.0 - MEAN[2]) / STD[2],
            ]
        })
        .collect()
}

/// Classic skin-chroma predicate on raw RGB bytes (Peer/Kovac rule set).
pub fn is_skin_chroma(r: u8, g: u8, b: u8) -> bool {
    let (rf, gf, bf) = (r as i16, g as i16, b as i16);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    r > 95 && g > 40 && b > 20 && max - min > 15 && (rf - gf).abs() > 15 && rf > gf && rf > bf
}
