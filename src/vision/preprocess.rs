//! Screenshot preprocessing for the autoencoder.

use std::path::Path;

use image::imageops::FilterType;

use crate::error::AnalysisResult;

/// Load a screenshot as a normalized grayscale pixel buffer.
///
/// The image is resized to side x side with bilinear filtering, converted
/// to single-channel luma and scaled into [0, 1], row-major.
pub fn load_screenshot(path: &Path, side: usize) -> AnalysisResult<Vec<f32>> {
    let image = image::open(path)?;
    let gray = image
        .resize_exact(side as u32, side as u32, FilterType::Triangle)
        .to_luma8();

    Ok(gray
        .pixels()
        .map(|pixel| f32::from(pixel.0[0]) / 255.0)
        .collect())
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma};

    use super::*;

    #[test]
    fn test_resizes_and_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        GrayImage::from_fn(64, 32, |_, _| Luma([255u8]))
            .save(&path)
            .unwrap();

        let pixels = load_screenshot(&path, 16).unwrap();
        assert_eq!(pixels.len(), 16 * 16);
        assert!(pixels.iter().all(|p| (*p - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_dark_image_maps_near_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        GrayImage::from_fn(16, 16, |_, _| Luma([0u8]))
            .save(&path)
            .unwrap();

        let pixels = load_screenshot(&path, 16).unwrap();
        assert!(pixels.iter().all(|p| *p == 0.0));
    }

    #[test]
    fn test_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_screenshot(&dir.path().join("gone.png"), 16).is_err());
    }
}
