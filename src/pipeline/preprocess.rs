//! Page cleanup before OCR.
//!
//! Pure image transforms: no I/O, deterministic, and infallible for any
//! decoded image. An unknown level cannot reach this module because
//! [`PreprocessingLevel`] is parsed when the config is built.
//!
//! Scans are dark ink on a light background, so "thickening strokes" means
//! growing the dark pixels, which in imageproc terms is an erosion of the
//! light foreground.

use crate::config::PreprocessingLevel;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::morphology::erode;
use tracing::debug;

/// Neighbourhood of the adaptive threshold, in pixels (odd).
pub const THRESHOLD_BLOCK: u32 = 11;
/// Subtracted from the local weighted mean before comparing.
pub const THRESHOLD_OFFSET: i16 = 2;
/// Median radius for the heavy tier.
pub const DENOISE_RADIUS: u32 = 1;
/// Stroke growth for the heavy tier, in pixels.
pub const THICKEN_RADIUS: u8 = 1;

/// Apply the cleanup tier to a page image. Always returns an 8-bit grayscale image.
pub fn apply(image: &DynamicImage, level: PreprocessingLevel) -> DynamicImage {
    let gray = image.to_luma8();
    debug!(
        level = %level,
        width = gray.width(),
        height = gray.height(),
        "Preprocessing page"
    );
    let out = match level {
        PreprocessingLevel::Light => gray,
        PreprocessingLevel::Medium => adaptive_threshold(&gray),
        PreprocessingLevel::Heavy => thicken_strokes(&denoise(&adaptive_threshold(&gray))),
    };
    DynamicImage::ImageLuma8(out)
}

/// Gaussian-weighted adaptive binarisation.
///
/// A pixel becomes white when it is brighter than the Gaussian-weighted mean
/// of its [`THRESHOLD_BLOCK`]² neighbourhood minus [`THRESHOLD_OFFSET`];
/// otherwise black. The sigma is the one conventionally paired with an
/// 11-pixel kernel.
pub fn adaptive_threshold(gray: &GrayImage) -> GrayImage {
    let sigma = 0.3 * ((THRESHOLD_BLOCK as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let local_mean = gaussian_blur_f32(gray, sigma);

    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, px) in gray.enumerate_pixels() {
        let threshold = local_mean.get_pixel(x, y).0[0] as i16 - THRESHOLD_OFFSET;
        let value = if px.0[0] as i16 > threshold { 255 } else { 0 };
        out.put_pixel(x, y, Luma([value]));
    }
    out
}

/// Remove speckle noise left by binarisation.
pub fn denoise(binary: &GrayImage) -> GrayImage {
    median_filter(binary, DENOISE_RADIUS, DENOISE_RADIUS)
}

/// Grow dark strokes by [`THICKEN_RADIUS`] pixels.
pub fn thicken_strokes(binary: &GrayImage) -> GrayImage {
    erode(binary, Norm::LInf, THICKEN_RADIUS)
}
