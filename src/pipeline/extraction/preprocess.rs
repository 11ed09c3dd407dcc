//! Image normalization for text recognition.
//!
//! Card photos arrive as colour JPEG/PNG/WebP shot on phones: rotated via
//! EXIF, unevenly lit, several megapixels. Recognition works best on a
//! moderately sized, high-contrast, black-on-white greyscale image, so every
//! image that passes the quality gate goes through one deterministic chain:
//!
//! 1. Decode (format sniffed from magic bytes)
//! 2. Apply EXIF orientation
//! 3. Downscale so the longer edge fits `max_edge` (never upscale)
//! 4. Greyscale
//! 5. Percentile contrast stretch (1st..99th)
//! 6. Unsharp mask
//! 7. Tone curve: optional gamma, then optional linear boost
//! 8. Optional hard threshold
//! 9. Encode PNG
//!
//! Identical bytes and configuration always yield identical output.

use std::borrow::Cow;
use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, ImageOutputFormat, Luma};
use tracing::debug;

use super::ExtractionError;
use crate::pipeline::import::detect_image_format;
use crate::pipeline_config::NormalizeConfig;

/// Low/high percentiles used by the contrast stretch.
const STRETCH_LOW_PERCENTILE: f32 = 0.01;
const STRETCH_HIGH_PERCENTILE: f32 = 0.99;

// ═══════════════════════════════════════════════════════════
// ImageNormalizer
// ═══════════════════════════════════════════════════════════

/// Turns a validated card photo into recognition-ready PNG bytes.
#[derive(Debug, Clone, Default)]
pub struct ImageNormalizer {
    config: NormalizeConfig,
}

impl ImageNormalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    /// Full chain: bytes in, PNG bytes out.
    pub fn normalize(&self, image_bytes: &[u8]) -> Result<Vec<u8>, ExtractionError> {
        let img = decode_oriented(image_bytes)?;
        let (orig_w, orig_h) = img.dimensions();

        let gray = self.normalize_image(&img);
        let png_bytes = encode_gray_png(&gray)?;

        debug!(
            original = format!("{orig_w}x{orig_h}"),
            output = format!("{}x{}", gray.width(), gray.height()),
            png_size = png_bytes.len(),
            "Image normalized for recognition"
        );

        Ok(png_bytes)
    }

    /// Pixel stages (3..8) on an already decoded and oriented image.
    pub fn normalize_image(&self, img: &DynamicImage) -> GrayImage {
        let working = downscale(img, self.config.max_edge);
        let mut gray = working.to_luma8();

        stretch_contrast(&mut gray);

        let mut gray = image::imageops::unsharpen(
            &gray,
            self.config.sharpen_sigma,
            self.config.sharpen_threshold,
        );

        let lut = self.tone_lut();
        for pixel in gray.pixels_mut() {
            pixel.0[0] = lut[pixel.0[0] as usize];
        }

        gray
    }

    /// Gamma, linear boost and threshold folded into one lookup table.
    fn tone_lut(&self) -> [u8; 256] {
        let mut lut = [0u8; 256];
        for (i, slot) in lut.iter_mut().enumerate() {
            let mut v = i as f32;

            if let Some(gamma) = self.config.gamma.filter(|g| *g > 0.0) {
                v = 255.0 * (v / 255.0).powf(1.0 / gamma);
            }
            if let Some(linear) = self.config.linear {
                v = linear.slope * v + linear.intercept;
            }
            let v = v.round().clamp(0.0, 255.0) as u8;

            *slot = match self.config.threshold {
                Some(cut) if v >= cut => 255,
                Some(_) => 0,
                None => v,
            };
        }
        lut
    }
}

// ═══════════════════════════════════════════════════════════
// Decoding and orientation (shared with the quality gate)
// ═══════════════════════════════════════════════════════════

/// Decode bytes using the sniffed container format, then apply EXIF orientation.
pub fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage, ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::EmptyImage);
    }

    let decoded = match detect_image_format(bytes).decoder_format() {
        Some(format) => image::load_from_memory_with_format(bytes, format),
        None => image::load_from_memory(bytes),
    }
    .map_err(|e| ExtractionError::ImageProcessing(format!("Failed to decode image: {e}")))?;

    Ok(apply_orientation(decoded, read_exif_orientation(bytes)))
}

/// EXIF Orientation tag (0x0112). 1 when absent or unreadable.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let Ok(reader) = exif::Reader::new().read_from_container(&mut cursor) else {
        return 1;
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Rotate/flip so the image is upright.
///
/// 2 = mirrored, 3 = 180, 4 = flipped V, 5 = mirrored + 90 CW, 6 = 90 CW,
/// 7 = mirrored + 270 CW, 8 = 270 CW. Anything else is left alone.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

// ═══════════════════════════════════════════════════════════
// Pixel helpers
// ═══════════════════════════════════════════════════════════

/// Downscale so the longer edge is at most `max_edge`. Borrowed when no
/// resize is needed.
fn downscale(img: &DynamicImage, max_edge: u32) -> Cow<'_, DynamicImage> {
    let (w, h) = img.dimensions();
    let (new_w, new_h) = compute_fit_dimensions(w, h, max_edge);
    if (new_w, new_h) == (w, h) {
        return Cow::Borrowed(img);
    }

    debug!(
        from = format!("{w}x{h}"),
        to = format!("{new_w}x{new_h}"),
        "Downscaling card image"
    );
    Cow::Owned(img.resize_exact(new_w, new_h, FilterType::CatmullRom))
}

/// Dimensions that fit inside a `max_edge` square preserving aspect ratio.
/// Small images are NOT upscaled.
pub fn compute_fit_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width.max(1), height.max(1));
    }

    let scale = (max_edge as f32 / width.max(height) as f32).min(1.0);
    if scale >= 1.0 {
        return (width, height);
    }

    let new_w = ((width as f32 * scale).round() as u32).clamp(1, max_edge);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, max_edge);
    (new_w, new_h)
}

/// Linear stretch mapping the 1st..99th percentile range onto 0..255.
/// No-op on flat images.
pub fn stretch_contrast(img: &mut GrayImage) {
    let total = (img.width() as u64) * (img.height() as u64);
    if total == 0 {
        return;
    }

    let mut histogram = [0u64; 256];
    for pixel in img.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let low = percentile(&histogram, total, STRETCH_LOW_PERCENTILE);
    let high = percentile(&histogram, total, STRETCH_HIGH_PERCENTILE);
    if high <= low {
        return;
    }

    let range = (high - low) as f32;
    for pixel in img.pixels_mut() {
        let v = pixel.0[0].clamp(low, high) - low;
        *pixel = Luma([((v as f32 * 255.0) / range).round() as u8]);
    }
}

/// Smallest intensity whose cumulative count reaches `fraction` of `total`.
fn percentile(histogram: &[u64; 256], total: u64, fraction: f32) -> u8 {
    let target = ((total as f64) * fraction as f64).ceil().max(1.0) as u64;
    let mut cumulative = 0u64;
    for (value, count) in histogram.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return value as u8;
        }
    }
    255
}

/// Encode a greyscale image as PNG bytes.
pub fn encode_gray_png(img: &GrayImage) -> Result<Vec<u8>, ExtractionError> {
    let dynamic = DynamicImage::ImageLuma8(img.clone());
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::Encoding(e.to_string()))?;
    Ok(cursor.into_inner())
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
