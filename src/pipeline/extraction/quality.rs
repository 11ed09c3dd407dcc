//! Quality gate for uploaded card images.
//!
//! Fatal findings (missing/empty input, oversized file, wrong type,
//! undecodable content, under-resolution) make the image unusable and stop
//! verification before any recognition work. Advisory findings (blur,
//! exposure, odd extension) are carried through to the outcome.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, ImageOutputFormat};
use tracing::debug;

use super::preprocess::{apply_orientation, read_exif_orientation};
use super::types::{IntensityStats, QualityIssue, QualityReport, QualityWarning};
use crate::pipeline::import::{ImageAsset, ImageFormatKind};
use crate::pipeline_config::QualityConfig;

/// Size of the throwaway thumbnail used to prove the image re-encodes.
const REENCODE_PROBE_EDGE: u32 = 100;

/// Stateless validator; one instance can serve any number of requests.
#[derive(Debug, Clone, Default)]
pub struct ImageQualityValidator {
    config: QualityConfig,
}

impl ImageQualityValidator {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Run every check on `asset`. Never mutates it.
    pub fn validate(&self, asset: Option<&ImageAsset>) -> QualityReport {
        let mut report = QualityReport::default();

        let Some(asset) = asset else {
            report.errors.push(QualityIssue::MissingFile);
            return report;
        };
        if asset.is_empty() {
            report.errors.push(QualityIssue::EmptyBuffer);
            return report;
        }

        let oversized = asset.len() > self.config.max_file_bytes;
        if oversized {
            report.errors.push(QualityIssue::FileTooLarge {
                size: asset.len(),
                max: self.config.max_file_bytes,
            });
        }

        self.check_declared_metadata(asset, &mut report);

        let sniffed = asset.sniffed_format();
        report.format = Some(sniffed.as_str().to_string());
        if !sniffed.is_supported() {
            report.errors.push(QualityIssue::UnsupportedFormat {
                format: sniffed.as_str().to_string(),
            });
            return report;
        }

        // Decoding a file we already refuse to process is wasted work.
        if oversized {
            return report;
        }

        let Some(img) = decode_for_gate(&asset.bytes, sniffed, &mut report) else {
            return report;
        };

        let (width, height) = img.dimensions();
        report.dimensions = Some((width, height));
        if width < self.config.min_width || height < self.config.min_height {
            report.errors.push(QualityIssue::ResolutionTooLow {
                min_width: self.config.min_width,
                min_height: self.config.min_height,
                width,
                height,
            });
        }

        if let Err(e) = reencode_probe(&img) {
            debug!(error = %e, "Re-encode probe failed");
            report.errors.push(QualityIssue::ReencodeFailed);
        }

        match compute_intensity_stats(&img.to_luma8()) {
            Some(stats) => {
                self.check_stats(stats, &mut report);
                report.stats = Some(stats);
            }
            None => report.warnings.push(QualityWarning::StatsUnavailable),
        }

        debug!(
            format = %sniffed,
            width,
            height,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "Image quality checked"
        );

        report
    }

    /// Declared mime must be allowed; an odd extension only warns.
    fn check_declared_metadata(&self, asset: &ImageAsset, report: &mut QualityReport) {
        let allowed_mimes = &self.config.allowed_mime_types;
        if !asset.declared_mime.is_empty() && !allowed_mimes.contains(&asset.declared_mime) {
            report.errors.push(QualityIssue::InvalidMimeType {
                declared: asset.declared_mime.clone(),
                allowed: allowed_mimes.clone(),
            });
        }

        if let Some(ext) = asset.declared_extension() {
            if !self.config.allowed_extensions.contains(&ext) {
                report.warnings.push(QualityWarning::ExtensionMismatch {
                    extension: ext,
                    allowed: self.config.allowed_extensions.clone(),
                });
            }
        }
    }

    fn check_stats(&self, stats: IntensityStats, report: &mut QualityReport) {
        if stats.stddev < self.config.blur_stddev_threshold {
            report.warnings.push(QualityWarning::Blurry {
                stddev: stats.stddev,
            });
        }

        if stats.mean < self.config.dark_mean_threshold {
            report.warnings.push(QualityWarning::TooDark { mean: stats.mean });
        } else if stats.mean > self.config.bright_mean_threshold {
            report
                .warnings
                .push(QualityWarning::Overexposed { mean: stats.mean });
        }
    }
}

/// Decode with the sniffed format's decoder, recording a format-specific
/// diagnostic on failure. EXIF orientation is applied so dimensions match
/// what recognition will see.
fn decode_for_gate(
    bytes: &[u8],
    format: ImageFormatKind,
    report: &mut QualityReport,
) -> Option<DynamicImage> {
    let decoded = match format.decoder_format() {
        Some(decoder) => image::load_from_memory_with_format(bytes, decoder),
        None => image::load_from_memory(bytes),
    };

    match decoded {
        Ok(img) => Some(apply_orientation(img, read_exif_orientation(bytes))),
        Err(e) => {
            debug!(format = %format, error = %e, "Image failed to decode");
            report.errors.push(match format {
                ImageFormatKind::Jpeg => QualityIssue::CorruptedJpeg,
                ImageFormatKind::Png => QualityIssue::CorruptedPng,
                ImageFormatKind::WebP => QualityIssue::CorruptedWebp,
                _ => QualityIssue::Undecodable {
                    reason: e.to_string(),
                },
            });
            None
        }
    }
}

/// Shrink to a thumbnail and JPEG-encode it. Catches images that decode
/// but carry pixel data the encoder cannot handle.
fn reencode_probe(img: &DynamicImage) -> Result<(), image::ImageError> {
    let thumb = img.resize_exact(REENCODE_PROBE_EDGE, REENCODE_PROBE_EDGE, FilterType::Triangle);
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(thumb.to_rgb8()).write_to(&mut cursor, ImageOutputFormat::Jpeg(80))
}

/// Mean and standard deviation of greyscale intensities. `None` for an
/// empty image.
pub fn compute_intensity_stats(img: &GrayImage) -> Option<IntensityStats> {
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;

    for pixel in img.pixels() {
        let val = pixel.0[0] as f64;
        sum += val;
        sum_sq += val * val;
        count += 1;
    }

    if count == 0 {
        return None;
    }

    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64) - (mean * mean);
    Some(IntensityStats {
        mean: mean as f32,
        stddev: variance.max(0.0).sqrt() as f32,
    })
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
