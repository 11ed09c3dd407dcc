//! Verification orchestrator.
//!
//! Drives one card through the pipeline:
//! quality gate → normalize → recognize → parse → validate → [back side] → score.
//!
//! The orchestrator is synchronous and holds no per-request state, so one
//! instance serves every request. `VerificationService` wraps it for async
//! callers and routes recognition through the bounded pool.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{CardSide, VerificationStatus};
use crate::pipeline::extraction::{
    FailureKind, ImageNormalizer, ImageQualityValidator, RecognitionError, TextRecognizer,
};
use crate::pipeline::import::ImageAsset;
use crate::pipeline::structuring::{
    BackSideAnalyzer, BackSideReport, ExtractedFields, FieldExtractor, FieldValidation,
    FieldValidator, ScoreEngine,
};
use crate::pipeline_config::VerificationConfig;

pub const STEP_SHARPER_IMAGE: &str = "Please upload a sharper image";
pub const STEP_FIELDS_VISIBLE: &str = "Make sure all required information is clearly visible";
pub const STEP_UPLOAD_BACK: &str = "Please upload the back side of the ID card";
pub const STEP_SUBMITTED: &str = "Verification submitted for admin review";

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Successful verification of a card.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub verification_id: Uuid,
    pub extracted_fields: ExtractedFields,
    /// ID number grouped for display ("0012 3456 7890").
    pub display_id_number: Option<String>,
    pub field_validation: FieldValidation,
    /// None when no back image was given or it could not be used.
    pub back_side_report: Option<BackSideReport>,
    pub verification_score: u8,
    pub status: VerificationStatus,
    pub image_warnings: Vec<String>,
    pub next_steps: Vec<String>,
    /// SHA-256 of the front image, base64.
    pub front_fingerprint: String,
    pub verified_at: DateTime<Utc>,
}

/// Structured failure: the front image could not be verified at all.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{error_kind}: {}", .details.join("; "))]
pub struct VerificationFailure {
    pub verification_id: Uuid,
    pub error_kind: FailureKind,
    pub details: Vec<String>,
    /// Quality warnings gathered before the failure.
    pub warnings: Vec<String>,
    pub next_steps: Vec<String>,
}

impl VerificationFailure {
    pub fn new(
        verification_id: Uuid,
        error_kind: FailureKind,
        details: Vec<String>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            verification_id,
            error_kind,
            details,
            warnings,
            next_steps: remediation_for(error_kind),
        }
    }

    pub fn recognition(verification_id: Uuid, err: &RecognitionError, warnings: Vec<String>) -> Self {
        Self::new(
            verification_id,
            FailureKind::Recognition,
            vec![err.to_string()],
            warnings,
        )
    }
}

fn remediation_for(kind: FailureKind) -> Vec<String> {
    let hint = match kind {
        FailureKind::Input => "Please upload a photo of the front side of the ID card",
        FailureKind::Format => "Please upload the photo as a JPEG, PNG or WebP image",
        FailureKind::Quality => "Please retake the photo closer to the card in good lighting",
        FailureKind::Processing => "Please retake the photo and upload it again",
        FailureKind::Recognition => "Please try again in a few minutes",
    };
    vec![hint.to_string()]
}

/// A side that passed the quality gate and was normalized for recognition.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub side: CardSide,
    pub png: Vec<u8>,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct VerificationOrchestrator {
    quality: ImageQualityValidator,
    normalizer: ImageNormalizer,
    recognizer: Arc<dyn TextRecognizer>,
    language: String,
    extractor: FieldExtractor,
    validator: FieldValidator,
    back_side: BackSideAnalyzer,
    scorer: ScoreEngine,
}

impl VerificationOrchestrator {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, config: &VerificationConfig) -> Self {
        Self {
            quality: ImageQualityValidator::new(config.quality.clone()),
            normalizer: ImageNormalizer::new(config.normalize.clone()),
            recognizer,
            language: config.recognition.language.clone(),
            extractor: FieldExtractor::new(),
            validator: FieldValidator::new(),
            back_side: BackSideAnalyzer::new(config.back_side.clone()),
            scorer: ScoreEngine::new(config.scoring.clone()),
        }
    }

    /// Full synchronous verification. Recognition runs on the calling thread.
    pub fn verify(
        &self,
        front: Option<&ImageAsset>,
        back: Option<&ImageAsset>,
    ) -> Result<VerificationOutcome, VerificationFailure> {
        let verification_id = Uuid::new_v4();
        tracing::info!(
            %verification_id,
            has_back = back.is_some(),
            "Verification: received"
        );

        let prepared = self.prepare(verification_id, CardSide::Front, front)?;
        let front_text = self
            .recognize_blocking(&prepared.png)
            .map_err(|e| VerificationFailure::recognition(verification_id, &e, prepared.warnings.clone()))?;
        tracing::info!(
            %verification_id,
            chars = front_text.chars().count(),
            "Verification: front recognized"
        );

        let back_report = back.and_then(|asset| self.verify_back_side(verification_id, asset));
        let fingerprint = front.map(ImageAsset::fingerprint).unwrap_or_default();

        Ok(self.conclude(
            verification_id,
            &front_text,
            prepared.warnings,
            back_report,
            fingerprint,
        ))
    }

    /// Quality gate then normalization for one side.
    pub fn prepare(
        &self,
        verification_id: Uuid,
        side: CardSide,
        asset: Option<&ImageAsset>,
    ) -> Result<PreparedImage, VerificationFailure> {
        let report = self.quality.validate(asset);
        let warnings = report.warning_messages();

        if let Some(kind) = report.failure_kind() {
            tracing::warn!(
                %verification_id,
                %side,
                error_kind = kind.as_str(),
                errors = report.errors.len(),
                "Verification: quality gate rejected image"
            );
            return Err(VerificationFailure::new(
                verification_id,
                kind,
                report.error_messages(),
                warnings,
            ));
        }

        let (width, height) = report.dimensions.unwrap_or_default();
        tracing::info!(
            %verification_id,
            %side,
            width,
            height,
            warnings = warnings.len(),
            "Verification: quality checked"
        );

        // The quality gate rejects a missing asset, so this only guards the type.
        let Some(asset) = asset else {
            return Err(VerificationFailure::new(
                verification_id,
                FailureKind::Input,
                vec!["No image file provided".to_string()],
                warnings,
            ));
        };

        let png = self.normalizer.normalize(&asset.bytes).map_err(|e| {
            tracing::warn!(%verification_id, %side, error = %e, "Verification: normalization failed");
            VerificationFailure::new(
                verification_id,
                FailureKind::Processing,
                vec![e.to_string()],
                warnings.clone(),
            )
        })?;
        tracing::debug!(%verification_id, %side, png_bytes = png.len(), "Verification: normalized");

        Ok(PreparedImage {
            side,
            png,
            warnings,
        })
    }

    pub fn recognize_blocking(&self, png: &[u8]) -> Result<String, RecognitionError> {
        self.recognizer.recognize(png, &self.language)
    }

    /// Back side on the calling thread. Any failure means "no back-side data".
    fn verify_back_side(&self, verification_id: Uuid, asset: &ImageAsset) -> Option<BackSideReport> {
        let prepared = self
            .prepare(verification_id, CardSide::Back, Some(asset))
            .ok()?;
        match self.recognize_blocking(&prepared.png) {
            Ok(text) => Some(self.analyze_back(verification_id, &text)),
            Err(e) => {
                tracing::warn!(
                    %verification_id,
                    side = %CardSide::Back,
                    error = %e,
                    "Verification: back side recognition failed, continuing without it"
                );
                None
            }
        }
    }

    pub fn analyze_back(&self, verification_id: Uuid, text: &str) -> BackSideReport {
        let report = self.back_side.analyze(text);
        tracing::info!(
            %verification_id,
            matched = report.matched_keywords.len(),
            required_elements = report.has_required_elements,
            "Verification: back side checked"
        );
        report
    }

    /// Parse, validate and score the recognized front text.
    pub fn conclude(
        &self,
        verification_id: Uuid,
        front_text: &str,
        image_warnings: Vec<String>,
        back_side_report: Option<BackSideReport>,
        front_fingerprint: String,
    ) -> VerificationOutcome {
        let extracted_fields = self.extractor.extract(front_text);
        let field_validation = self.validator.validate(&extracted_fields);
        tracing::info!(
            %verification_id,
            id = extracted_fields.masked_id_number().as_deref().unwrap_or("-"),
            completeness = field_validation.completeness,
            errors = field_validation.errors.len(),
            "Verification: fields validated"
        );

        let verification_score =
            self.scorer
                .score(&extracted_fields, &field_validation, back_side_report.as_ref());
        let cutoff = self.scorer.config().approval_cutoff;
        let status = VerificationStatus::from_score(verification_score, cutoff);
        tracing::info!(
            %verification_id,
            score = verification_score,
            %status,
            has_back = back_side_report.is_some(),
            "Verification: scored"
        );

        let next_steps = next_steps(
            verification_score,
            cutoff,
            &field_validation,
            back_side_report.is_some(),
            &image_warnings,
        );

        VerificationOutcome {
            verification_id,
            display_id_number: extracted_fields.display_id_number(),
            extracted_fields,
            field_validation,
            back_side_report,
            verification_score,
            status,
            image_warnings,
            next_steps,
            front_fingerprint,
            verified_at: Utc::now(),
        }
    }
}

/// Remediation hints shown to the user after a completed verification.
pub fn next_steps(
    score: u8,
    cutoff: u8,
    validation: &FieldValidation,
    back_analyzed: bool,
    image_warnings: &[String],
) -> Vec<String> {
    let mut steps = Vec::new();
    if score < cutoff {
        steps.push(STEP_SHARPER_IMAGE.to_string());
        if !validation.errors.is_empty() {
            steps.push(STEP_FIELDS_VISIBLE.to_string());
        }
        if !back_analyzed {
            steps.push(STEP_UPLOAD_BACK.to_string());
        }
    } else {
        steps.push(STEP_SUBMITTED.to_string());
    }
    if !image_warnings.is_empty() {
        steps.push(format!("Image quality issues: {}", image_warnings.join(", ")));
    }
    steps
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pipeline::extraction::MockTextRecognizer;
    use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma};

    pub(crate) const FRONT_TEXT: &str = "CỘNG HÒA XÃ HỘI CHỦ NGHĨA VIỆT NAM
CĂN CƯỚC CÔNG DÂN
Số: 001234567890
Họ và tên: NGUYỄN VĂN AN
Ngày sinh: 01/01/1990
Giới tính: Nam
Quốc tịch: Việt Nam
Quê quán: Hà Nội
Nơi thường trú: 123 Đường Láng, Phường Láng Thượng, Quận Đống Đa, Hà Nội";

    pub(crate) const BACK_TEXT: &str = "CỤC TRƯỞNG CỤC CẢNH SÁT QUẢN LÝ HÀNH CHÍNH
DIRECTOR GENERAL OF THE POLICE DEPARTMENT";

    /// Striped card-sized PNG: sharp edges keep it above the blur threshold.
    pub(crate) fn card_png(width: u32, height: u32) -> Vec<u8> {
        let img = GrayImage::from_fn(width, height, |x, _| {
            if (x / 8) % 2 == 0 {
                Luma([40])
            } else {
                Luma([210])
            }
        });
        let mut cursor = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(img)
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    pub(crate) fn card_asset(width: u32, height: u32, name: &str) -> ImageAsset {
        ImageAsset::new(card_png(width, height), "image/png", name)
    }

    fn orchestrator(mock: Arc<MockTextRecognizer>) -> VerificationOrchestrator {
        VerificationOrchestrator::new(mock, &VerificationConfig::default())
    }

    #[test]
    fn clean_front_routes_to_review() {
        let mock = Arc::new(MockTextRecognizer::new(FRONT_TEXT));
        let front = card_asset(800, 500, "front.png");

        let outcome = orchestrator(mock.clone()).verify(Some(&front), None).unwrap();

        assert_eq!(outcome.extracted_fields.id_number.as_deref(), Some("001234567890"));
        assert_eq!(outcome.display_id_number.as_deref(), Some("0012 3456 7890"));
        assert_eq!(outcome.field_validation.completeness, 100);
        assert!(outcome.field_validation.errors.is_empty());
        assert_eq!(outcome.verification_score, 95);
        assert_eq!(outcome.status, VerificationStatus::PendingReview);
        assert_eq!(outcome.next_steps, vec![STEP_SUBMITTED]);
        assert_eq!(outcome.front_fingerprint, front.fingerprint());
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn back_side_with_markers_adds_bonus() {
        let mock = Arc::new(
            MockTextRecognizer::new(FRONT_TEXT).with_text_for_width(640, BACK_TEXT),
        );
        let front = card_asset(800, 500, "front.png");
        let back = card_asset(640, 400, "back.png");

        let outcome = orchestrator(mock.clone())
            .verify(Some(&front), Some(&back))
            .unwrap();

        let report = outcome.back_side_report.unwrap();
        assert!(report.has_required_elements);
        assert_eq!(outcome.verification_score, 100);
        assert_eq!(mock.calls(), 2);
    }

    #[test]
    fn corrupted_back_is_ignored() {
        let mock = Arc::new(MockTextRecognizer::new(FRONT_TEXT));
        let front = card_asset(800, 500, "front.png");
        let mut bytes = card_png(640, 400);
        bytes.truncate(60);
        let back = ImageAsset::new(bytes, "image/png", "back.png");

        let outcome = orchestrator(mock.clone())
            .verify(Some(&front), Some(&back))
            .unwrap();

        assert!(outcome.back_side_report.is_none());
        assert_eq!(outcome.verification_score, 95);
        assert_eq!(mock.calls(), 1, "back never reached recognition");
    }

    #[test]
    fn low_resolution_front_fails_before_recognition() {
        let mock = Arc::new(MockTextRecognizer::new(FRONT_TEXT));
        let front = card_asset(320, 200, "front.png");

        let failure = orchestrator(mock.clone()).verify(Some(&front), None).unwrap_err();

        assert_eq!(failure.error_kind, FailureKind::Quality);
        assert!(failure.details[0].contains("400"));
        assert!(failure.details[0].contains("320"));
        assert!(!failure.next_steps.is_empty());
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn missing_front_is_input_failure() {
        let mock = Arc::new(MockTextRecognizer::new(FRONT_TEXT));
        let failure = orchestrator(mock.clone()).verify(None, None).unwrap_err();
        assert_eq!(failure.error_kind, FailureKind::Input);
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn undecodable_front_is_format_failure() {
        let mock = Arc::new(MockTextRecognizer::new(FRONT_TEXT));
        let front = ImageAsset::new(b"\xFF\xD8\xFF\xE0garbage".to_vec(), "image/jpeg", "f.jpg");
        let failure = orchestrator(mock).verify(Some(&front), None).unwrap_err();
        assert_eq!(failure.error_kind, FailureKind::Format);
    }

    #[test]
    fn recognition_failure_is_fatal_for_front() {
        let mock = Arc::new(MockTextRecognizer::failing("engine crashed"));
        let front = card_asset(800, 500, "front.png");
        let failure = orchestrator(mock).verify(Some(&front), None).unwrap_err();
        assert_eq!(failure.error_kind, FailureKind::Recognition);
        assert!(failure.details[0].contains("engine crashed"));
    }

    #[test]
    fn missing_id_lowers_score_and_asks_for_resubmission() {
        let mock = Arc::new(MockTextRecognizer::new(
            "Họ và tên: LÊ VĂN BA\nNgày sinh: 01/01/1990",
        ));
        let front = card_asset(800, 500, "front.png");

        let outcome = orchestrator(mock).verify(Some(&front), None).unwrap();

        assert_eq!(outcome.extracted_fields.id_number, None);
        assert!(!outcome.field_validation.is_valid);
        assert_eq!(outcome.status, VerificationStatus::NeedsImprovement);
        assert_eq!(
            outcome.next_steps,
            vec![STEP_SHARPER_IMAGE, STEP_FIELDS_VISIBLE, STEP_UPLOAD_BACK]
        );
    }

    #[test]
    fn next_steps_append_image_warnings() {
        let validation = FieldValidation::default();
        let warnings = vec!["Image may be blurry".to_string(), "Image is too dark".to_string()];
        let steps = next_steps(90, 70, &validation, false, &warnings);
        assert_eq!(steps[0], STEP_SUBMITTED);
        assert_eq!(steps[1], "Image quality issues: Image may be blurry, Image is too dark");
    }

    #[test]
    fn failure_serializes_camel_case() {
        let failure = VerificationFailure::new(
            Uuid::nil(),
            FailureKind::Quality,
            vec!["too small".into()],
            vec![],
        );
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["errorKind"], "quality");
        assert_eq!(json["details"][0], "too small");
        assert_eq!(failure.to_string(), "quality_error: too small");
    }
}
