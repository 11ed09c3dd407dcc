//! Async entry point for verifications.
//!
//! Front and back run concurrently in two phases: image preparation on the
//! blocking pool, then recognition through `RecognitionPool`. The back side
//! only reaches recognition once the front image has passed its checks. It
//! is best effort and is dropped on any failure or when it exceeds its time
//! budget.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::error::Elapsed;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use super::extraction::{FailureKind, RecognitionPool, TextRecognizer};
use super::import::{AssetError, AssetSource, ImageAsset};
use super::processor::{
    PreparedImage, VerificationFailure, VerificationOrchestrator, VerificationOutcome,
};
use super::structuring::BackSideReport;
use crate::models::CardSide;
use crate::pipeline_config::VerificationConfig;

pub struct VerificationService {
    orchestrator: Arc<VerificationOrchestrator>,
    pool: RecognitionPool,
    back_timeout: Duration,
    source: Option<Arc<dyn AssetSource>>,
}

impl VerificationService {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, config: &VerificationConfig) -> Self {
        Self {
            orchestrator: Arc::new(VerificationOrchestrator::new(
                Arc::clone(&recognizer),
                config,
            )),
            pool: RecognitionPool::new(recognizer, &config.recognition),
            back_timeout: config.recognition.back_timeout(),
            source: None,
        }
    }

    /// Resolve upload references through `source` in `verify_references`.
    pub fn with_source(mut self, source: Arc<dyn AssetSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn pool(&self) -> &RecognitionPool {
        &self.pool
    }

    pub async fn verify(
        &self,
        front: Option<ImageAsset>,
        back: Option<ImageAsset>,
    ) -> Result<VerificationOutcome, VerificationFailure> {
        self.run(Uuid::new_v4(), front, back).await
    }

    /// Fetch both sides from the configured source, then verify.
    ///
    /// A front that cannot be fetched is an input failure. A back that cannot
    /// be fetched is skipped.
    pub async fn verify_references(
        &self,
        front: &str,
        back: Option<&str>,
    ) -> Result<VerificationOutcome, VerificationFailure> {
        let verification_id = Uuid::new_v4();
        let Some(source) = self.source.clone() else {
            return Err(VerificationFailure::new(
                verification_id,
                FailureKind::Input,
                vec!["No asset source configured".to_string()],
                Vec::new(),
            ));
        };

        let back_fetch = async {
            match back {
                Some(reference) => Some(fetch(Arc::clone(&source), reference).await),
                None => None,
            }
        };
        let (front_asset, back_asset) = tokio::join!(fetch(Arc::clone(&source), front), back_fetch);

        let front_asset = front_asset.map_err(|e| {
            warn!(%verification_id, error = %e, "Verification: front image fetch failed");
            VerificationFailure::new(
                verification_id,
                FailureKind::Input,
                vec![format!("Could not fetch front image: {e}")],
                Vec::new(),
            )
        })?;
        let back_asset = match back_asset {
            Some(Ok(asset)) => Some(asset),
            Some(Err(e)) => {
                warn!(
                    %verification_id,
                    error = %e,
                    "Verification: back image fetch failed, continuing without it"
                );
                None
            }
            None => None,
        };

        self.run(verification_id, Some(front_asset), back_asset).await
    }

    async fn run(
        &self,
        verification_id: Uuid,
        front: Option<ImageAsset>,
        back: Option<ImageAsset>,
    ) -> Result<VerificationOutcome, VerificationFailure> {
        info!(
            %verification_id,
            has_back = back.is_some(),
            workers = self.pool.workers(),
            "Verification: received"
        );
        let fingerprint = front
            .as_ref()
            .map(ImageAsset::fingerprint)
            .unwrap_or_default();
        let back_deadline = Instant::now() + self.back_timeout;

        // The back side never errors, so a front failure in either phase
        // ends the join and drops whatever the back side was doing.
        let (front_image, back_image) = tokio::try_join!(
            self.prepare_side(verification_id, CardSide::Front, front),
            async {
                Ok::<_, VerificationFailure>(
                    self.prepare_back(verification_id, back, back_deadline).await,
                )
            },
        )?;
        let PreparedImage { png, warnings, .. } = front_image;
        let (front_text, back_report) = tokio::try_join!(
            self.recognize_side(verification_id, CardSide::Front, png, &warnings),
            async {
                Ok::<_, VerificationFailure>(
                    self.back_report(verification_id, back_image, back_deadline).await,
                )
            },
        )?;

        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::task::spawn_blocking(move || {
            orchestrator.conclude(verification_id, &front_text, warnings, back_report, fingerprint)
        })
        .await
        .map_err(|e| worker_failure(verification_id, &e))
    }

    async fn prepare_side(
        &self,
        verification_id: Uuid,
        side: CardSide,
        asset: Option<ImageAsset>,
    ) -> Result<PreparedImage, VerificationFailure> {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::task::spawn_blocking(move || {
            orchestrator.prepare(verification_id, side, asset.as_ref())
        })
        .await
        .map_err(|e| worker_failure(verification_id, &e))?
    }

    async fn recognize_side(
        &self,
        verification_id: Uuid,
        side: CardSide,
        png: Vec<u8>,
        warnings: &[String],
    ) -> Result<String, VerificationFailure> {
        let text = self.pool.recognize(png).await.map_err(|e| {
            warn!(%verification_id, %side, error = %e, "Verification: recognition failed");
            VerificationFailure::recognition(verification_id, &e, warnings.to_vec())
        })?;
        info!(
            %verification_id,
            %side,
            chars = text.chars().count(),
            "Verification: recognized"
        );
        Ok(text)
    }

    async fn prepare_back(
        &self,
        verification_id: Uuid,
        asset: Option<ImageAsset>,
        deadline: Instant,
    ) -> Option<PreparedImage> {
        let asset = asset?;
        let attempt = tokio::time::timeout_at(
            deadline,
            self.prepare_side(verification_id, CardSide::Back, Some(asset)),
        )
        .await;
        self.usable_back(verification_id, attempt)
    }

    async fn back_report(
        &self,
        verification_id: Uuid,
        image: Option<PreparedImage>,
        deadline: Instant,
    ) -> Option<BackSideReport> {
        let image = image?;
        let attempt = tokio::time::timeout_at(
            deadline,
            self.recognize_side(verification_id, CardSide::Back, image.png, &image.warnings),
        )
        .await;
        let text = self.usable_back(verification_id, attempt)?;
        Some(self.orchestrator.analyze_back(verification_id, &text))
    }

    /// Back-side failures and timeouts are logged and dropped.
    fn usable_back<T>(
        &self,
        verification_id: Uuid,
        attempt: Result<Result<T, VerificationFailure>, Elapsed>,
    ) -> Option<T> {
        match attempt {
            Ok(Ok(value)) => Some(value),
            Ok(Err(failure)) => {
                warn!(
                    %verification_id,
                    error_kind = failure.error_kind.as_str(),
                    "Verification: back side unusable, continuing without it"
                );
                None
            }
            Err(_) => {
                warn!(
                    %verification_id,
                    timeout_ms = self.back_timeout.as_millis() as u64,
                    "Verification: back side timed out, continuing without it"
                );
                None
            }
        }
    }
}

async fn fetch(source: Arc<dyn AssetSource>, reference: &str) -> Result<ImageAsset, AssetError> {
    let reference = reference.to_string();
    tokio::task::spawn_blocking(move || source.fetch(&reference))
        .await
        .map_err(|e| AssetError::Io(std::io::Error::other(e.to_string())))?
}

fn worker_failure(verification_id: Uuid, err: &tokio::task::JoinError) -> VerificationFailure {
    VerificationFailure::new(
        verification_id,
        FailureKind::Processing,
        vec![format!("Verification worker failed: {err}")],
        Vec::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VerificationStatus;
    use crate::pipeline::extraction::MockTextRecognizer;
    use crate::pipeline::import::LocalAssetSource;
    use crate::pipeline::processor::tests::{card_asset, card_png, BACK_TEXT, FRONT_TEXT};

    fn config(workers: usize, back_timeout_ms: u64) -> VerificationConfig {
        let mut config = VerificationConfig::default();
        config.recognition.workers = workers;
        config.recognition.back_timeout_ms = back_timeout_ms;
        config
    }

    fn front_and_back_mock() -> Arc<MockTextRecognizer> {
        Arc::new(MockTextRecognizer::new(FRONT_TEXT).with_text_for_width(640, BACK_TEXT))
    }

    #[tokio::test]
    async fn verifies_front_and_back_concurrently() {
        let mock = front_and_back_mock();
        let service = VerificationService::new(mock.clone(), &config(2, 20_000));

        let outcome = service
            .verify(
                Some(card_asset(800, 500, "front.png")),
                Some(card_asset(640, 400, "back.png")),
            )
            .await
            .unwrap();

        assert!(outcome.back_side_report.as_ref().unwrap().has_required_elements);
        assert_eq!(outcome.verification_score, 100);
        assert_eq!(outcome.status, VerificationStatus::PendingReview);
        assert_eq!(mock.calls(), 2);
        assert_eq!(service.pool().available(), 2);
    }

    #[tokio::test]
    async fn corrupted_back_gives_no_bonus() {
        let mock = front_and_back_mock();
        let service = VerificationService::new(mock.clone(), &config(2, 20_000));
        let mut bytes = card_png(640, 400);
        bytes.truncate(60);

        let outcome = service
            .verify(
                Some(card_asset(800, 500, "front.png")),
                Some(ImageAsset::new(bytes, "image/png", "back.png")),
            )
            .await
            .unwrap();

        assert!(outcome.back_side_report.is_none());
        assert_eq!(outcome.verification_score, 95);
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn slow_back_side_is_dropped_after_timeout() {
        let mock = Arc::new(
            MockTextRecognizer::new(FRONT_TEXT).with_delay(Duration::from_millis(400)),
        );
        let service = VerificationService::new(mock, &config(2, 100));

        let outcome = service
            .verify(
                Some(card_asset(800, 500, "front.png")),
                Some(card_asset(640, 400, "back.png")),
            )
            .await
            .unwrap();

        assert!(outcome.back_side_report.is_none());
        assert_eq!(outcome.verification_score, 95);
    }

    #[tokio::test]
    async fn low_resolution_front_never_reaches_recognition() {
        let mock = front_and_back_mock();
        let service = VerificationService::new(mock.clone(), &config(2, 20_000));

        let failure = service
            .verify(Some(card_asset(320, 200, "front.png")), None)
            .await
            .unwrap_err();

        assert_eq!(failure.error_kind, FailureKind::Quality);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn rejected_front_skips_back_side() {
        let mock = Arc::new(
            MockTextRecognizer::new(FRONT_TEXT)
                .with_text_for_width(640, BACK_TEXT)
                .with_delay(Duration::from_secs(2)),
        );
        let service = VerificationService::new(mock.clone(), &config(2, 20_000));
        let started = std::time::Instant::now();

        let failure = service
            .verify(
                Some(card_asset(320, 200, "front.png")),
                Some(card_asset(640, 400, "back.png")),
            )
            .await
            .unwrap_err();

        assert_eq!(failure.error_kind, FailureKind::Quality);
        assert_eq!(mock.calls(), 0);
        assert_eq!(service.pool().available(), 2);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn recognition_failure_fails_front() {
        let service = VerificationService::new(
            Arc::new(MockTextRecognizer::failing("no traineddata")),
            &config(1, 20_000),
        );
        let failure = service
            .verify(Some(card_asset(800, 500, "front.png")), None)
            .await
            .unwrap_err();
        assert_eq!(failure.error_kind, FailureKind::Recognition);
    }

    #[tokio::test]
    async fn references_resolved_through_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("front.png"), card_png(800, 500)).unwrap();
        std::fs::write(dir.path().join("back.png"), card_png(640, 400)).unwrap();

        let mock = front_and_back_mock();
        let service = VerificationService::new(mock, &config(2, 20_000))
            .with_source(Arc::new(LocalAssetSource::new(dir.path(), 5 * 1024 * 1024)));

        let outcome = service
            .verify_references("front.png", Some("back.png"))
            .await
            .unwrap();
        assert!(outcome.back_side_report.is_some());
        assert_eq!(outcome.extracted_fields.id_number.as_deref(), Some("001234567890"));
    }

    #[tokio::test]
    async fn missing_back_reference_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("front.png"), card_png(800, 500)).unwrap();

        let service = VerificationService::new(front_and_back_mock(), &config(2, 20_000))
            .with_source(Arc::new(LocalAssetSource::new(dir.path(), 5 * 1024 * 1024)));

        let outcome = service
            .verify_references("front.png", Some("gone.png"))
            .await
            .unwrap();
        assert!(outcome.back_side_report.is_none());
    }

    #[tokio::test]
    async fn missing_front_reference_is_input_failure() {
        let dir = tempfile::tempdir().unwrap();
        let service = VerificationService::new(front_and_back_mock(), &config(2, 20_000))
            .with_source(Arc::new(LocalAssetSource::new(dir.path(), 5 * 1024 * 1024)));

        let failure = service
            .verify_references("../etc/passwd", None)
            .await
            .unwrap_err();
        assert_eq!(failure.error_kind, FailureKind::Input);
        assert!(failure.details[0].contains("Could not fetch front image"));
    }

    #[tokio::test]
    async fn references_without_source_fail() {
        let service = VerificationService::new(front_and_back_mock(), &config(1, 20_000));
        let failure = service.verify_references("front.png", None).await.unwrap_err();
        assert_eq!(failure.error_kind, FailureKind::Input);
    }
}
