//! Bounded dispatcher for blocking text recognition.
//!
//! Recognition engines are CPU-heavy and blocking. The pool caps how many run
//! at once (independently of how many verifications are in flight) and runs
//! each one on tokio's blocking thread pool. A caller that cannot get a slot
//! within the queue timeout is rejected with `RecognitionError::Saturated`
//! instead of queueing forever.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::types::TextRecognizer;
use super::RecognitionError;
use crate::pipeline_config::RecognitionConfig;

pub struct RecognitionPool {
    recognizer: Arc<dyn TextRecognizer>,
    permits: Arc<Semaphore>,
    workers: usize,
    queue_timeout: Duration,
    language: String,
}

impl RecognitionPool {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, config: &RecognitionConfig) -> Self {
        let workers = config.workers.max(1);
        Self {
            recognizer,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            queue_timeout: config.queue_timeout(),
            language: config.language.clone(),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Slots free right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn engine_name(&self) -> &'static str {
        self.recognizer.name()
    }

    /// Recognize one normalized image.
    ///
    /// The permit moves into the blocking task, so a slot stays taken until
    /// the engine actually returns, even if the caller stops waiting.
    pub async fn recognize(&self, image_png: Vec<u8>) -> Result<String, RecognitionError> {
        let started = Instant::now();
        let permit = match tokio::time::timeout(
            self.queue_timeout,
            Arc::clone(&self.permits).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(RecognitionError::Worker("recognition pool closed".into()));
            }
            Err(_) => {
                let waited_ms = started.elapsed().as_millis() as u64;
                warn!(
                    waited_ms,
                    workers = self.workers,
                    "Recognition pool saturated, rejecting request"
                );
                return Err(RecognitionError::Saturated { waited_ms });
            }
        };

        let queued_ms = started.elapsed().as_millis() as u64;
        let recognizer = Arc::clone(&self.recognizer);
        let language = self.language.clone();

        let text = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            recognizer.recognize(&image_png, &language)
        })
        .await
        .map_err(|e| RecognitionError::Worker(e.to_string()))??;

        debug!(
            engine = self.recognizer.name(),
            queued_ms,
            total_ms = started.elapsed().as_millis() as u64,
            chars = text.chars().count(),
            "Recognition complete"
        );
        Ok(text)
    }
}
