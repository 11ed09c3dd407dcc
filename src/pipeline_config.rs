//! Verification policy configuration.
//!
//! Every threshold, weight and cutoff used by the pipeline lives here so the
//! scoring policy can be tuned and tested without touching extraction logic.
//! Defaults reproduce the production policy; a JSON file named by
//! `CCCD_VERIFY_CONFIG` may override any subset of fields, and a handful of
//! operational knobs can be overridden from the environment.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {var}: {value}")]
    InvalidOverride { var: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ═══════════════════════════════════════════════════════════
// Sections
// ═══════════════════════════════════════════════════════════

/// Image quality gate thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub max_file_bytes: usize,
    pub min_width: u32,
    pub min_height: u32,
    /// Greyscale standard deviation below this = likely blurry.
    pub blur_stddev_threshold: f32,
    /// Mean intensity below this = underexposed.
    pub dark_mean_threshold: f32,
    /// Mean intensity above this = overexposed.
    pub bright_mean_threshold: f32,
    pub allowed_mime_types: Vec<String>,
    pub allowed_extensions: Vec<String>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 5 * 1024 * 1024,
            min_width: 400,
            min_height: 250,
            blur_stddev_threshold: 30.0,
            dark_mean_threshold: 30.0,
            bright_mean_threshold: 220.0,
            allowed_mime_types: ["image/jpeg", "image/jpg", "image/png", "image/webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_extensions: ["jpg", "jpeg", "png", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Linear contrast transform `out = slope * in + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearBoost {
    pub slope: f32,
    pub intercept: f32,
}

/// Recognition-oriented normalization parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Longer edge bound after downscaling. Images are never upscaled.
    pub max_edge: u32,
    pub sharpen_sigma: f32,
    pub sharpen_threshold: i32,
    pub gamma: Option<f32>,
    pub linear: Option<LinearBoost>,
    /// Hard black/white cut. `None` keeps greyscale output.
    pub threshold: Option<u8>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            max_edge: 1200,
            sharpen_sigma: 1.0,
            sharpen_threshold: 2,
            gamma: Some(1.2),
            linear: Some(LinearBoost {
                slope: 1.2,
                intercept: -(128.0 * 0.2),
            }),
            threshold: Some(128),
        }
    }
}

/// Recognition dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Language hint passed to the recognizer (tesseract language codes).
    pub language: String,
    /// Maximum concurrent recognition tasks.
    pub workers: usize,
    /// How long a request may wait for a free recognition slot.
    pub queue_timeout_ms: u64,
    /// Budget for the whole back-side pipeline before it is treated as absent.
    pub back_timeout_ms: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "vie".into(),
            workers: 2,
            queue_timeout_ms: 10_000,
            back_timeout_ms: 20_000,
        }
    }
}

impl RecognitionConfig {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }

    pub fn back_timeout(&self) -> Duration {
        Duration::from_millis(self.back_timeout_ms)
    }
}

/// Score weights. See `ScoreEngine` for the formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub completeness_weight: f64,
    pub id_number_bonus: f64,
    pub name_bonus: f64,
    pub date_of_birth_bonus: f64,
    pub error_penalty: f64,
    pub back_side_bonus: f64,
    /// Scores at or above this route to manual review.
    pub approval_cutoff: u8,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            completeness_weight: 0.6,
            id_number_bonus: 20.0,
            name_bonus: 10.0,
            date_of_birth_bonus: 5.0,
            error_penalty: 10.0,
            back_side_bonus: 15.0,
            approval_cutoff: 70,
        }
    }
}

/// Back-of-card marker keywords.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackSideConfig {
    pub keywords: Vec<String>,
    pub min_matches: usize,
}

impl Default for BackSideConfig {
    fn default() -> Self {
        Self {
            keywords: [
                "công an",
                "police",
                "cục trưởng",
                "director",
                "có giá trị",
                "valid",
                "đến",
                "until",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_matches: 2,
        }
    }
}

/// Asset fetch limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: QualityConfig::default().max_file_bytes,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ═══════════════════════════════════════════════════════════
// Root config
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub quality: QualityConfig,
    pub normalize: NormalizeConfig,
    pub recognition: RecognitionConfig,
    pub scoring: ScoringConfig,
    pub back_side: BackSideConfig,
    pub fetch: FetchConfig,
}

impl VerificationConfig {
    /// Load from `CCCD_VERIFY_CONFIG` (if set), apply env overrides, validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match config::config_file_path() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;

        tracing::debug!(
            workers = config.recognition.workers,
            language = %config.recognition.language,
            cutoff = config.scoring.approval_cutoff,
            "Verification config loaded"
        );
        Ok(config)
    }

    /// Parse a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Apply environment overrides through an injectable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(config::WORKERS_ENV) {
            self.recognition.workers =
                value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
                    var: config::WORKERS_ENV,
                    value: value.clone(),
                })?;
        }

        if let Some(value) = lookup(config::LANGUAGE_ENV) {
            let value = value.trim();
            if !value.is_empty() {
                self.recognition.language = value.to_string();
            }
        }

        if let Some(value) = lookup(config::APPROVAL_CUTOFF_ENV) {
            self.scoring.approval_cutoff =
                value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
                    var: config::APPROVAL_CUTOFF_ENV,
                    value: value.clone(),
                })?;
        }

        Ok(())
    }

    /// Reject configurations that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recognition.workers == 0 {
            return Err(ConfigError::Invalid("recognition.workers must be > 0".into()));
        }
        if self.quality.min_width == 0 || self.quality.min_height == 0 {
            return Err(ConfigError::Invalid(
                "quality.min_width and quality.min_height must be > 0".into(),
            ));
        }
        if self.quality.max_file_bytes == 0 {
            return Err(ConfigError::Invalid("quality.max_file_bytes must be > 0".into()));
        }
        if self.normalize.max_edge == 0 {
            return Err(ConfigError::Invalid("normalize.max_edge must be > 0".into()));
        }
        if self.scoring.approval_cutoff > 100 {
            return Err(ConfigError::Invalid(format!(
                "scoring.approval_cutoff must be <= 100, got {}",
                self.scoring.approval_cutoff
            )));
        }
        if self.back_side.min_matches == 0 {
            return Err(ConfigError::Invalid("back_side.min_matches must be > 0".into()));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
