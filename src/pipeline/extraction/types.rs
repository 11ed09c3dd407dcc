use serde::{Deserialize, Serialize};

use super::RecognitionError;

/// Text recognition abstraction (allows mocking for tests).
///
/// Implementations are blocking and may take seconds per image; async callers
/// go through `RecognitionPool`.
pub trait TextRecognizer: Send + Sync {
    /// Recognize text in a normalized (PNG) image.
    /// `language` is an engine language hint such as `"vie"`.
    fn recognize(&self, image_png: &[u8], language: &str) -> Result<String, RecognitionError>;

    /// Engine name for logs.
    fn name(&self) -> &'static str;
}

/// Failure taxonomy surfaced to callers of the verification core.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No file or an empty buffer.
    Input,
    /// Unsupported mime/format or an undecodable payload.
    Format,
    /// Under-resolution or oversized file.
    Quality,
    /// Normalization failed on an image that passed the quality gate.
    Processing,
    /// The recognition engine failed or was saturated.
    Recognition,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input_error",
            Self::Format => "format_error",
            Self::Quality => "quality_error",
            Self::Processing => "processing_error",
            Self::Recognition => "recognition_error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal quality-gate findings. Each one alone makes an image unusable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum QualityIssue {
    MissingFile,
    EmptyBuffer,
    FileTooLarge { size: usize, max: usize },
    InvalidMimeType { declared: String, allowed: Vec<String> },
    UnsupportedFormat { format: String },
    CorruptedJpeg,
    CorruptedPng,
    CorruptedWebp,
    Undecodable { reason: String },
    ResolutionTooLow { min_width: u32, min_height: u32, width: u32, height: u32 },
    ReencodeFailed,
}

impl QualityIssue {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingFile | Self::EmptyBuffer => FailureKind::Input,
            Self::FileTooLarge { .. } | Self::ResolutionTooLow { .. } => FailureKind::Quality,
            Self::InvalidMimeType { .. }
            | Self::UnsupportedFormat { .. }
            | Self::CorruptedJpeg
            | Self::CorruptedPng
            | Self::CorruptedWebp
            | Self::Undecodable { .. }
            | Self::ReencodeFailed => FailureKind::Format,
        }
    }
}

impl std::fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFile => write!(f, "No file provided"),
            Self::EmptyBuffer => write!(f, "File buffer is empty or corrupted"),
            Self::FileTooLarge { max, .. } => write!(
                f,
                "File size too large. Maximum {}MB allowed",
                max / (1024 * 1024)
            ),
            Self::InvalidMimeType { declared, allowed } => write!(
                f,
                "Invalid MIME type: {declared}. Allowed types: {}",
                allowed.join(", ")
            ),
            Self::UnsupportedFormat { format } => {
                write!(f, "Unsupported image format: {format}. Please use JPEG, PNG, or WebP")
            }
            Self::CorruptedJpeg => write!(
                f,
                "Corrupted JPEG file. Please try a different image or re-save the file"
            ),
            Self::CorruptedPng => write!(
                f,
                "Corrupted PNG file. Please try a different image or re-save the file"
            ),
            Self::CorruptedWebp => write!(
                f,
                "Corrupted WebP file. Please try a different image or re-save the file"
            ),
            Self::Undecodable { reason } => write!(f, "Image processing failed: {reason}"),
            Self::ResolutionTooLow {
                min_width,
                min_height,
                width,
                height,
            } => write!(
                f,
                "Image resolution too low. Minimum {min_width}x{min_height} required. Current: {width}x{height}"
            ),
            Self::ReencodeFailed => write!(f, "Image is corrupted or cannot be processed"),
        }
    }
}

/// Advisory quality findings. Never block verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum QualityWarning {
    ExtensionMismatch { extension: String, allowed: Vec<String> },
    Blurry { stddev: f32 },
    TooDark { mean: f32 },
    Overexposed { mean: f32 },
    StatsUnavailable,
}

impl std::fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExtensionMismatch { extension, allowed } => write!(
                f,
                "File extension \"{extension}\" doesn't match allowed formats: {}",
                allowed.join(", ")
            ),
            Self::Blurry { .. } => write!(
                f,
                "Image may be blurry. Consider providing a clearer image for better results"
            ),
            Self::TooDark { .. } => {
                write!(f, "Image appears very dark. Consider improving lighting")
            }
            Self::Overexposed { .. } => {
                write!(f, "Image appears overexposed. Consider reducing brightness")
            }
            Self::StatsUnavailable => write!(f, "Could not analyze image quality"),
        }
    }
}

/// Greyscale intensity statistics of a decoded image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IntensityStats {
    pub mean: f32,
    pub stddev: f32,
}

/// Result of the quality gate. Valid iff `errors` is empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityReport {
    pub errors: Vec<QualityIssue>,
    pub warnings: Vec<QualityWarning>,
    /// Decoded dimensions (after EXIF orientation), when decoding succeeded.
    pub dimensions: Option<(u32, u32)>,
    pub format: Option<String>,
    pub stats: Option<IntensityStats>,
}

impl QualityReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Failure classification of the first fatal error.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.errors.first().map(QualityIssue::kind)
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }
}
