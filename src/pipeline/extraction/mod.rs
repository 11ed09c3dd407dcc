pub mod types;
pub mod quality;
pub mod preprocess;
pub mod ocr;
pub mod pool;
pub mod sanitize;

pub use types::*;
pub use quality::*;
pub use preprocess::*;
pub use ocr::*;
pub use pool::*;
pub use sanitize::*;

use thiserror::Error;

/// Image decoding / normalization failures.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image buffer is empty")]
    EmptyImage,

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("PNG encoding failed: {0}")]
    Encoding(String),
}

/// Failures of the text-recognition capability.
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("Text recognition engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Text recognition failed: {0}")]
    Engine(String),

    #[error("Recognition capacity exhausted: no worker free after {waited_ms}ms")]
    Saturated { waited_ms: u64 },

    #[error("Recognition worker failed: {0}")]
    Worker(String),

    #[error("I/O error during recognition: {0}")]
    Io(#[from] std::io::Error),
}
