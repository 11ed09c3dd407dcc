pub mod asset;
pub mod format;
pub mod hash;
pub mod source;

pub use asset::*;
pub use format::*;
pub use hash::*;
pub use source::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Asset reference escapes the upload root: {0}")]
    PathTraversal(String),

    #[error("Asset too large: {size} bytes exceeds {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("Remote fetch timed out after {0}s")]
    Timeout(u64),

    #[error("Remote storage returned status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}
