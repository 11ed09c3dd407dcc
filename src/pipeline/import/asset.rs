use std::path::Path;

use super::format::{detect_image_format, mime_from_filename, sanitize_filename, ImageFormatKind};
use super::hash::compute_content_hash;

/// One uploaded image, owned by the pipeline for the duration of a request.
///
/// Declared metadata comes from the uploader and is never trusted on its own:
/// the quality gate re-checks the content via magic bytes.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub bytes: Vec<u8>,
    /// Mime type as declared by the client (may be empty).
    pub declared_mime: String,
    /// Original filename as declared by the client (sanitized).
    pub declared_filename: String,
}

impl ImageAsset {
    pub fn new(bytes: Vec<u8>, declared_mime: &str, declared_filename: &str) -> Self {
        Self {
            bytes,
            declared_mime: declared_mime.trim().to_ascii_lowercase(),
            declared_filename: sanitize_filename(declared_filename),
        }
    }

    /// Build an asset from raw bytes and a filename, guessing the declared mime
    /// type from the extension the way an upload form would.
    pub fn from_named_bytes(bytes: Vec<u8>, filename: &str) -> Self {
        let mime = mime_from_filename(filename).unwrap_or_default();
        Self::new(bytes, &mime, filename)
    }

    /// Read an asset from disk.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload");
        Ok(Self::from_named_bytes(bytes, filename))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Content-sniffed format (magic bytes).
    pub fn sniffed_format(&self) -> ImageFormatKind {
        detect_image_format(&self.bytes)
    }

    /// Lowercased extension of the declared filename, if any.
    pub fn declared_extension(&self) -> Option<String> {
        Path::new(&self.declared_filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    /// SHA-256 fingerprint of the content, base64-encoded.
    pub fn fingerprint(&self) -> String {
        compute_content_hash(&self.bytes)
    }
}
