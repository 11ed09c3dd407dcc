use std::path::Path;

use serde::{Deserialize, Serialize};

/// Image container formats recognised from magic bytes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormatKind {
    Jpeg,
    Png,
    #[serde(rename = "webp")]
    WebP,
    Gif,
    Bmp,
    Tiff,
    Heic,
    Unknown,
}

impl ImageFormatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Heic => "heic",
            Self::Unknown => "unknown",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Heic => "image/heic",
            Self::Unknown => "application/octet-stream",
        }
    }

    /// Formats the verification pipeline accepts.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Png | Self::WebP)
    }

    /// Decoder to use for a supported format.
    pub fn decoder_format(&self) -> Option<image::ImageFormat> {
        match self {
            Self::Jpeg => Some(image::ImageFormat::Jpeg),
            Self::Png => Some(image::ImageFormat::Png),
            Self::WebP => Some(image::ImageFormat::WebP),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageFormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect image format from magic bytes (NOT the declared mime or extension).
/// Magic bytes don't lie — declared metadata can be wrong.
pub fn detect_image_format(bytes: &[u8]) -> ImageFormatKind {
    match bytes {
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => ImageFormatKind::Jpeg,
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        [0x89, 0x50, 0x4E, 0x47, ..] => ImageFormatKind::Png,
        // WebP: "RIFF" .... "WEBP"
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => ImageFormatKind::WebP,
        // GIF87a / GIF89a
        [b'G', b'I', b'F', b'8', ..] => ImageFormatKind::Gif,
        [b'B', b'M', ..] => ImageFormatKind::Bmp,
        // TIFF: little-endian (49 49 2A 00) or big-endian (4D 4D 00 2A)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => ImageFormatKind::Tiff,
        // HEIC/HEIF: "ftyp" at offset 4
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => ImageFormatKind::Heic,
        _ => ImageFormatKind::Unknown,
    }
}

/// Guess a mime type from a filename extension.
pub fn mime_from_filename(filename: &str) -> Option<String> {
    mime_guess::from_path(filename)
        .first()
        .map(|m| m.essence_str().to_string())
}

/// Sanitize a filename — strip path components, limit length
pub fn sanitize_filename(original: &str) -> String {
    let name = Path::new(original.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");

    let clean: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .take(255)
        .collect();

    if clean.is_empty() {
        "upload".to_string()
    } else {
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_jpeg_from_magic_bytes() {
        assert_eq!(
            detect_image_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]),
            ImageFormatKind::Jpeg
        );
    }

    #[test]
    fn detect_png_from_magic_bytes() {
        assert_eq!(
            detect_image_format(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            ImageFormatKind::Png
        );
    }

    #[test]
    fn detect_webp_from_riff_header() {
        let header = b"RIFF\x24\x00\x00\x00WEBPVP8 ";
        assert_eq!(detect_image_format(header), ImageFormatKind::WebP);
    }

    #[test]
    fn riff_without_webp_is_unknown() {
        let header = b"RIFF\x24\x00\x00\x00WAVEfmt ";
        assert_eq!(detect_image_format(header), ImageFormatKind::Unknown);
    }

    #[test]
    fn detect_unsupported_formats() {
        assert_eq!(detect_image_format(b"GIF89a...."), ImageFormatKind::Gif);
        assert_eq!(detect_image_format(&[0x49, 0x49, 0x2A, 0x00]), ImageFormatKind::Tiff);
        assert_eq!(
            detect_image_format(b"\x00\x00\x00\x18ftypheic"),
            ImageFormatKind::Heic
        );
        assert!(!ImageFormatKind::Gif.is_supported());
        assert!(!ImageFormatKind::Heic.is_supported());
    }

    #[test]
    fn empty_and_text_are_unknown() {
        assert_eq!(detect_image_format(&[]), ImageFormatKind::Unknown);
        assert_eq!(detect_image_format(b"hello world"), ImageFormatKind::Unknown);
    }

    #[test]
    fn supported_formats_have_decoders() {
        for kind in [ImageFormatKind::Jpeg, ImageFormatKind::Png, ImageFormatKind::WebP] {
            assert!(kind.is_supported());
            assert!(kind.decoder_format().is_some());
        }
        assert!(ImageFormatKind::Bmp.decoder_format().is_none());
    }

    #[test]
    fn mime_guessed_from_extension() {
        assert_eq!(mime_from_filename("card.jpg").as_deref(), Some("image/jpeg"));
        assert_eq!(mime_from_filename("card.PNG").as_deref(), Some("image/png"));
        assert_eq!(mime_from_filename("card.webp").as_deref(), Some("image/webp"));
        assert_eq!(mime_from_filename("card"), None);
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_filename("/tmp/uploads/front.jpg"), "front.jpg");
        assert_eq!(sanitize_filename(""), "upload");
    }

    #[test]
    fn sanitize_truncates_long_names() {
        let long = "a".repeat(400) + ".png";
        assert_eq!(sanitize_filename(&long).chars().count(), 255);
    }

    #[test]
    fn format_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ImageFormatKind::WebP).unwrap();
        assert_eq!(json, "\"webp\"");
    }
}
