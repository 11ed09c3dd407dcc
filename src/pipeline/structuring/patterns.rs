//! Label and value patterns for the printed CCCD layout.
//!
//! Labels are bilingual on the card ("Họ và tên / Full name"). Every label
//! also accepts the unaccented spelling recognizers fall back to when tone
//! marks are lost. Alternations list longer labels first.

use std::sync::LazyLock;

use regex::Regex;

// ═══════════════════════════════════════════
// Field labels
// ═══════════════════════════════════════════

pub static ID_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:số định danh cá nhân|so dinh danh ca nhan|personal identification number|số|so|no|cccd|cmnd)\b",
    )
    .unwrap()
});

pub static NAME_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:họ,? chữ đệm và tên|họ và tên|ho va ten|họ tên|ho ten|full name|name)\b")
        .unwrap()
});

pub static DOB_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:ngày,? tháng,? năm sinh|ngày sinh|ngay sinh|date of birth|dob)\b").unwrap()
});

pub static GENDER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:giới tính|gioi tinh|sex|gender)\b").unwrap()
});

pub static NATIONALITY_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:quốc tịch|quoc tich|nationality)\b").unwrap()
});

pub static ORIGIN_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:quê quán|que quan|place of origin)\b").unwrap()
});

pub static RESIDENCE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:nơi thường trú|noi thuong tru|place of residence|thường trú|thuong tru|nơi cư trú|địa chỉ|address)\b",
    )
    .unwrap()
});

pub static EXPIRY_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:có giá trị đến|co gia tri den|giá trị đến|date of expiry|expiry|expires|valid until)\b",
    )
    .unwrap()
});

/// Multi-word labels only. A line matching this is a label line, never a
/// value (names, addresses).
pub static STRONG_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:họ và tên|ho va ten|full name|ngày sinh|ngay sinh|date of birth|giới tính|gioi tinh|quốc tịch|quoc tich|nationality|quê quán|que quan|place of origin|thường trú|thuong tru|place of residence|có giá trị|co gia tri|date of expiry|số định danh|personal identification)\b",
    )
    .unwrap()
});

// ═══════════════════════════════════════════
// Values
// ═══════════════════════════════════════════

/// At least 12 digits, optionally split by single spaces or dots.
pub static ID_CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d(?:[ .]?\d){11,}").unwrap());

/// Digit runs where the recognizer swapped digits for look-alike letters.
pub static NOISY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9OoIlSB]{12,}\b").unwrap());

pub static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// D/M/YYYY with `/`, `.` or `-` separators.
pub static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})\s*[/.\-]\s*(\d{1,2})\s*[/.\-]\s*(\d{4})\b").unwrap()
});

/// Two or more letter tokens, any case.
pub static NAME_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{M}]+(?:[ ]+[\p{L}\p{M}]+)+").unwrap());

pub static GENDER_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:nam|nữ|nu)\b").unwrap());

/// A whole line that is only a gender token, for the unlabeled scan.
pub static GENDER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:Nam|Nữ|NAM|NỮ)$").unwrap());

/// Free text: place names and addresses.
pub static TEXT_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}][\p{L}\p{M}\p{N} ,.\-/']*").unwrap());

pub static VIET_NAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bvi[eệ]t\s*nam\b").unwrap());

// ═══════════════════════════════════════════
// Card header
// ═══════════════════════════════════════════

/// Phrases from the printed card title block.
const HEADER_PHRASES: &[&str] = &[
    "cộng hòa",
    "cộng hoà",
    "cong hoa",
    "xã hội chủ nghĩa",
    "xa hoi chu nghia",
    "độc lập",
    "hạnh phúc",
    "căn cước",
    "can cuoc",
    "công dân",
    "socialist republic",
    "independence",
    "happiness",
    "citizen identity",
    "identity card",
];

pub fn is_header_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    HEADER_PHRASES.iter().any(|p| lower.contains(p))
}

pub fn is_label_line(line: &str) -> bool {
    STRONG_LABEL.is_match(line) || line.trim_end().ends_with(':')
}

/// Nationality and expiry lines, which carry `Nam` and dates that belong
/// to other fields.
pub fn is_nationality_line(line: &str) -> bool {
    NATIONALITY_LABEL.is_match(line) || VIET_NAM.is_match(line)
}

pub fn is_expiry_line(line: &str) -> bool {
    EXPIRY_LABEL.is_match(line)
}
