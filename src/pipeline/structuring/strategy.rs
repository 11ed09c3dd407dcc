//! Ordered extraction strategies per card field.
//!
//! Each field owns a `FieldRule`: a list of strategies tried in order and a
//! normalizer. A strategy yields candidate strings in priority order (earlier
//! lines first); the first candidate that survives normalization is the
//! field's value. Strategies are pure functions of the prepared text.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use super::patterns::{
    is_expiry_line, is_header_line, is_label_line, is_nationality_line, DATE, DIGIT_RUN,
    GENDER_LINE, ID_CANDIDATE, ID_LABEL, NOISY_ID, STRONG_LABEL, VIET_NAM,
};
use super::types::CardField;
use crate::pipeline::extraction::sanitize_extracted_text;

/// How far past an ID keyword the keyword-window scan looks, in bytes.
const ID_KEYWORD_WINDOW: usize = 60;

/// Lines after a label hit that may carry its value.
const LABEL_LOOKAHEAD: usize = 2;

/// A `Label:` prefix longer than this is treated as content, not a label.
const MAX_INLINE_LABEL_CHARS: usize = 30;

/// Minimum real digits in a noisy candidate before letter substitution.
const MIN_NOISY_DIGITS: usize = 9;

const ID_DIGITS: usize = 12;

/// Sanitized recognition output split into trimmed, non-empty lines.
#[derive(Debug, Clone)]
pub struct PreparedText {
    pub text: String,
    pub lines: Vec<String>,
}

impl PreparedText {
    pub fn new(raw: &str) -> Self {
        let text = sanitize_extracted_text(raw);
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        Self { text, lines }
    }
}

type Scan = fn(&PreparedText) -> Vec<String>;

#[derive(Clone, Copy)]
pub enum Strategy {
    /// Find the label, then the value pattern on the rest of that line or on
    /// one of the following lines. Spans matching `mask` are blanked before
    /// the value search.
    LabelAnchored {
        label: &'static LazyLock<Regex>,
        value: &'static LazyLock<Regex>,
        mask: Option<&'static LazyLock<Regex>>,
    },
    /// Whole-text heuristic used when no label is readable.
    Scan { name: &'static str, scan: Scan },
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LabelAnchored { .. } => "label_anchored",
            Self::Scan { name, .. } => *name,
        }
    }

    pub fn candidates(&self, text: &PreparedText) -> Vec<String> {
        match self {
            Self::LabelAnchored { label, value, mask } => {
                label_anchored(text, label, value, mask.map(|m| &**m))
            }
            Self::Scan { scan, .. } => scan(text),
        }
    }
}

pub struct FieldRule {
    pub field: CardField,
    pub strategies: Vec<Strategy>,
    pub normalize: fn(&str) -> Option<String>,
}

impl FieldRule {
    /// First normalized candidate across strategies, with the strategy that
    /// produced it.
    pub fn apply(&self, text: &PreparedText) -> Option<(String, &'static str)> {
        self.strategies.iter().find_map(|strategy| {
            strategy
                .candidates(text)
                .iter()
                .find_map(|c| (self.normalize)(c))
                .map(|value| (value, strategy.name()))
        })
    }
}

// ── Label-anchored search ─────────────────────────────────

fn label_anchored(
    text: &PreparedText,
    label: &Regex,
    value: &Regex,
    mask: Option<&Regex>,
) -> Vec<String> {
    let find = |segment: &str| -> Option<String> {
        let segment = match mask {
            Some(mask) => mask.replace_all(segment, " "),
            None => Cow::Borrowed(segment),
        };
        value.find(&segment).map(|m| m.as_str().to_string())
    };

    let mut out = Vec::new();
    for (i, line) in text.lines.iter().enumerate() {
        let Some(hit) = label.find(line) else {
            continue;
        };
        out.extend(find(value_part(&line[hit.end()..])));
        for next in text.lines.iter().skip(i + 1).take(LABEL_LOOKAHEAD) {
            if is_label_line(next) {
                continue;
            }
            out.extend(find(next));
        }
    }
    out
}

/// Strip separators left after a label and, for bilingual labels such as
/// `Số / No: 0012...`, skip the second label up to its colon.
pub fn value_part(rest: &str) -> &str {
    let rest = rest.trim_start_matches(|c: char| c.is_whitespace() || "/:.-,".contains(c));
    if let Some((head, tail)) = rest.split_once(':') {
        if head.chars().count() <= MAX_INLINE_LABEL_CHARS && !head.chars().any(|c| c.is_ascii_digit())
        {
            return tail.trim();
        }
    }
    rest.trim()
}

// ── ID scans ──────────────────────────────────────────────

pub fn scan_noisy_id(text: &PreparedText) -> Vec<String> {
    NOISY_ID
        .find_iter(&text.text)
        .map(|m| m.as_str())
        .filter(|s| s.chars().filter(char::is_ascii_digit).count() >= MIN_NOISY_DIGITS)
        .map(|s| {
            s.chars()
                .map(|c| match c {
                    'O' | 'o' => '0',
                    'I' | 'l' => '1',
                    'S' => '5',
                    'B' => '8',
                    other => other,
                })
                .collect::<String>()
        })
        .collect()
}

pub fn scan_id_keyword_window(text: &PreparedText) -> Vec<String> {
    let t = text.text.as_str();
    ID_LABEL
        .find_iter(t)
        .filter_map(|hit| {
            let mut end = (hit.end() + ID_KEYWORD_WINDOW).min(t.len());
            while !t.is_char_boundary(end) {
                end -= 1;
            }
            ID_CANDIDATE
                .find(&t[hit.end()..end])
                .map(|m| m.as_str().to_string())
        })
        .collect()
}

pub fn scan_twelve_digit_runs(text: &PreparedText) -> Vec<String> {
    DIGIT_RUN
        .find_iter(&text.text)
        .map(|m| m.as_str())
        .filter(|s| s.len() == ID_DIGITS)
        .map(String::from)
        .collect()
}

// ── Other scans ───────────────────────────────────────────

/// Fully upper-case lines with at least two tokens, longest first. Stable
/// sort keeps the earlier line on ties.
pub fn scan_uppercase_name(text: &PreparedText) -> Vec<String> {
    let mut lines: Vec<&String> = text
        .lines
        .iter()
        .filter(|l| l.split_whitespace().count() >= 2)
        .filter(|l| l.chars().any(char::is_alphabetic))
        .filter(|l| l.chars().all(|c| !c.is_lowercase()))
        .filter(|l| !is_header_line(l) && !is_label_line(l) && !VIET_NAM.is_match(l))
        .collect();
    lines.sort_by_key(|l| std::cmp::Reverse(l.chars().count()));
    lines.into_iter().cloned().collect()
}

pub fn scan_first_date(text: &PreparedText) -> Vec<String> {
    text.lines
        .iter()
        .filter(|l| !is_expiry_line(l))
        .flat_map(|l| DATE.find_iter(l).map(|m| m.as_str().to_string()))
        .collect()
}

pub fn scan_standalone_gender(text: &PreparedText) -> Vec<String> {
    text.lines
        .iter()
        .filter(|l| !l.contains(',') && !is_nationality_line(l))
        .map(|l| value_part(l))
        .filter(|v| GENDER_LINE.is_match(v))
        .map(String::from)
        .collect()
}

pub fn scan_country_name(text: &PreparedText) -> Vec<String> {
    if VIET_NAM.is_match(&text.text) {
        vec!["Việt Nam".to_string()]
    } else {
        Vec::new()
    }
}

/// Comma-separated lines of at least 15 characters, longest first.
pub fn scan_address_line(text: &PreparedText) -> Vec<String> {
    let mut lines: Vec<&String> = text
        .lines
        .iter()
        .filter(|l| l.contains(',') && l.chars().count() >= 15)
        .filter(|l| !is_header_line(l) && !STRONG_LABEL.is_match(l))
        .collect();
    lines.sort_by_key(|l| std::cmp::Reverse(l.chars().count()));
    lines.into_iter().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::patterns::{
        GENDER_LABEL, GENDER_VALUE, ID_LABEL, NAME_LABEL, NAME_VALUE,
    };

    #[test]
    fn prepared_text_drops_blank_lines() {
        let text = PreparedText::new("  a  \n\n\t\nb\x00 ");
        assert_eq!(text.lines, vec!["a", "b"]);
    }

    #[test]
    fn value_part_skips_second_label() {
        assert_eq!(value_part(" / No: 001234567890"), "001234567890");
        assert_eq!(value_part(": NGUYỄN VĂN AN"), "NGUYỄN VĂN AN");
        assert_eq!(value_part(" / Full name:"), "");
        assert_eq!(value_part("12 Lê Lợi: Phường 1"), "12 Lê Lợi: Phường 1");
    }

    #[test]
    fn label_anchored_reads_same_line_then_following() {
        let text = PreparedText::new("Họ và tên / Full name:\nNGUYỄN VĂN AN\nTRẦN THỊ B");
        let found = label_anchored(&text, &NAME_LABEL, &NAME_VALUE, None);
        assert_eq!(found, vec!["NGUYỄN VĂN AN", "TRẦN THỊ B"]);
    }

    #[test]
    fn label_anchored_skips_label_lines_below() {
        let text = PreparedText::new("Số / No:\nNgày sinh: 01/01/1990\n001234567890");
        let found = label_anchored(&text, &ID_LABEL, &ID_CANDIDATE, None);
        assert_eq!(found, vec!["001234567890"]);
    }

    #[test]
    fn label_anchored_stops_after_lookahead() {
        let text = PreparedText::new("Số:\na\nb\n001234567890");
        assert!(label_anchored(&text, &ID_LABEL, &ID_CANDIDATE, None).is_empty());
    }

    #[test]
    fn masked_spans_are_not_searched() {
        let text = PreparedText::new("Giới tính: Quốc tịch: Việt Nam\nViệt Nam");
        assert_eq!(
            label_anchored(&text, &GENDER_LABEL, &GENDER_VALUE, None),
            vec!["Nam", "Nam"]
        );
        assert!(label_anchored(&text, &GENDER_LABEL, &GENDER_VALUE, Some(&*VIET_NAM)).is_empty());
    }

    #[test]
    fn mask_keeps_gender_before_country() {
        let text = PreparedText::new("Giới tính / Sex: Nữ   Quốc tịch / Nationality: Việt Nam");
        assert_eq!(
            label_anchored(&text, &GENDER_LABEL, &GENDER_VALUE, Some(&*VIET_NAM)),
            vec!["Nữ"]
        );
    }

    #[test]
    fn noisy_scan_maps_lookalike_letters() {
        let text = PreparedText::new("O0123456789O");
        assert_eq!(scan_noisy_id(&text), vec!["001234567890"]);
    }

    #[test]
    fn noisy_scan_needs_enough_real_digits() {
        let text = PreparedText::new("BOSSOOIIlll12");
        assert!(scan_noisy_id(&text).is_empty());
    }

    #[test]
    fn keyword_window_crosses_lines() {
        let text = PreparedText::new("CCCD\n0012 3456 7890");
        assert_eq!(scan_id_keyword_window(&text), vec!["0012 3456 7890"]);
    }

    #[test]
    fn keyword_window_respects_char_boundaries() {
        let text = PreparedText::new(&format!("Số {}", "ễ".repeat(40)));
        assert!(scan_id_keyword_window(&text).is_empty());
    }

    #[test]
    fn twelve_digit_runs_only() {
        let text = PreparedText::new("1234567890123 001234567890 12345");
        assert_eq!(scan_twelve_digit_runs(&text), vec!["001234567890"]);
    }

    #[test]
    fn uppercase_name_prefers_longest_then_earliest() {
        let text = PreparedText::new(
            "CĂN CƯỚC CÔNG DÂN\nLÊ VĂN AN\nNguyễn Văn Bình\nTRẦN THỊ MAI\nVIỆT NAM",
        );
        assert_eq!(scan_uppercase_name(&text), vec!["TRẦN THỊ MAI", "LÊ VĂN AN"]);
    }

    #[test]
    fn first_date_skips_expiry_lines() {
        let text = PreparedText::new("Có giá trị đến: 01/01/2035\n15/08/1992");
        assert_eq!(scan_first_date(&text), vec!["15/08/1992"]);
    }

    #[test]
    fn standalone_gender_ignores_names_and_nationality() {
        let text = PreparedText::new("NGUYỄN VĂN NAM\nViệt Nam\nSex: Nữ");
        assert_eq!(scan_standalone_gender(&text), vec!["Nữ"]);
    }

    #[test]
    fn address_scan_longest_first() {
        let text = PreparedText::new("Hà Nội, VN\n12 Lê Lợi, Phường 1, Quận 3, TP HCM\n5 Hàng Bài, Hà Nội");
        assert_eq!(
            scan_address_line(&text),
            vec!["12 Lê Lợi, Phường 1, Quận 3, TP HCM", "5 Hàng Bài, Hà Nội"]
        );
    }

    #[test]
    fn country_scan_canonicalizes_spelling() {
        assert_eq!(scan_country_name(&PreparedText::new("VIET NAM")), vec!["Việt Nam"]);
        assert!(scan_country_name(&PreparedText::new("LAO")).is_empty());
    }
}
