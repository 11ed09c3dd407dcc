use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::patterns::{
    is_header_line, is_label_line, DATE, DIGIT_RUN, DOB_LABEL, EXPIRY_LABEL, GENDER_LABEL, GENDER_VALUE,
    ID_CANDIDATE, ID_LABEL, NAME_LABEL, NAME_VALUE, NATIONALITY_LABEL, ORIGIN_LABEL,
    RESIDENCE_LABEL, TEXT_VALUE, VIET_NAM,
};
use super::strategy::{
    scan_address_line, scan_country_name, scan_first_date, scan_id_keyword_window,
    scan_noisy_id, scan_standalone_gender, scan_twelve_digit_runs, scan_uppercase_name,
    FieldRule, PreparedText, Strategy,
};
use super::types::{CardField, ExtractedFields};

const ID_DIGITS: usize = 12;
const MIN_NAME_TOKENS: usize = 2;
const MAX_NAME_TOKENS: usize = 8;
const MIN_PLACE_CHARS: usize = 3;

/// Turns raw recognition text into `ExtractedFields`.
///
/// Deterministic and total: unreadable text yields empty fields, never an
/// error. Once a field is set by a strategy it is not overwritten.
pub struct FieldExtractor {
    rules: Vec<FieldRule>,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor {
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    pub fn extract(&self, raw_text: &str) -> ExtractedFields {
        let text = PreparedText::new(raw_text);
        let mut fields = ExtractedFields {
            raw_text: raw_text.to_string(),
            ..Default::default()
        };

        for rule in &self.rules {
            if fields.is_present(rule.field) {
                continue;
            }
            if let Some((value, strategy)) = rule.apply(&text) {
                debug!(field = rule.field.as_str(), strategy, "Field extracted");
                set_field(&mut fields, rule.field, value);
            }
        }

        match (&fields.place_of_origin, &fields.place_of_residence) {
            (None, Some(residence)) => fields.place_of_origin = Some(residence.clone()),
            (Some(origin), None) => fields.place_of_residence = Some(origin.clone()),
            _ => {}
        }

        debug!(
            lines = text.lines.len(),
            found = fields.tracked_present(),
            id = fields.masked_id_number().as_deref().unwrap_or("-"),
            "Card text parsed"
        );
        fields
    }
}

fn set_field(fields: &mut ExtractedFields, field: CardField, value: String) {
    let slot = match field {
        CardField::IdNumber => &mut fields.id_number,
        CardField::Name => &mut fields.name,
        CardField::DateOfBirth => &mut fields.date_of_birth,
        CardField::Gender => &mut fields.gender,
        CardField::Nationality => &mut fields.nationality,
        CardField::PlaceOfOrigin => &mut fields.place_of_origin,
        CardField::PlaceOfResidence => &mut fields.place_of_residence,
        CardField::ExpiryDate => &mut fields.expiry_date,
    };
    slot.get_or_insert(value);
}

fn scan(name: &'static str, scan: fn(&PreparedText) -> Vec<String>) -> Strategy {
    Strategy::Scan { name, scan }
}

fn labeled(label: &'static LazyLock<Regex>, value: &'static LazyLock<Regex>) -> Strategy {
    Strategy::LabelAnchored { label, value, mask: None }
}

fn default_rules() -> Vec<FieldRule> {
    vec![
        FieldRule {
            field: CardField::IdNumber,
            strategies: vec![
                labeled(&ID_LABEL, &ID_CANDIDATE),
                scan("noisy_digits", scan_noisy_id),
                scan("keyword_window", scan_id_keyword_window),
                scan("digit_runs", scan_twelve_digit_runs),
            ],
            normalize: normalize_id_number,
        },
        FieldRule {
            field: CardField::Name,
            strategies: vec![
                labeled(&NAME_LABEL, &NAME_VALUE),
                scan("uppercase_line", scan_uppercase_name),
            ],
            normalize: normalize_name,
        },
        FieldRule {
            field: CardField::DateOfBirth,
            strategies: vec![
                labeled(&DOB_LABEL, &DATE),
                scan("first_date", scan_first_date),
            ],
            normalize: normalize_date,
        },
        FieldRule {
            field: CardField::Gender,
            strategies: vec![
                Strategy::LabelAnchored {
                    label: &GENDER_LABEL,
                    value: &GENDER_VALUE,
                    mask: Some(&VIET_NAM),
                },
                scan("standalone_token", scan_standalone_gender),
            ],
            normalize: normalize_gender,
        },
        FieldRule {
            field: CardField::Nationality,
            strategies: vec![
                labeled(&NATIONALITY_LABEL, &TEXT_VALUE),
                scan("country_name", scan_country_name),
            ],
            normalize: normalize_nationality,
        },
        FieldRule {
            field: CardField::PlaceOfOrigin,
            strategies: vec![labeled(&ORIGIN_LABEL, &TEXT_VALUE)],
            normalize: normalize_place,
        },
        FieldRule {
            field: CardField::PlaceOfResidence,
            strategies: vec![
                labeled(&RESIDENCE_LABEL, &TEXT_VALUE),
                scan("address_line", scan_address_line),
            ],
            normalize: normalize_place,
        },
        FieldRule {
            field: CardField::ExpiryDate,
            strategies: vec![labeled(&EXPIRY_LABEL, &DATE)],
            normalize: normalize_date,
        },
    ]
}

// ═══════════════════════════════════════════
// Normalizers
// ═══════════════════════════════════════════

/// Twelve digits from a candidate, else nothing.
///
/// Digit groups are joined only when consecutive groups add up to exactly
/// twelve digits, so a stray digit before a printed number is not merged in.
/// A single run longer than twelve keeps its first twelve digits.
pub fn normalize_id_number(candidate: &str) -> Option<String> {
    let groups: Vec<&str> = DIGIT_RUN.find_iter(candidate).map(|m| m.as_str()).collect();
    for start in 0..groups.len() {
        let mut digits = 0;
        for (offset, group) in groups[start..].iter().enumerate() {
            digits += group.len();
            if digits == ID_DIGITS {
                return Some(groups[start..=start + offset].concat());
            }
            if digits > ID_DIGITS {
                break;
            }
        }
    }
    let digits = groups.concat();
    (digits.len() >= ID_DIGITS).then(|| digits[..ID_DIGITS].to_string())
}

pub fn normalize_name(candidate: &str) -> Option<String> {
    let upper = candidate
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase();
    let tokens = upper.split(' ').filter(|t| !t.is_empty()).count();
    if !(MIN_NAME_TOKENS..=MAX_NAME_TOKENS).contains(&tokens) {
        return None;
    }
    if upper.chars().any(|c| !(c.is_alphabetic() || c == ' ' || is_mark(c))) {
        return None;
    }
    if is_header_line(&upper) || is_label_line(&upper) || VIET_NAM.is_match(&upper) {
        return None;
    }
    Some(upper)
}

/// Zero-padded `DD/MM/YYYY` when day and month are in range.
pub fn normalize_date(candidate: &str) -> Option<String> {
    let caps = DATE.captures(candidate)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year = &caps[3];
    ((1..=31).contains(&day) && (1..=12).contains(&month))
        .then(|| format!("{day:02}/{month:02}/{year}"))
}

pub fn normalize_gender(candidate: &str) -> Option<String> {
    match candidate.trim().to_lowercase().as_str() {
        "nam" => Some("Nam".to_string()),
        "nữ" | "nu" => Some("Nữ".to_string()),
        _ => None,
    }
}

fn normalize_nationality(candidate: &str) -> Option<String> {
    if VIET_NAM.is_match(candidate) {
        return Some("Việt Nam".to_string());
    }
    normalize_place(candidate)
}

pub fn normalize_place(candidate: &str) -> Option<String> {
    let value = candidate
        .trim()
        .trim_end_matches(|c: char| c.is_whitespace() || ",.;:-/".contains(c));
    if value.chars().count() < MIN_PLACE_CHARS {
        return None;
    }
    if is_header_line(value) || is_label_line(value) {
        return None;
    }
    Some(value.to_string())
}

fn is_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}')
}
