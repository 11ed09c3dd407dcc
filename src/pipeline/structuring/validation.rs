//! Field-level checks on extracted card data.
//! Missing optional fields are warnings; only a missing ID number or an
//! impossible date of birth make the card invalid.

use chrono::{Datelike, Local, NaiveDate};

use super::types::{CardField, ExtractedFields, FieldValidation};

const MIN_PLAUSIBLE_AGE: i32 = 15;
const MAX_PLAUSIBLE_AGE: i32 = 100;

pub const MSG_ID_MISSING: &str = "ID number not found or invalid";
pub const MSG_NAME_MISSING: &str = "Name not clearly detected";
pub const MSG_DOB_MISSING: &str = "Date of birth not found";
pub const MSG_DOB_UNREADABLE: &str = "Date of birth is not a valid calendar date";
pub const MSG_DOB_FUTURE: &str = "invalid date of birth (future date)";
pub const MSG_UNUSUAL_AGE: &str = "Unusual age detected, please verify";
pub const MSG_GENDER_MISSING: &str = "Gender not detected";
pub const MSG_EXPIRED: &str = "ID card has expired";

#[derive(Debug, Default, Clone, Copy)]
pub struct FieldValidator;

impl FieldValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate against the local calendar date.
    pub fn validate(&self, fields: &ExtractedFields) -> FieldValidation {
        self.validate_on(fields, Local::now().date_naive())
    }

    pub fn validate_on(&self, fields: &ExtractedFields, today: NaiveDate) -> FieldValidation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if !fields.is_present(CardField::IdNumber) {
            errors.push(MSG_ID_MISSING.to_string());
        }
        if !fields.is_present(CardField::Name) {
            warnings.push(MSG_NAME_MISSING.to_string());
        }

        match fields.date_of_birth.as_deref().filter(|d| !d.is_empty()) {
            None => warnings.push(MSG_DOB_MISSING.to_string()),
            Some(raw) => match parse_card_date(raw) {
                None => warnings.push(MSG_DOB_UNREADABLE.to_string()),
                Some(dob) if dob > today => errors.push(MSG_DOB_FUTURE.to_string()),
                Some(dob) => {
                    let age = age_on(dob, today);
                    if !(MIN_PLAUSIBLE_AGE..=MAX_PLAUSIBLE_AGE).contains(&age) {
                        warnings.push(MSG_UNUSUAL_AGE.to_string());
                    }
                }
            },
        }

        if !fields.is_present(CardField::Gender) {
            warnings.push(MSG_GENDER_MISSING.to_string());
        }

        if let Some(expiry) = fields.expiry_date.as_deref().and_then(parse_card_date) {
            if expiry < today {
                warnings.push(MSG_EXPIRED.to_string());
            }
        }

        if !errors.is_empty() {
            tracing::debug!(
                error_count = errors.len(),
                warning_count = warnings.len(),
                "Card fields failed validation"
            );
        }

        FieldValidation {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            completeness: completeness(fields),
        }
    }
}

/// round(100 * present / 5) over the tracked fields.
pub fn completeness(fields: &ExtractedFields) -> u8 {
    let total = CardField::TRACKED.len() as f64;
    (100.0 * fields.tracked_present() as f64 / total).round() as u8
}

/// `D/M/YYYY` (any of `/ . -`) to a calendar date; rejects 31/02 and friends.
pub fn parse_card_date(value: &str) -> Option<NaiveDate> {
    let mut parts = value
        .split(['/', '.', '-'])
        .map(|p| p.trim().parse::<u32>());
    let day = parts.next()?.ok()?;
    let month = parts.next()?.ok()?;
    let year = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

/// Whole years elapsed between `dob` and `today`.
fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}
