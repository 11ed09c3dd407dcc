use serde::{Deserialize, Serialize};

/// Fields printed on a CCCD card that the extractor looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardField {
    IdNumber,
    Name,
    DateOfBirth,
    Gender,
    Nationality,
    PlaceOfOrigin,
    PlaceOfResidence,
    ExpiryDate,
}

impl CardField {
    /// Fields counted by the completeness ratio.
    pub const TRACKED: [CardField; 5] = [
        CardField::IdNumber,
        CardField::Name,
        CardField::DateOfBirth,
        CardField::Gender,
        CardField::PlaceOfResidence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdNumber => "id_number",
            Self::Name => "name",
            Self::DateOfBirth => "date_of_birth",
            Self::Gender => "gender",
            Self::Nationality => "nationality",
            Self::PlaceOfOrigin => "place_of_origin",
            Self::PlaceOfResidence => "place_of_residence",
            Self::ExpiryDate => "expiry_date",
        }
    }
}

/// Identity data recovered from the front of a card.
///
/// `id_number`, when present, is exactly 12 ASCII digits. Dates are
/// zero-padded `DD/MM/YYYY`. Built once by `FieldExtractor`; read-only after.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    pub id_number: Option<String>,
    pub name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub place_of_origin: Option<String>,
    pub place_of_residence: Option<String>,
    pub expiry_date: Option<String>,
    /// Full recognized text, before sanitization.
    pub raw_text: String,
}

impl ExtractedFields {
    pub fn get(&self, field: CardField) -> Option<&str> {
        match field {
            CardField::IdNumber => self.id_number.as_deref(),
            CardField::Name => self.name.as_deref(),
            CardField::DateOfBirth => self.date_of_birth.as_deref(),
            CardField::Gender => self.gender.as_deref(),
            CardField::Nationality => self.nationality.as_deref(),
            CardField::PlaceOfOrigin => self.place_of_origin.as_deref(),
            CardField::PlaceOfResidence => self.place_of_residence.as_deref(),
            CardField::ExpiryDate => self.expiry_date.as_deref(),
        }
    }

    pub fn is_present(&self, field: CardField) -> bool {
        self.get(field).is_some_and(|v| !v.is_empty())
    }

    /// How many of the five tracked fields were found.
    pub fn tracked_present(&self) -> usize {
        CardField::TRACKED
            .iter()
            .filter(|f| self.is_present(**f))
            .count()
    }

    /// ID grouped for display: `"0012 3456 7890"`. `None` unless the ID is
    /// twelve ASCII digits.
    pub fn display_id_number(&self) -> Option<String> {
        let id = self
            .id_number
            .as_deref()
            .filter(|id| id.len() == 12 && id.bytes().all(|b| b.is_ascii_digit()))?;
        let groups: Vec<&str> = [&id[..4], &id[4..8], &id[8..]].into();
        Some(groups.join(" "))
    }

    /// ID with all but the last four digits hidden, for logs.
    pub fn masked_id_number(&self) -> Option<String> {
        let id = self.id_number.as_deref()?;
        let hidden = id.chars().count().saturating_sub(4);
        Some(
            id.chars()
                .enumerate()
                .map(|(i, c)| if i < hidden { '*' } else { c })
                .collect(),
        )
    }
}

/// Result of field-level validation. Valid iff `errors` is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// round(100 * tracked fields present / 5).
    pub completeness: u8,
}

/// What the back of the card showed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackSideReport {
    pub raw_text: String,
    pub has_required_elements: bool,
    pub matched_keywords: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_id(id: &str) -> ExtractedFields {
        ExtractedFields {
            id_number: Some(id.into()),
            ..Default::default()
        }
    }

    #[test]
    fn display_id_groups_by_four() {
        assert_eq!(
            with_id("001234567890").display_id_number().as_deref(),
            Some("0012 3456 7890")
        );
        assert_eq!(ExtractedFields::default().display_id_number(), None);
    }

    #[test]
    fn display_id_rejects_malformed_ids() {
        for id in ["1234", "0012345678901", "ễễễễ56789012", "00123456789O"] {
            assert_eq!(with_id(id).display_id_number(), None, "{id}");
        }
    }

    #[test]
    fn masked_id_keeps_last_four() {
        assert_eq!(
            with_id("001234567890").masked_id_number().as_deref(),
            Some("********7890")
        );
        assert_eq!(with_id("ễễ12345").masked_id_number().as_deref(), Some("***2345"));
        assert_eq!(with_id("12").masked_id_number().as_deref(), Some("12"));
    }

    #[test]
    fn tracked_present_ignores_untracked_fields() {
        let fields = ExtractedFields {
            id_number: Some("001234567890".into()),
            name: Some("NGUYỄN VĂN AN".into()),
            nationality: Some("Việt Nam".into()),
            place_of_origin: Some("Hà Nội".into()),
            ..Default::default()
        };
        assert_eq!(fields.tracked_present(), 2);
        assert!(fields.is_present(CardField::Nationality));
        assert!(!fields.is_present(CardField::Gender));
    }

    #[test]
    fn empty_string_is_not_present() {
        let fields = ExtractedFields {
            gender: Some(String::new()),
            ..Default::default()
        };
        assert!(!fields.is_present(CardField::Gender));
    }

    #[test]
    fn serializes_camel_case_with_nulls() {
        let json = serde_json::to_value(with_id("001234567890")).unwrap();
        assert_eq!(json["idNumber"], "001234567890");
        assert!(json["dateOfBirth"].is_null());
        assert!(json.get("rawText").is_some());
    }
}
