use super::types::{BackSideReport, CardField, ExtractedFields, FieldValidation};
use crate::pipeline_config::ScoringConfig;

/// Composite trust score for a verification.
///
/// ```text
/// completeness * w + id bonus + name bonus + dob bonus
///   - penalty * errors + back bonus (when the back has its markers)
/// ```
///
/// The sum is rounded, then clamped to 0..=100.
pub struct ScoreEngine {
    config: ScoringConfig,
}

impl ScoreEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(
        &self,
        fields: &ExtractedFields,
        validation: &FieldValidation,
        back: Option<&BackSideReport>,
    ) -> u8 {
        let c = &self.config;
        let bonus = |field: CardField, weight: f64| {
            if fields.is_present(field) {
                weight
            } else {
                0.0
            }
        };

        let mut total = f64::from(validation.completeness) * c.completeness_weight;
        total += bonus(CardField::IdNumber, c.id_number_bonus);
        total += bonus(CardField::Name, c.name_bonus);
        total += bonus(CardField::DateOfBirth, c.date_of_birth_bonus);
        total -= c.error_penalty * validation.errors.len() as f64;
        if back.is_some_and(|b| b.has_required_elements) {
            total += c.back_side_bonus;
        }

        total.round().clamp(0.0, 100.0) as u8
    }
}

impl Default for ScoreEngine {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}
