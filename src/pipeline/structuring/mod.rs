//! Card text structuring: raw recognition text to validated, scored fields.

pub mod back_side;
pub mod confidence;
pub mod parser;
pub mod patterns;
pub mod strategy;
pub mod types;
pub mod validation;

pub use back_side::BackSideAnalyzer;
pub use confidence::ScoreEngine;
pub use parser::FieldExtractor;
pub use strategy::{FieldRule, PreparedText, Strategy};
pub use types::*;
pub use validation::{completeness, parse_card_date, FieldValidator};
