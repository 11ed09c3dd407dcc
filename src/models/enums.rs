use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field} value: {value}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// Account verification state, as persisted by the account store.
str_enum!(VerificationStatus {
    NotStarted => "not_started",
    PendingReview => "pending_review",
    NeedsImprovement => "needs_improvement",
    Verified => "verified",
    Rejected => "rejected",
});

impl VerificationStatus {
    /// Routing after an automated check: at or above `cutoff` goes to manual
    /// review, below it the user is asked to resubmit.
    pub fn from_score(score: u8, cutoff: u8) -> Self {
        if score >= cutoff {
            Self::PendingReview
        } else {
            Self::NeedsImprovement
        }
    }
}

str_enum!(CardSide {
    Front => "front",
    Back => "back",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn verification_status_round_trip() {
        for (variant, s) in [
            (VerificationStatus::NotStarted, "not_started"),
            (VerificationStatus::PendingReview, "pending_review"),
            (VerificationStatus::NeedsImprovement, "needs_improvement"),
            (VerificationStatus::Verified, "verified"),
            (VerificationStatus::Rejected, "rejected"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(VerificationStatus::from_str(s).unwrap(), variant);
            assert_eq!(serde_json::to_string(&variant).unwrap(), format!("\"{s}\""));
        }
    }

    #[test]
    fn status_from_score_uses_cutoff() {
        assert_eq!(VerificationStatus::from_score(70, 70), VerificationStatus::PendingReview);
        assert_eq!(VerificationStatus::from_score(100, 70), VerificationStatus::PendingReview);
        assert_eq!(VerificationStatus::from_score(69, 70), VerificationStatus::NeedsImprovement);
        assert_eq!(VerificationStatus::from_score(0, 0), VerificationStatus::PendingReview);
    }

    #[test]
    fn card_side_display() {
        assert_eq!(CardSide::Front.to_string(), "front");
        assert_eq!(CardSide::from_str("back").unwrap(), CardSide::Back);
    }

    #[test]
    fn invalid_enum_value_rejected() {
        let err = VerificationStatus::from_str("approved").unwrap_err();
        assert_eq!(err.field, "VerificationStatus");
        assert_eq!(err.value, "approved");
    }
}
