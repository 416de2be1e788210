//! Pipeline outcome enums: confidence grades and recommendations.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Confidence in a market analysis, derived from comparable evidence
/// quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final classification of an opportunity.
///
/// STRONG > MODERATE > WEAK > AVOID form a fixed ordering used for
/// confidence caps; OVERPRICED and INSUFFICIENT_DATA are terminal outcomes
/// outside that ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Strong,
    Moderate,
    Weak,
    Avoid,
    Overpriced,
    InsufficientData,
}

impl Recommendation {
    /// Position in the STRONG > MODERATE > WEAK > AVOID ordering.
    ///
    /// Terminal outcomes have no strength and are never capped.
    pub fn strength(&self) -> Option<u8> {
        match self {
            Self::Strong => Some(3),
            Self::Moderate => Some(2),
            Self::Weak => Some(1),
            Self::Avoid => Some(0),
            Self::Overpriced | Self::InsufficientData => None,
        }
    }

    /// Apply a cap: the result never exceeds `cap` in the fixed ordering.
    ///
    /// Caps only downgrade. Terminal outcomes pass through unchanged.
    pub fn capped_at(self, cap: Recommendation) -> Recommendation {
        match (self.strength(), cap.strength()) {
            (Some(s), Some(c)) if s > c => cap,
            _ => self,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strong => "STRONG",
            Self::Moderate => "MODERATE",
            Self::Weak => "WEAK",
            Self::Avoid => "AVOID",
            Self::Overpriced => "OVERPRICED",
            Self::InsufficientData => "INSUFFICIENT_DATA",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
