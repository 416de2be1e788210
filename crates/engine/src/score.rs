//! Deterministic scoring (stage 5).
//!
//! Scoring reads `AssetFacts` and the gated analysis only; the type system
//! keeps source provenance out of reach, so a source-specific adjustment
//! cannot be written here.

use common::{AssetFacts, Confidence};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::confidence::ConfidenceGatedAnalysis;

/// Reserved: location scoring is not yet a behavioural requirement.
pub const LOCATION_SCORE_DEFAULT: f64 = 50.0;

pub const WEIGHT_BMV: f64 = 0.50;
pub const WEIGHT_URGENCY: f64 = 0.20;
pub const WEIGHT_LOCATION: f64 = 0.15;
pub const WEIGHT_VALUE: f64 = 0.15;

/// The four component scores, each 0..=100.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComponentScores {
    pub bmv: f64,
    pub urgency: f64,
    pub location: f64,
    pub value: f64,
}

/// A gated analysis with its scores and rank.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScoredAsset {
    pub analysis: ConfidenceGatedAnalysis,
    pub scores: ComponentScores,
    pub overall_score: f64,
    /// 1-indexed position after batch ranking; 1 for a single evaluation.
    pub rank: u32,
}

/// Piecewise BMV score with the confidence modifier applied.
pub fn bmv_score(bmv_percent: f64, confidence: Confidence) -> f64 {
    let base = if bmv_percent <= 0.0 {
        0.0
    } else if bmv_percent < 5.0 {
        bmv_percent * 5.0
    } else if bmv_percent < 10.0 {
        25.0 + (bmv_percent - 5.0) * 5.0
    } else if bmv_percent < 20.0 {
        50.0 + (bmv_percent - 10.0) * 3.0
    } else {
        (80.0 + (bmv_percent - 20.0) * 2.0).min(100.0)
    };
    let modifier = match confidence {
        Confidence::High => 1.0,
        Confidence::Medium => 0.85,
        Confidence::Low => 0.70,
    };
    base * modifier
}

/// Urgency from days on market.
pub fn urgency_score(days_on_market: i64) -> f64 {
    let days = days_on_market as f64;
    if days_on_market < 30 {
        days * 20.0 / 30.0
    } else if days_on_market < 60 {
        20.0 + (days - 30.0) * 20.0 / 30.0
    } else if days_on_market < 90 {
        40.0 + (days - 60.0)
    } else {
        (70.0 + (days - 90.0) / 3.0).min(100.0)
    }
}

/// How close the discount sits to the configured target BMV tier.
pub fn value_score(bmv_percent: f64, target_bmv_percent: f64) -> f64 {
    if bmv_percent <= 0.0 {
        return 0.0;
    }
    (bmv_percent / target_bmv_percent * 100.0).min(100.0)
}

/// Score one asset. Deterministic in its arguments.
pub fn score(
    facts: &AssetFacts,
    gated: &ConfidenceGatedAnalysis,
    target_bmv_percent: f64,
) -> (ComponentScores, f64) {
    let scores = ComponentScores {
        bmv: bmv_score(gated.market.bmv_percent, gated.confidence),
        urgency: urgency_score(facts.days_on_market),
        location: LOCATION_SCORE_DEFAULT,
        value: value_score(gated.market.bmv_percent, target_bmv_percent),
    };
    let overall = WEIGHT_BMV * scores.bmv
        + WEIGHT_URGENCY * scores.urgency
        + WEIGHT_LOCATION * scores.location
        + WEIGHT_VALUE * scores.value;
    (scores, overall)
}

/// Ranking key: overall DESC, then BMV% DESC, then asking price ASC.
///
/// The sort using this key must be stable so equal keys keep insertion
/// order.
pub fn ranking_cmp(
    a: (f64, f64, i64),
    b: (f64, f64, i64),
) -> std::cmp::Ordering {
    b.0.partial_cmp(&a.0)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then(b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
        .then(a.2.cmp(&b.2))
}
