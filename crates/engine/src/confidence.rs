//! Confidence gate (stage 4).
//!
//! Grades the comparable evidence behind a market analysis and derives the
//! recommendation cap the classifier must honour. Caps only ever
//! downgrade.

use common::{Confidence, Recommendation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::market::MarketAnalysis;

/// A market analysis with its evidence grade and cap attached.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfidenceGatedAnalysis {
    pub market: MarketAnalysis,
    pub confidence: Confidence,
    pub confidence_reason: String,
    /// Maximum recommendation the classifier may emit; `None` when
    /// uncapped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_cap: Option<Recommendation>,
    /// Why the cap applies, phrased for the classification reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap_reason: Option<String>,
}

/// Grade a market analysis and compute its cap.
pub fn gate(market: MarketAnalysis) -> ConfidenceGatedAnalysis {
    let comps = market.comps_used;
    let months = market.comp_date_range_months;
    let radius = market.comp_radius_miles;

    let (confidence, confidence_reason) = if comps >= 5 && months <= 12 && radius <= 0.5 {
        (
            Confidence::High,
            format!("{comps} comps within {radius} mi and {months} months"),
        )
    } else if comps >= 3 && months <= 18 && radius <= 1.0 {
        (
            Confidence::Medium,
            format!("{comps} comps within {radius} mi and {months} months"),
        )
    } else {
        (
            Confidence::Low,
            format!("only {comps} comps at {radius} mi / {months} months"),
        )
    };

    // The tightest applicable cap wins; fewer than three comps is stricter
    // than LOW confidence alone.
    let (recommendation_cap, cap_reason) = if comps == 0 {
        (None, None)
    } else if comps < 3 {
        (Some(Recommendation::Weak), Some("<3 comps".to_string()))
    } else if confidence == Confidence::Low {
        (
            Some(Recommendation::Moderate),
            Some("LOW confidence".to_string()),
        )
    } else {
        (None, None)
    };

    ConfidenceGatedAnalysis {
        market,
        confidence,
        confidence_reason,
        recommendation_cap,
        cap_reason,
    }
}
