//! Output classification (stage 6).
//!
//! Maps a scored analysis onto the closed recommendation set and applies
//! the confidence cap. The reason string always names the branch that
//! fired and any cap that downgraded it.

use common::Recommendation;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::confidence::ConfidenceGatedAnalysis;

/// Classification outcome with its explanation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Classification {
    pub recommendation: Recommendation,
    pub reason: String,
    /// The cap that downgraded the base recommendation, when one did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap_applied: Option<Recommendation>,
}

/// Classify a gated analysis given its composite score.
pub fn classify(gated: &ConfidenceGatedAnalysis, overall_score: f64) -> Classification {
    let bmv = gated.market.bmv_percent;

    if gated.market.comps_used == 0 {
        return Classification {
            recommendation: Recommendation::InsufficientData,
            reason: "INSUFFICIENT_DATA: no comparable sales".to_string(),
            cap_applied: None,
        };
    }

    if bmv < 0.0 {
        return Classification {
            recommendation: Recommendation::Overpriced,
            reason: format!("OVERPRICED: bmv {bmv:.1}% below zero"),
            cap_applied: None,
        };
    }

    let (base, base_reason) = if bmv >= 15.0 && overall_score >= 70.0 {
        (
            Recommendation::Strong,
            format!("STRONG: bmv {bmv:.1}% >= 15 and overall {overall_score:.1} >= 70"),
        )
    } else if bmv >= 8.0 && overall_score >= 50.0 {
        (
            Recommendation::Moderate,
            format!("MODERATE: bmv {bmv:.1}% >= 8 and overall {overall_score:.1} >= 50"),
        )
    } else if bmv >= 3.0 && overall_score >= 30.0 {
        (
            Recommendation::Weak,
            format!("WEAK: bmv {bmv:.1}% >= 3 and overall {overall_score:.1} >= 30"),
        )
    } else {
        (
            Recommendation::Avoid,
            format!("AVOID: bmv {bmv:.1}% and overall {overall_score:.1} below all bands"),
        )
    };

    match gated.recommendation_cap {
        Some(cap) => {
            let capped = base.capped_at(cap);
            if capped != base {
                let cap_reason = gated.cap_reason.as_deref().unwrap_or("confidence cap");
                Classification {
                    recommendation: capped,
                    reason: format!("{base}→{capped}: cap {capped} ({cap_reason})"),
                    cap_applied: Some(cap),
                }
            } else {
                Classification {
                    recommendation: base,
                    reason: base_reason,
                    cap_applied: None,
                }
            }
        }
        None => Classification {
            recommendation: base,
            reason: base_reason,
            cap_applied: None,
        },
    }
}
