//! Audit-trail assembly.
//!
//! Every classified opportunity carries the provenance of each stage that
//! produced it, stamped with the engine version and the pipeline clock.

use chrono::{DateTime, Utc};
use common::{Confidence, Recommendation, ValidatedAsset};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::classify::Classification;
use crate::confidence::ConfidenceGatedAnalysis;
use crate::score::{ComponentScores, ScoredAsset};

pub const ENGINE_VERSION: &str = "1.1.0";

/// Stage-by-stage provenance for one classified opportunity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditTrail {
    pub ingested_at: DateTime<Utc>,
    pub validation_outcome: String,
    pub validation_errors: Vec<String>,
    pub comps_used: u32,
    pub comp_ids: Vec<Uuid>,
    pub comp_prices: Vec<i64>,
    pub comp_radius_miles: f64,
    pub comp_date_range_months: u32,
    pub emv: f64,
    pub confidence: Confidence,
    pub confidence_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap_applied: Option<Recommendation>,
    pub bmv_score: f64,
    pub urgency_score: f64,
    pub location_score: f64,
    pub value_score: f64,
    pub overall_score: f64,
    pub recommendation: Recommendation,
    pub classification_reason: String,
    pub engine_version: String,
    pub processing_timestamp: DateTime<Utc>,
}

/// Assemble the audit trail from every stage's output.
pub fn assemble(
    asset: &ValidatedAsset,
    gated: &ConfidenceGatedAnalysis,
    scores: &ComponentScores,
    overall_score: f64,
    classification: &Classification,
    as_of: DateTime<Utc>,
) -> AuditTrail {
    AuditTrail {
        ingested_at: asset.source.ingested_at,
        validation_outcome: "PASSED".to_string(),
        validation_errors: Vec::new(),
        comps_used: gated.market.comps_used,
        comp_ids: gated.market.comp_ids.clone(),
        comp_prices: gated.market.comp_prices.clone(),
        comp_radius_miles: gated.market.comp_radius_miles,
        comp_date_range_months: gated.market.comp_date_range_months,
        emv: gated.market.emv,
        confidence: gated.confidence,
        confidence_reason: gated.confidence_reason.clone(),
        cap_applied: classification.cap_applied,
        bmv_score: scores.bmv,
        urgency_score: scores.urgency,
        location_score: scores.location,
        value_score: scores.value,
        overall_score,
        recommendation: classification.recommendation,
        classification_reason: classification.reason.clone(),
        engine_version: ENGINE_VERSION.to_string(),
        processing_timestamp: as_of,
    }
}

/// Final pipeline output: the asset, its scored analysis, the
/// classification, and the full audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClassifiedOpportunity {
    pub asset: ValidatedAsset,
    pub scored: ScoredAsset,
    pub recommendation: Recommendation,
    pub classification_reason: String,
    pub audit: AuditTrail,
}
