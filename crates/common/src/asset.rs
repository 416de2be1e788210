//! Listing and asset models.
//!
//! `RawListing` is the stage-1 input as a source adapter hands it over;
//! `ValidatedAsset` is the immutable post-validation record the rest of the
//! pipeline consumes. Neither carries any estimated value: a source that
//! supplies one has it discarded at parse time, so fabricated market data
//! cannot enter the system.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::geo::Coordinates;
use crate::property::{ListingStatus, PropertyType, Tenure};

/// Current `ValidatedAsset` schema version.
pub const ASSET_SCHEMA_VERSION: u32 = 2;

/// A listing exactly as normalised out of a source payload, before
/// structural validation.
///
/// String fields hold the source's raw values; enum mapping happens in the
/// validator through the shared synonym table. Missing values are explicit
/// absences (`None` / empty string), never defaults.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RawListing {
    /// Registered source identifier (e.g. `rightmove`, `agent-portal`).
    pub source_id: String,
    /// Human-readable source name.
    pub source_name: String,
    /// The source's own identifier for this listing.
    pub source_listing_id: String,
    /// Full address line.
    pub address: String,
    /// City, when the source supplies it separately from the address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Raw postcode string.
    pub postcode: String,
    /// Raw property type string (mapped via the shared synonym table).
    pub property_type: String,
    /// Raw tenure string.
    pub tenure: String,
    /// Asking price in whole GBP. Zero means the source did not supply one.
    pub asking_price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_qualifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub square_feet: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot_acres: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    /// Date the listing went live. `None` when the source omitted it.
    pub listing_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_url: Option<String>,
}

/// Provenance of a validated asset.
///
/// Carried for audit only; scoring never reads it (see `AssetFacts`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SourceMetadata {
    pub source_id: String,
    pub source_name: String,
    pub source_listing_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_url: Option<String>,
    /// When the pipeline first saw the raw record.
    pub ingested_at: DateTime<Utc>,
}

/// An immutable, structurally valid asset.
///
/// Produced only by the structural validator. By construction it has no
/// field for an estimated value, BMV, score or recommendation; those exist
/// solely on downstream analysis records.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidatedAsset {
    /// Globally unique, immutable identifier.
    pub asset_id: String,
    pub address: String,
    pub postcode: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    pub property_type: PropertyType,
    pub tenure: Tenure,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub square_feet: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot_acres: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    /// Asking price in whole GBP, strictly positive.
    pub asking_price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_qualifier: Option<String>,
    pub listing_status: ListingStatus,
    pub listing_date: NaiveDate,
    /// Days between `listing_date` and the validation clock.
    pub days_on_market: i64,
    pub source: SourceMetadata,
    pub validated_at: DateTime<Utc>,
    pub schema_version: u32,
}

impl ValidatedAsset {
    /// The scoring surface: every fact about the asset with the source
    /// provenance stripped. Scoring functions accept only this type, so a
    /// source-specific adjustment cannot be expressed.
    pub fn facts(&self) -> AssetFacts {
        AssetFacts {
            asset_id: self.asset_id.clone(),
            address: self.address.clone(),
            postcode: self.postcode.clone(),
            city: self.city.clone(),
            area: self.area.clone(),
            property_type: self.property_type,
            tenure: self.tenure,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            square_feet: self.square_feet,
            plot_acres: self.plot_acres,
            coordinates: self.coordinates,
            asking_price: self.asking_price,
            price_qualifier: self.price_qualifier.clone(),
            listing_status: self.listing_status,
            listing_date: self.listing_date,
            days_on_market: self.days_on_market,
        }
    }
}

/// A `ValidatedAsset` minus its `SourceMetadata`.
///
/// This is the only asset view the scorer sees.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssetFacts {
    pub asset_id: String,
    pub address: String,
    pub postcode: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    pub property_type: PropertyType,
    pub tenure: Tenure,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub square_feet: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot_acres: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub asking_price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_qualifier: Option<String>,
    pub listing_status: ListingStatus,
    pub listing_date: NaiveDate,
    pub days_on_market: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_asset() -> ValidatedAsset {
        ValidatedAsset {
            asset_id: "a-1".into(),
            address: "1 High Street, Croydon".into(),
            postcode: "CR0 1PB".into(),
            city: "Croydon".into(),
            area: None,
            property_type: PropertyType::Terraced,
            tenure: Tenure::Freehold,
            bedrooms: Some(3),
            bathrooms: Some(1),
            square_feet: None,
            plot_acres: None,
            coordinates: Some(Coordinates::new(51.37, -0.10)),
            asking_price: 300_000,
            price_qualifier: None,
            listing_status: ListingStatus::Active,
            listing_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            days_on_market: 60,
            source: SourceMetadata {
                source_id: "rightmove".into(),
                source_name: "Rightmove".into(),
                source_listing_id: "rm-42".into(),
                listing_url: None,
                ingested_at: Utc::now(),
            },
            validated_at: Utc::now(),
            schema_version: ASSET_SCHEMA_VERSION,
        }
    }

    #[test]
    fn test_facts_strip_source_metadata() {
        let asset = sample_asset();
        let facts = asset.facts();
        let json = serde_json::to_value(&facts).unwrap();
        assert!(json.get("source").is_none());
        assert!(json.get("source_id").is_none());
        assert_eq!(json["asking_price"], 300_000);
    }

    #[test]
    fn test_asset_has_no_estimate_fields() {
        let asset = sample_asset();
        let json = serde_json::to_value(&asset).unwrap();
        for forbidden in ["estimated_value", "bmv_percent", "score", "recommendation"] {
            assert!(json.get(forbidden).is_none(), "{forbidden} must not exist");
        }
    }
}
