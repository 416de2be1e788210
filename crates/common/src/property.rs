//! Closed property-domain enums and the shared normalisation table.
//!
//! Both the ingestion pipeline and the agent submission portal map raw
//! strings through the tables here. There is exactly one mapping in the
//! system; unmapped input is rejected by the caller, never substituted.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use utoipa::ToSchema;

/// Canonical property types accepted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    Flat,
    Maisonette,
    Terraced,
    SemiDetached,
    Detached,
}

impl PropertyType {
    /// Map a raw source string onto the canonical set.
    ///
    /// Case-insensitive, whitespace-trimmed. Returns `None` for anything
    /// outside the synonym table.
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "flat" | "apartment" | "studio" => Some(Self::Flat),
            "maisonette" => Some(Self::Maisonette),
            "terraced" | "terrace" | "townhouse" | "end terrace" | "mid terrace" => {
                Some(Self::Terraced)
            }
            "semi-detached" | "semi detached" | "semi" => Some(Self::SemiDetached),
            "detached" | "bungalow" | "cottage" => Some(Self::Detached),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "FLAT",
            Self::Maisonette => "MAISONETTE",
            Self::Terraced => "TERRACED",
            Self::SemiDetached => "SEMI_DETACHED",
            Self::Detached => "DETACHED",
        }
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical tenure values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tenure {
    Freehold,
    Leasehold,
}

impl Tenure {
    /// Map a raw source string onto the canonical set.
    ///
    /// `share of freehold` counts as FREEHOLD. Returns `None` for anything
    /// else.
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "freehold" | "share of freehold" => Some(Self::Freehold),
            "leasehold" => Some(Self::Leasehold),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Freehold => "FREEHOLD",
            Self::Leasehold => "LEASEHOLD",
        }
    }
}

impl std::fmt::Display for Tenure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a live listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListingStatus {
    Active,
    UnderOffer,
    SoldStc,
    Withdrawn,
}

impl Default for ListingStatus {
    fn default() -> Self {
        Self::Active
    }
}

static POSTCODE_RE: OnceLock<Regex> = OnceLock::new();

fn postcode_re() -> &'static Regex {
    POSTCODE_RE.get_or_init(|| {
        Regex::new(r"^[A-Z]{1,2}[0-9][A-Z0-9]?\s?[0-9][A-Z]{2}$").expect("postcode pattern compiles")
    })
}

/// Normalise a UK postcode to its canonical `OUTWARD INWARD` form.
///
/// Returns `None` when the input does not match the UK format.
pub fn normalise_postcode(raw: &str) -> Option<String> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if compact.len() < 5 || compact.len() > 7 {
        return None;
    }
    let (outward, inward) = compact.split_at(compact.len() - 3);
    let candidate = format!("{outward} {inward}");
    if postcode_re().is_match(&candidate) {
        Some(candidate)
    } else {
        None
    }
}

/// Check a postcode against the UK format (e.g. `SW1A 1AA`).
pub fn is_valid_uk_postcode(raw: &str) -> bool {
    normalise_postcode(raw).is_some()
}

/// Outward (district) part of a postcode, e.g. `SW1A` from `SW1A 1AA`.
///
/// Used to key the postcode centroid table.
pub fn outward_code(raw: &str) -> Option<String> {
    let normalised = normalise_postcode(raw)?;
    normalised.split(' ').next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_type_synonyms() {
        assert_eq!(PropertyType::from_raw("Apartment"), Some(PropertyType::Flat));
        assert_eq!(PropertyType::from_raw("studio"), Some(PropertyType::Flat));
        assert_eq!(
            PropertyType::from_raw("End Terrace"),
            Some(PropertyType::Terraced)
        );
        assert_eq!(
            PropertyType::from_raw("townhouse"),
            Some(PropertyType::Terraced)
        );
        assert_eq!(
            PropertyType::from_raw("Semi-Detached"),
            Some(PropertyType::SemiDetached)
        );
        assert_eq!(
            PropertyType::from_raw("bungalow"),
            Some(PropertyType::Detached)
        );
        assert_eq!(
            PropertyType::from_raw("cottage"),
            Some(PropertyType::Detached)
        );
        assert_eq!(PropertyType::from_raw("houseboat"), None);
        assert_eq!(PropertyType::from_raw(""), None);
    }

    #[test]
    fn test_property_type_mapping_is_idempotent() {
        for raw in ["flat", "maisonette", "terraced", "semi-detached", "detached"] {
            let mapped = PropertyType::from_raw(raw).unwrap();
            // Re-normalising the canonical token lands on the same variant.
            assert_eq!(
                PropertyType::from_raw(&mapped.as_str().to_lowercase().replace('_', "-")),
                Some(mapped)
            );
        }
    }

    #[test]
    fn test_tenure_synonyms() {
        assert_eq!(Tenure::from_raw("Freehold"), Some(Tenure::Freehold));
        assert_eq!(
            Tenure::from_raw("Share of Freehold"),
            Some(Tenure::Freehold)
        );
        assert_eq!(Tenure::from_raw("leasehold"), Some(Tenure::Leasehold));
        assert_eq!(Tenure::from_raw("commonhold"), None);
    }

    #[test]
    fn test_postcode_validation() {
        assert!(is_valid_uk_postcode("SW1A 1AA"));
        assert!(is_valid_uk_postcode("sw1a1aa"));
        assert!(is_valid_uk_postcode("M1 1AE"));
        assert!(is_valid_uk_postcode("B33 8TH"));
        assert!(is_valid_uk_postcode("CR2 6XH"));
        assert!(!is_valid_uk_postcode("12345"));
        assert!(!is_valid_uk_postcode("SW1A"));
        assert!(!is_valid_uk_postcode(""));
        assert!(!is_valid_uk_postcode("QQQQ QQQ"));
    }

    #[test]
    fn test_postcode_normalisation_and_outward() {
        assert_eq!(normalise_postcode("sw1a1aa").as_deref(), Some("SW1A 1AA"));
        assert_eq!(normalise_postcode(" m1 1ae ").as_deref(), Some("M1 1AE"));
        assert_eq!(outward_code("cr2 6xh").as_deref(), Some("CR2"));
        assert_eq!(outward_code("SW1A 1AA").as_deref(), Some("SW1A"));
        assert_eq!(outward_code("nonsense"), None);
    }

    #[test]
    fn test_serde_tokens() {
        assert_eq!(
            serde_json::to_string(&PropertyType::SemiDetached).unwrap(),
            "\"SEMI_DETACHED\""
        );
        assert_eq!(
            serde_json::to_string(&Tenure::Freehold).unwrap(),
            "\"FREEHOLD\""
        );
        let parsed: PropertyType = serde_json::from_str("\"FLAT\"").unwrap();
        assert_eq!(parsed, PropertyType::Flat);
    }
}
