//! Structural validation (stage 2).
//!
//! Rules run in a fixed order; the first failure rejects the listing.
//! Successful validation is the only way a `ValidatedAsset` comes into
//! existence.

use chrono::{DateTime, Utc};
use common::{
    is_valid_uk_postcode, normalise_postcode, ListingStatus, PropertyType, RawListing,
    RejectionCode, SourceMetadata, Tenure, ValidatedAsset, ASSET_SCHEMA_VERSION,
};
use uuid::Uuid;

use crate::rejection::RejectionRecord;

/// Listings priced below this are treated as data errors, not bargains.
pub const MIN_ASKING_PRICE_GBP: i64 = 10_000;

/// Upper sanity bound on asking price.
pub const MAX_ASKING_PRICE_GBP: i64 = 50_000_000;

/// Listings older than this are stale and excluded from evaluation.
pub const MAX_LISTING_AGE_DAYS: i64 = 365;

/// Validate a raw listing against the structural rules, producing an
/// immutable `ValidatedAsset` or a rejection.
///
/// `as_of` is the validation clock: date rules and `days_on_market` are
/// computed against it, never against ambient wall time.
pub fn validate(raw: &RawListing, as_of: DateTime<Utc>) -> Result<ValidatedAsset, RejectionRecord> {
    let reject = |code: RejectionCode, reason: String| {
        RejectionRecord::for_listing(raw, code, reason, as_of)
    };

    // V-001: required field presence.
    if let Some(field) = first_missing_field(raw) {
        return Err(reject(
            RejectionCode::MissingRequiredField,
            format!("required field missing: {field}"),
        ));
    }

    // V-002: UK postcode format.
    if !is_valid_uk_postcode(&raw.postcode) {
        return Err(reject(
            RejectionCode::InvalidPostcode,
            format!("not a UK postcode: {:?}", raw.postcode),
        ));
    }

    // V-003 / V-004: closed-set normalisation. Unmapped values reject,
    // never substitute.
    let Some(property_type) = PropertyType::from_raw(&raw.property_type) else {
        return Err(reject(
            RejectionCode::UnmappedPropertyType,
            format!("unmapped property type: {:?}", raw.property_type),
        ));
    };
    let Some(tenure) = Tenure::from_raw(&raw.tenure) else {
        return Err(reject(
            RejectionCode::UnmappedTenure,
            format!("unmapped tenure: {:?}", raw.tenure),
        ));
    };

    // V-005 / V-006: price sanity bounds.
    if raw.asking_price < MIN_ASKING_PRICE_GBP {
        return Err(reject(
            RejectionCode::PriceBelowThreshold,
            format!("asking price {} below £{MIN_ASKING_PRICE_GBP}", raw.asking_price),
        ));
    }
    if raw.asking_price > MAX_ASKING_PRICE_GBP {
        return Err(reject(
            RejectionCode::PriceAboveThreshold,
            format!("asking price {} above £{MAX_ASKING_PRICE_GBP}", raw.asking_price),
        ));
    }

    // V-007 / V-008: listing date window. Presence was checked by V-001.
    let listing_date = raw.listing_date.expect("checked by V-001");
    let today = as_of.date_naive();
    if listing_date > today {
        return Err(reject(
            RejectionCode::FutureListingDate,
            format!("listing date {listing_date} is in the future"),
        ));
    }
    let age_days = (today - listing_date).num_days();
    if age_days > MAX_LISTING_AGE_DAYS {
        return Err(reject(
            RejectionCode::StaleListing,
            format!("listing is {age_days} days old"),
        ));
    }

    let postcode = normalise_postcode(&raw.postcode).expect("checked by V-002");
    let city = resolve_city(raw).expect("checked by V-001");

    let asset = ValidatedAsset {
        asset_id: Uuid::new_v4().to_string(),
        address: raw.address.trim().to_string(),
        postcode,
        city,
        area: raw.area.clone(),
        property_type,
        tenure,
        bedrooms: raw.bedrooms,
        bathrooms: raw.bathrooms,
        square_feet: raw.square_feet,
        plot_acres: raw.plot_acres,
        coordinates: raw.coordinates,
        asking_price: raw.asking_price,
        price_qualifier: raw.price_qualifier.clone(),
        listing_status: ListingStatus::Active,
        listing_date,
        days_on_market: age_days,
        source: SourceMetadata {
            source_id: raw.source_id.clone(),
            source_name: raw.source_name.clone(),
            source_listing_id: raw.source_listing_id.clone(),
            listing_url: raw.listing_url.clone(),
            ingested_at: as_of,
        },
        validated_at: as_of,
        schema_version: ASSET_SCHEMA_VERSION,
    };
    tracing::debug!(asset_id = %asset.asset_id, source_id = %asset.source.source_id, "listing validated");
    Ok(asset)
}

/// First required field that is absent, in rule order.
fn first_missing_field(raw: &RawListing) -> Option<&'static str> {
    if raw.address.trim().is_empty() {
        return Some("address");
    }
    if raw.postcode.trim().is_empty() {
        return Some("postcode");
    }
    if raw.property_type.trim().is_empty() {
        return Some("property_type");
    }
    if raw.tenure.trim().is_empty() {
        return Some("tenure");
    }
    if raw.asking_price == 0 {
        return Some("asking_price");
    }
    if raw.listing_date.is_none() {
        return Some("listing_date");
    }
    if resolve_city(raw).is_none() {
        return Some("city");
    }
    None
}

/// City from the explicit field when supplied, otherwise the last
/// address segment that is not itself a postcode.
fn resolve_city(raw: &RawListing) -> Option<String> {
    if let Some(city) = &raw.city {
        let trimmed = city.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    raw.address
        .rsplit(',')
        .map(str::trim)
        .find(|segment| !segment.is_empty() && !is_valid_uk_postcode(segment))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap()
    }

    fn raw() -> RawListing {
        RawListing {
            source_id: "rightmove".into(),
            source_name: "Rightmove".into(),
            source_listing_id: "rm-1".into(),
            address: "12 Mill Lane, Croydon".into(),
            city: Some("Croydon".into()),
            postcode: "CR0 1PB".into(),
            property_type: "Terraced".into(),
            tenure: "Freehold".into(),
            asking_price: 300_000,
            price_qualifier: None,
            bedrooms: Some(3),
            bathrooms: Some(1),
            square_feet: None,
            plot_acres: None,
            area: None,
            coordinates: None,
            listing_date: Some(NaiveDate::from_ymd_opt(2025, 5, 2).unwrap()),
            listing_url: Some("https://example.com/rm-1".into()),
        }
    }

    #[test]
    fn test_valid_listing_passes() {
        let asset = validate(&raw(), as_of()).unwrap();
        assert_eq!(asset.property_type, PropertyType::Terraced);
        assert_eq!(asset.tenure, Tenure::Freehold);
        assert_eq!(asset.postcode, "CR0 1PB");
        assert_eq!(asset.city, "Croydon");
        assert_eq!(asset.days_on_market, 60);
        assert_eq!(asset.schema_version, ASSET_SCHEMA_VERSION);
        assert!(!asset.asset_id.is_empty());
    }

    #[test]
    fn test_missing_required_field_rejects_first() {
        let mut listing = raw();
        listing.address = "  ".into();
        listing.postcode = "not a postcode".into();
        let rejection = validate(&listing, as_of()).unwrap_err();
        // V-001 fires before V-002.
        assert_eq!(rejection.rejection_code, RejectionCode::MissingRequiredField);
        assert!(rejection.reason.contains("address"));
    }

    #[test]
    fn test_invalid_postcode_rejects() {
        let mut listing = raw();
        listing.postcode = "12345".into();
        let rejection = validate(&listing, as_of()).unwrap_err();
        assert_eq!(rejection.rejection_code, RejectionCode::InvalidPostcode);
    }

    #[test]
    fn test_unmapped_property_type_rejects() {
        let mut listing = raw();
        listing.property_type = "castle".into();
        let rejection = validate(&listing, as_of()).unwrap_err();
        assert_eq!(rejection.rejection_code, RejectionCode::UnmappedPropertyType);
    }

    #[test]
    fn test_unmapped_tenure_rejects() {
        let mut listing = raw();
        listing.tenure = "commonhold".into();
        let rejection = validate(&listing, as_of()).unwrap_err();
        assert_eq!(rejection.rejection_code, RejectionCode::UnmappedTenure);
    }

    #[test]
    fn test_price_bounds() {
        let mut low = raw();
        low.asking_price = 9_999;
        assert_eq!(
            validate(&low, as_of()).unwrap_err().rejection_code,
            RejectionCode::PriceBelowThreshold
        );

        let mut boundary = raw();
        boundary.asking_price = 10_000;
        assert!(validate(&boundary, as_of()).is_ok());

        let mut high = raw();
        high.asking_price = 50_000_001;
        assert_eq!(
            validate(&high, as_of()).unwrap_err().rejection_code,
            RejectionCode::PriceAboveThreshold
        );
    }

    #[test]
    fn test_future_listing_date_rejects() {
        let mut listing = raw();
        listing.listing_date = Some(NaiveDate::from_ymd_opt(2025, 7, 2).unwrap());
        let rejection = validate(&listing, as_of()).unwrap_err();
        assert_eq!(rejection.rejection_code, RejectionCode::FutureListingDate);
    }

    #[test]
    fn test_stale_listing_rejects() {
        let mut listing = raw();
        listing.listing_date = Some(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        let rejection = validate(&listing, as_of()).unwrap_err();
        assert_eq!(rejection.rejection_code, RejectionCode::StaleListing);

        // Exactly 365 days old is still acceptable.
        let mut boundary = raw();
        boundary.listing_date = Some(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        assert!(validate(&boundary, as_of()).is_ok());
    }

    #[test]
    fn test_city_falls_back_to_address_segment() {
        let mut listing = raw();
        listing.city = None;
        let asset = validate(&listing, as_of()).unwrap();
        assert_eq!(asset.city, "Croydon");
    }

    #[test]
    fn test_validation_is_idempotent_for_normalised_input() {
        // Round-trip a validated asset back through the validator using its
        // canonical strings; normalised fields must not change.
        let first = validate(&raw(), as_of()).unwrap();
        let round = RawListing {
            source_id: first.source.source_id.clone(),
            source_name: first.source.source_name.clone(),
            source_listing_id: first.source.source_listing_id.clone(),
            address: first.address.clone(),
            city: Some(first.city.clone()),
            postcode: first.postcode.clone(),
            property_type: first.property_type.as_str().to_lowercase().replace('_', "-"),
            tenure: first.tenure.as_str().to_lowercase(),
            asking_price: first.asking_price,
            price_qualifier: first.price_qualifier.clone(),
            bedrooms: first.bedrooms,
            bathrooms: first.bathrooms,
            square_feet: first.square_feet,
            plot_acres: first.plot_acres,
            area: first.area.clone(),
            coordinates: first.coordinates,
            listing_date: Some(first.listing_date),
            listing_url: first.source.listing_url.clone(),
        };
        let second = validate(&round, as_of()).unwrap();
        assert_eq!(second.property_type, first.property_type);
        assert_eq!(second.tenure, first.tenure);
        assert_eq!(second.postcode, first.postcode);
        assert_eq!(second.city, first.city);
        assert_eq!(second.days_on_market, first.days_on_market);
    }
}
