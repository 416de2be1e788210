//! Concrete adapters: a generic remote JSON feed and a static fixture
//! source.
//!
//! The feed adapter covers the common case of an upstream that exposes its
//! listings as a JSON array; per-source differences are captured in an
//! explicit `FeedFieldMap` rather than code. Values the map cannot find are
//! left absent so the structural validator rejects the listing.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{Coordinates, RawListing};
use serde_json::Value;

use crate::adapter::{SourceAdapter, SourceError, SourceRegistration};

/// JSON keys for each `RawListing` field in a given feed.
#[derive(Debug, Clone)]
pub struct FeedFieldMap {
    pub id: String,
    pub address: String,
    pub city: Option<String>,
    pub postcode: String,
    pub property_type: String,
    pub tenure: String,
    pub price: String,
    pub price_qualifier: Option<String>,
    pub bedrooms: Option<String>,
    pub bathrooms: Option<String>,
    pub square_feet: Option<String>,
    pub listing_date: String,
    pub url: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl Default for FeedFieldMap {
    fn default() -> Self {
        Self {
            id: "id".into(),
            address: "address".into(),
            city: Some("city".into()),
            postcode: "postcode".into(),
            property_type: "property_type".into(),
            tenure: "tenure".into(),
            price: "price".into(),
            price_qualifier: Some("price_qualifier".into()),
            bedrooms: Some("bedrooms".into()),
            bathrooms: Some("bathrooms".into()),
            square_feet: Some("square_feet".into()),
            listing_date: "listing_date".into(),
            url: Some("url".into()),
            latitude: Some("latitude".into()),
            longitude: Some("longitude".into()),
        }
    }
}

/// Generic adapter over a remote JSON array feed.
pub struct JsonFeedAdapter {
    registration: SourceRegistration,
    endpoint: String,
    map: FeedFieldMap,
    client: reqwest::Client,
}

impl JsonFeedAdapter {
    pub fn new(registration: SourceRegistration, endpoint: impl Into<String>, map: FeedFieldMap) -> Self {
        Self {
            registration,
            endpoint: endpoint.into(),
            map,
            client: reqwest::Client::new(),
        }
    }

    /// Map one feed record onto `RawListing`.
    ///
    /// Missing or unparseable values become explicit absences; estimated
    /// values a feed may carry are simply never read.
    pub fn map_record(&self, record: &Value) -> RawListing {
        let map = &self.map;
        RawListing {
            source_id: self.registration.source_id.clone(),
            source_name: self.registration.name.clone(),
            source_listing_id: string_at(record, &map.id).unwrap_or_default(),
            address: string_at(record, &map.address).unwrap_or_default(),
            city: map.city.as_deref().and_then(|k| string_at(record, k)),
            postcode: string_at(record, &map.postcode).unwrap_or_default(),
            property_type: string_at(record, &map.property_type).unwrap_or_default(),
            tenure: string_at(record, &map.tenure).unwrap_or_default(),
            asking_price: int_at(record, &map.price).unwrap_or(0),
            price_qualifier: map
                .price_qualifier
                .as_deref()
                .and_then(|k| string_at(record, k)),
            bedrooms: map
                .bedrooms
                .as_deref()
                .and_then(|k| int_at(record, k))
                .and_then(|v| u32::try_from(v).ok()),
            bathrooms: map
                .bathrooms
                .as_deref()
                .and_then(|k| int_at(record, k))
                .and_then(|v| u32::try_from(v).ok()),
            square_feet: map
                .square_feet
                .as_deref()
                .and_then(|k| int_at(record, k))
                .and_then(|v| u32::try_from(v).ok()),
            plot_acres: None,
            area: None,
            coordinates: coordinates_at(record, map),
            listing_date: string_at(record, &map.listing_date)
                .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            listing_url: map.url.as_deref().and_then(|k| string_at(record, k)),
        }
    }
}

fn string_at(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn int_at(record: &Value, key: &str) -> Option<i64> {
    match record.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coordinates_at(record: &Value, map: &FeedFieldMap) -> Option<Coordinates> {
    let lat = record.get(map.latitude.as_deref()?)?.as_f64()?;
    let lon = record.get(map.longitude.as_deref()?)?.as_f64()?;
    Some(Coordinates::new(lat, lon))
}

#[async_trait]
impl SourceAdapter for JsonFeedAdapter {
    fn registration(&self) -> SourceRegistration {
        self.registration.clone()
    }

    async fn fetch_listings(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawListing>, SourceError> {
        let mut request = self.client.get(&self.endpoint);
        if let Some(since) = since {
            request = request.query(&[("since", since.to_rfc3339())]);
        }
        let body: Value = request.send().await?.error_for_status()?.json().await?;
        let records = body
            .as_array()
            .ok_or_else(|| SourceError::Parse("feed body is not a JSON array".to_string()))?;
        Ok(records.iter().map(|r| self.map_record(r)).collect())
    }

    async fn fetch_single(
        &self,
        source_listing_id: &str,
    ) -> Result<Option<RawListing>, SourceError> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), source_listing_id);
        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = response.error_for_status()?.json().await?;
        Ok(Some(self.map_record(&body)))
    }
}

/// Adapter over pre-loaded records (file imports and tests).
pub struct StaticAdapter {
    registration: SourceRegistration,
    listings: Vec<RawListing>,
}

impl StaticAdapter {
    pub fn new(registration: SourceRegistration, listings: Vec<RawListing>) -> Self {
        Self {
            registration,
            listings,
        }
    }
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
    fn registration(&self) -> SourceRegistration {
        self.registration.clone()
    }

    async fn fetch_listings(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawListing>, SourceError> {
        let cutoff = since.map(|s| s.date_naive());
        Ok(self
            .listings
            .iter()
            .filter(|listing| match (cutoff, listing.listing_date) {
                (Some(cutoff), Some(date)) => date >= cutoff,
                _ => true,
            })
            .cloned()
            .collect())
    }

    async fn fetch_single(
        &self,
        source_listing_id: &str,
    ) -> Result<Option<RawListing>, SourceError> {
        Ok(self
            .listings
            .iter()
            .find(|listing| listing.source_listing_id == source_listing_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SourceCategory;
    use serde_json::json;

    fn adapter() -> JsonFeedAdapter {
        JsonFeedAdapter::new(
            SourceRegistration {
                source_id: "acme-feed".into(),
                name: "Acme Listings".into(),
                category: SourceCategory::EstateAgent,
                supplied_fields: vec!["bedrooms".into(), "coordinates".into()],
                rate_limit_per_minute: 30,
                active: true,
            },
            "https://feed.example.com/listings",
            FeedFieldMap::default(),
        )
    }

    #[test]
    fn test_map_record_full() {
        let record = json!({
            "id": "acme-77",
            "address": "9 Albert Square, Manchester",
            "city": "Manchester",
            "postcode": "M2 5DB",
            "property_type": "apartment",
            "tenure": "leasehold",
            "price": 185000,
            "bedrooms": 2,
            "bathrooms": 1,
            "listing_date": "2025-06-10",
            "url": "https://feed.example.com/listings/acme-77",
            "latitude": 53.4794,
            "longitude": -2.2453
        });
        let raw = adapter().map_record(&record);
        assert_eq!(raw.source_listing_id, "acme-77");
        assert_eq!(raw.asking_price, 185_000);
        assert_eq!(raw.bedrooms, Some(2));
        assert_eq!(raw.listing_date, NaiveDate::from_ymd_opt(2025, 6, 10));
        assert!(raw.coordinates.is_some());
    }

    #[test]
    fn test_map_record_missing_values_stay_absent() {
        let record = json!({
            "id": "acme-78",
            "address": "10 Albert Square, Manchester",
            "postcode": "M2 5DB",
            "property_type": "apartment",
            "tenure": "leasehold"
        });
        let raw = adapter().map_record(&record);
        // Missing price and date are explicit absences for the validator,
        // not defaults.
        assert_eq!(raw.asking_price, 0);
        assert_eq!(raw.listing_date, None);
        assert_eq!(raw.bedrooms, None);
        assert!(raw.coordinates.is_none());
    }

    #[test]
    fn test_map_record_discards_upstream_estimates() {
        let record = json!({
            "id": "acme-79",
            "address": "11 Albert Square, Manchester",
            "postcode": "M2 5DB",
            "property_type": "flat",
            "tenure": "leasehold",
            "price": 200000,
            "listing_date": "2025-06-10",
            "estimated_value": 999999,
            "valuation": 888888
        });
        let raw = adapter().map_record(&record);
        let json = serde_json::to_value(&raw).unwrap();
        assert!(json.get("estimated_value").is_none());
        assert_eq!(raw.asking_price, 200_000);
    }

    #[test]
    fn test_price_accepts_numeric_strings() {
        let record = json!({"id": "x", "price": "225000"});
        let raw = adapter().map_record(&record);
        assert_eq!(raw.asking_price, 225_000);
    }
}
