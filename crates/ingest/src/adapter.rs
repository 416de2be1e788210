//! Source adapter contract and registry.
//!
//! Each listing source implements `SourceAdapter` and declares a
//! `SourceRegistration`. The registry drives adapters through the
//! structural validator, so consumers only ever observe validated assets;
//! everything else lands in the rejection side channel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{RawListing, RejectionCode, ValidatedAsset};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

use crate::rejection::{RejectionRecord, RejectionSink};
use crate::validate::validate;

/// Errors from source adapters.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network/HTTP error. Treated as source-unreachable: non-recoverable
    /// for the batch, bubbled to the caller.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Payload could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Unknown source id.
    #[error("unknown source: {0}")]
    UnknownSource(String),

    /// Source is registered but deactivated.
    #[error("source is inactive: {0}")]
    Inactive(String),
}

/// Where a source sits in the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    Auction,
    EstateAgent,
    LandRegistry,
    OffMarket,
}

/// Identity and capability declaration for a registered source.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SourceRegistration {
    /// Stable source identifier (e.g. `rightmove`).
    pub source_id: String,
    /// Human-readable source name.
    pub name: String,
    pub category: SourceCategory,
    /// Which optional `RawListing` fields this source supplies.
    pub supplied_fields: Vec<String>,
    /// Polite request budget against the upstream.
    pub rate_limit_per_minute: u32,
    /// Inactive sources are skipped by batch ingestion.
    pub active: bool,
}

/// A listing source.
///
/// Adapters own the mapping from their upstream payloads to `RawListing`;
/// any value they cannot map is left absent so the validator rejects it
/// (no substitution, ever).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn registration(&self) -> SourceRegistration;

    /// Fetch listings, optionally restricted to those listed since the
    /// given cursor.
    async fn fetch_listings(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawListing>, SourceError>;

    /// Fetch one listing by the source's own identifier.
    async fn fetch_single(
        &self,
        source_listing_id: &str,
    ) -> Result<Option<RawListing>, SourceError>;
}

/// Registry of listing sources.
///
/// Adapters are iterated in registration order so batch output is
/// deterministic for a given set of source responses.
pub struct SourceRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    fetch_timeout: Duration,
}

impl SourceRegistry {
    pub fn new(fetch_timeout: Duration) -> Self {
        Self {
            adapters: Vec::new(),
            fetch_timeout,
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        let registration = adapter.registration();
        tracing::info!(
            source_id = %registration.source_id,
            active = registration.active,
            "source registered"
        );
        self.adapters.push(adapter);
    }

    pub fn registrations(&self) -> Vec<SourceRegistration> {
        self.adapters.iter().map(|a| a.registration()).collect()
    }

    fn find(&self, source_id: &str) -> Option<&Arc<dyn SourceAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.registration().source_id == source_id)
    }

    /// Ingest every active source: fetch, validate, and split into assets
    /// and side-channel rejections.
    ///
    /// A rejected listing (or a timed-out source) never stops processing of
    /// its peers; an unreachable source bubbles up as `SourceError`.
    pub async fn ingest_all(
        &self,
        since: Option<DateTime<Utc>>,
        as_of: DateTime<Utc>,
        sink: &dyn RejectionSink,
    ) -> Result<Vec<ValidatedAsset>, SourceError> {
        let mut assets = Vec::new();
        for adapter in &self.adapters {
            let registration = adapter.registration();
            if !registration.active {
                tracing::debug!(source_id = %registration.source_id, "skipping inactive source");
                continue;
            }
            match tokio::time::timeout(self.fetch_timeout, adapter.fetch_listings(since)).await {
                Ok(Ok(raw_listings)) => {
                    tracing::info!(
                        source_id = %registration.source_id,
                        count = raw_listings.len(),
                        "fetched listings"
                    );
                    for raw in &raw_listings {
                        match validate(raw, as_of) {
                            Ok(asset) => assets.push(asset),
                            Err(rejection) => sink.record(rejection),
                        }
                    }
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => {
                    // A timed-out fetch yields a rejection for the batch,
                    // never a synthesised record.
                    sink.record(timeout_rejection(&registration.source_id, as_of));
                }
            }
        }
        Ok(assets)
    }

    /// Fetch and validate one listing from one source.
    pub async fn ingest_single(
        &self,
        source_id: &str,
        source_listing_id: &str,
        as_of: DateTime<Utc>,
        sink: &dyn RejectionSink,
    ) -> Result<Option<ValidatedAsset>, SourceError> {
        let adapter = self
            .find(source_id)
            .ok_or_else(|| SourceError::UnknownSource(source_id.to_string()))?;
        let registration = adapter.registration();
        if !registration.active {
            return Err(SourceError::Inactive(source_id.to_string()));
        }
        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            adapter.fetch_single(source_listing_id),
        )
        .await;
        match fetched {
            Ok(Ok(Some(raw))) => match validate(&raw, as_of) {
                Ok(asset) => Ok(Some(asset)),
                Err(rejection) => {
                    sink.record(rejection);
                    Ok(None)
                }
            },
            Ok(Ok(None)) => Ok(None),
            Ok(Err(err)) => Err(err),
            Err(_) => {
                sink.record(timeout_rejection(source_id, as_of));
                Ok(None)
            }
        }
    }
}

fn timeout_rejection(source_id: &str, as_of: DateTime<Utc>) -> RejectionRecord {
    RejectionRecord {
        source_id: source_id.to_string(),
        source_listing_id: "*".to_string(),
        rejection_code: RejectionCode::FetchTimeout,
        reason: "source fetch exceeded timeout".to_string(),
        raw_data_hash: String::new(),
        rejected_at: as_of,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::StaticAdapter;
    use crate::rejection::MemorySink;
    use chrono::{NaiveDate, TimeZone};

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap()
    }

    fn listing(id: &str, property_type: &str) -> RawListing {
        RawListing {
            source_id: "fixture".into(),
            source_name: "Fixture".into(),
            source_listing_id: id.into(),
            address: "5 Station Road, Leeds".into(),
            city: Some("Leeds".into()),
            postcode: "LS1 4DY".into(),
            property_type: property_type.into(),
            tenure: "freehold".into(),
            asking_price: 250_000,
            price_qualifier: None,
            bedrooms: Some(2),
            bathrooms: Some(1),
            square_feet: None,
            plot_acres: None,
            area: None,
            coordinates: None,
            listing_date: Some(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
            listing_url: None,
        }
    }

    fn registration(active: bool) -> SourceRegistration {
        SourceRegistration {
            source_id: "fixture".into(),
            name: "Fixture".into(),
            category: SourceCategory::EstateAgent,
            supplied_fields: vec!["bedrooms".into(), "bathrooms".into()],
            rate_limit_per_minute: 60,
            active,
        }
    }

    #[tokio::test]
    async fn test_ingest_splits_assets_and_rejections() {
        let mut registry = SourceRegistry::new(Duration::from_secs(5));
        registry.register(Arc::new(StaticAdapter::new(
            registration(true),
            vec![listing("ok-1", "flat"), listing("bad-1", "castle")],
        )));

        let sink = MemorySink::new();
        let assets = registry.ingest_all(None, as_of(), &sink).await.unwrap();

        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].source.source_listing_id, "ok-1");
        let rejections = sink.drain();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].rejection_code, RejectionCode::UnmappedPropertyType);
    }

    #[tokio::test]
    async fn test_inactive_sources_are_skipped() {
        let mut registry = SourceRegistry::new(Duration::from_secs(5));
        registry.register(Arc::new(StaticAdapter::new(
            registration(false),
            vec![listing("ok-1", "flat")],
        )));

        let sink = MemorySink::new();
        let assets = registry.ingest_all(None, as_of(), &sink).await.unwrap();
        assert!(assets.is_empty());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_single_roundtrip() {
        let mut registry = SourceRegistry::new(Duration::from_secs(5));
        registry.register(Arc::new(StaticAdapter::new(
            registration(true),
            vec![listing("ok-1", "flat")],
        )));

        let sink = MemorySink::new();
        let asset = registry
            .ingest_single("fixture", "ok-1", as_of(), &sink)
            .await
            .unwrap();
        assert!(asset.is_some());

        let missing = registry
            .ingest_single("fixture", "nope", as_of(), &sink)
            .await
            .unwrap();
        assert!(missing.is_none());

        let unknown = registry.ingest_single("other", "ok-1", as_of(), &sink).await;
        assert!(matches!(unknown, Err(SourceError::UnknownSource(_))));
    }

    struct StallingAdapter;

    #[async_trait]
    impl SourceAdapter for StallingAdapter {
        fn registration(&self) -> SourceRegistration {
            SourceRegistration {
                source_id: "slow".into(),
                name: "Slow".into(),
                category: SourceCategory::Auction,
                supplied_fields: vec![],
                rate_limit_per_minute: 10,
                active: true,
            }
        }

        async fn fetch_listings(
            &self,
            _since: Option<DateTime<Utc>>,
        ) -> Result<Vec<RawListing>, SourceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![])
        }

        async fn fetch_single(
            &self,
            _source_listing_id: &str,
        ) -> Result<Option<RawListing>, SourceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_timed_out_fetch_becomes_rejection() {
        let mut registry = SourceRegistry::new(Duration::from_millis(20));
        registry.register(Arc::new(StallingAdapter));

        let sink = MemorySink::new();
        let assets = registry.ingest_all(None, as_of(), &sink).await.unwrap();

        assert!(assets.is_empty());
        let rejections = sink.drain();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].rejection_code, RejectionCode::FetchTimeout);
        assert_eq!(rejections[0].source_id, "slow");
    }
}
