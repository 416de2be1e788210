//! Rejection records and the out-of-band rejection channel.

use chrono::{DateTime, Utc};
use common::{RawListing, RejectionCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Mutex;
use utoipa::ToSchema;

/// Structured report of a listing that failed normalisation or validation.
///
/// Stored out-of-band for admin review; never embedded in pipeline output.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RejectionRecord {
    pub source_id: String,
    pub source_listing_id: String,
    pub rejection_code: RejectionCode,
    pub reason: String,
    /// SHA-256 of the canonical raw payload, so the rejected input can be
    /// traced without storing it.
    pub raw_data_hash: String,
    pub rejected_at: DateTime<Utc>,
}

impl RejectionRecord {
    pub fn for_listing(
        raw: &RawListing,
        code: RejectionCode,
        reason: impl Into<String>,
        rejected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_id: raw.source_id.clone(),
            source_listing_id: raw.source_listing_id.clone(),
            rejection_code: code,
            reason: reason.into(),
            raw_data_hash: raw_data_hash(raw),
            rejected_at,
        }
    }
}

/// Content hash of a raw listing's canonical JSON form.
pub fn raw_data_hash(raw: &RawListing) -> String {
    let canonical = serde_json::to_vec(raw).expect("raw listing serialises");
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}

/// Side channel for rejection records.
pub trait RejectionSink: Send + Sync {
    fn record(&self, rejection: RejectionRecord);
}

/// In-memory sink, drained by admin listings and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<RejectionRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RejectionRecord> {
        self.records.lock().expect("rejection sink lock poisoned").clone()
    }

    pub fn drain(&self) -> Vec<RejectionRecord> {
        std::mem::take(&mut *self.records.lock().expect("rejection sink lock poisoned"))
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("rejection sink lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RejectionSink for MemorySink {
    fn record(&self, rejection: RejectionRecord) {
        tracing::warn!(
            source_id = %rejection.source_id,
            source_listing_id = %rejection.source_listing_id,
            code = %rejection.rejection_code,
            "listing rejected: {}",
            rejection.reason
        );
        self.records
            .lock()
            .expect("rejection sink lock poisoned")
            .push(rejection);
    }
}
