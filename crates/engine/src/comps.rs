//! Comparable sales store and the progressive selector.
//!
//! Comparables come exclusively from Land-Registry completed sales; nothing
//! is ever synthesised. Selection applies hard filters (exact property
//! type, exact tenure, bounded age) and then widens radius and date window
//! through a fixed ladder until at least one comparable appears.

use chrono::{Months, NaiveDate};
use common::{outward_code, Coordinates, PropertyType, Tenure};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use utoipa::ToSchema;
use uuid::Uuid;

/// Hard upper bound on comparable age, in months.
pub const MAX_COMP_AGE_MONTHS: u32 = 24;

/// Progressive (radius miles, window months) ladder, tried in order.
pub const FALLBACK_LEVELS: [(f64, u32); 6] = [
    (0.5, 12),
    (1.0, 12),
    (0.5, 18),
    (1.0, 18),
    (1.0, 24),
    (1.5, 24),
];

/// A completed sale from the Land-Registry price-paid feed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComparableSale {
    /// Land-Registry transaction identifier.
    pub transaction_id: Uuid,
    pub postcode: String,
    pub coordinates: Coordinates,
    /// Sale price in whole GBP.
    pub sale_price: i64,
    pub sale_date: NaiveDate,
    pub property_type: PropertyType,
    pub tenure: Tenure,
}

/// Result of comparable selection for one asset.
#[derive(Debug, Clone)]
pub struct CompSelection {
    pub comps: Vec<ComparableSale>,
    pub radius_miles: f64,
    pub date_range_months: u32,
    /// 1..6; the first ladder level that produced a comp, or 6 when none did.
    pub fallback_level: u8,
}

impl CompSelection {
    /// No comparables after exhausting every ladder level.
    pub fn exhausted() -> Self {
        let (radius_miles, date_range_months) = FALLBACK_LEVELS[FALLBACK_LEVELS.len() - 1];
        Self {
            comps: Vec::new(),
            radius_miles,
            date_range_months,
            fallback_level: FALLBACK_LEVELS.len() as u8,
        }
    }
}

/// In-memory index of comparable sales.
///
/// Many readers, single writer. The backing vector is kept sorted by
/// `(sale_date, transaction_id)` so every query walks candidates in one
/// deterministic order regardless of insertion sequence.
#[derive(Debug, Default)]
pub struct CompStore {
    sales: RwLock<Vec<ComparableSale>>,
}

impl CompStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, sale: ComparableSale) {
        let mut sales = self.sales.write().expect("comparable index lock poisoned");
        let at = sales
            .binary_search_by(|probe| {
                (probe.sale_date, probe.transaction_id)
                    .cmp(&(sale.sale_date, sale.transaction_id))
            })
            .unwrap_or_else(|insertion_point| insertion_point);
        sales.insert(at, sale);
    }

    pub fn insert_batch(&self, batch: Vec<ComparableSale>) {
        let mut sales = self.sales.write().expect("comparable index lock poisoned");
        sales.extend(batch);
        sales.sort_by(|a, b| (a.sale_date, a.transaction_id).cmp(&(b.sale_date, b.transaction_id)));
    }

    pub fn len(&self) -> usize {
        self.sales.read().expect("comparable index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Select comparables for an asset at `origin`.
    ///
    /// Hard filters (exact type, exact tenure, age within
    /// `MAX_COMP_AGE_MONTHS`) apply at every level; the ladder levels are
    /// tried in strict order and the first with at least one comp wins.
    pub fn select(
        &self,
        origin: Coordinates,
        property_type: PropertyType,
        tenure: Tenure,
        as_of: NaiveDate,
    ) -> CompSelection {
        let sales = self.sales.read().expect("comparable index lock poisoned");
        let oldest = window_start(as_of, MAX_COMP_AGE_MONTHS);

        // Hard filters plus distance, computed once per candidate.
        let candidates: Vec<(&ComparableSale, f64)> = sales
            .iter()
            .filter(|sale| {
                sale.property_type == property_type
                    && sale.tenure == tenure
                    && sale.sale_date <= as_of
                    && sale.sale_date >= oldest
            })
            .map(|sale| (sale, origin.distance_miles(&sale.coordinates)))
            .collect();

        for (index, (radius_miles, months)) in FALLBACK_LEVELS.iter().enumerate() {
            let start = window_start(as_of, *months);
            let comps: Vec<ComparableSale> = candidates
                .iter()
                .filter(|(sale, distance)| sale.sale_date >= start && *distance <= *radius_miles)
                .map(|(sale, _)| (*sale).clone())
                .collect();
            let level = (index + 1) as u8;
            tracing::debug!(
                level,
                radius_miles,
                months,
                found = comps.len(),
                "comparable selection level"
            );
            if !comps.is_empty() {
                return CompSelection {
                    comps,
                    radius_miles: *radius_miles,
                    date_range_months: *months,
                    fallback_level: level,
                };
            }
        }
        CompSelection::exhausted()
    }
}

fn window_start(as_of: NaiveDate, months: u32) -> NaiveDate {
    as_of
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

/// Outward-code → centroid table for assets without coordinates.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PostcodeCentroids {
    centroids: HashMap<String, Coordinates>,
}

impl PostcodeCentroids {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(centroids: HashMap<String, Coordinates>) -> Self {
        Self { centroids }
    }

    pub fn insert(&mut self, outward: impl Into<String>, centroid: Coordinates) {
        self.centroids.insert(outward.into(), centroid);
    }

    /// Centroid for a full postcode, keyed by its outward code.
    pub fn lookup(&self, postcode: &str) -> Option<Coordinates> {
        let outward = outward_code(postcode)?;
        self.centroids.get(&outward).copied()
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }
}
