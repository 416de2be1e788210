//! Market-reality analysis: trimmed-median EMV and BMV%.
//!
//! The estimated market value is only ever a median of accepted comparable
//! sale prices. Zero comparables is a valid result (EMV 0), not an error.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::comps::CompSelection;

/// Minimum comparable count before the tails are trimmed.
const TRIM_THRESHOLD: usize = 5;

/// Outcome of stage 3 for one asset.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MarketAnalysis {
    /// Estimated market value in GBP; 0.0 when no comparables exist.
    pub emv: f64,
    /// `(emv - asking) / emv × 100`; positive means below market.
    pub bmv_percent: f64,
    pub comps_used: u32,
    pub comp_ids: Vec<Uuid>,
    pub comp_prices: Vec<i64>,
    pub comp_radius_miles: f64,
    pub comp_date_range_months: u32,
    pub fallback_level: u8,
}

/// Compute EMV and BMV% from the selected comparables.
///
/// With five or more comps, prices strictly below the interpolated 10th
/// percentile or strictly above the 90th are excluded before taking the
/// median; smaller sets are used untrimmed. Values stay unrounded
/// internally.
pub fn analyse(asking_price: i64, selection: &CompSelection) -> MarketAnalysis {
    let comp_prices: Vec<i64> = selection.comps.iter().map(|c| c.sale_price).collect();
    let comp_ids: Vec<Uuid> = selection.comps.iter().map(|c| c.transaction_id).collect();

    let emv = estimate_market_value(&comp_prices);
    let bmv_percent = if emv > 0.0 {
        (emv - asking_price as f64) / emv * 100.0
    } else {
        0.0
    };

    MarketAnalysis {
        emv,
        bmv_percent,
        comps_used: comp_prices.len() as u32,
        comp_ids,
        comp_prices,
        comp_radius_miles: selection.radius_miles,
        comp_date_range_months: selection.date_range_months,
        fallback_level: selection.fallback_level,
    }
}

fn estimate_market_value(prices: &[i64]) -> f64 {
    if prices.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = prices.iter().map(|p| *p as f64).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    if sorted.len() >= TRIM_THRESHOLD {
        let p10 = percentile(&sorted, 0.10);
        let p90 = percentile(&sorted, 0.90);
        let kept: Vec<f64> = sorted
            .iter()
            .copied()
            .filter(|price| *price >= p10 && *price <= p90)
            .collect();
        median(&kept)
    } else {
        median(&sorted)
    }
}

/// Interpolated percentile over an ascending slice (rank `p·(n−1)`).
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Median of an ascending slice; even lengths take the mean of the two
/// middle values.
fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comps::ComparableSale;
    use chrono::NaiveDate;
    use common::{Coordinates, PropertyType, Tenure};

    fn selection(prices: &[i64]) -> CompSelection {
        CompSelection {
            comps: prices
                .iter()
                .map(|price| ComparableSale {
                    transaction_id: Uuid::new_v4(),
                    postcode: "SW1A 1AA".into(),
                    coordinates: Coordinates::new(51.5, -0.13),
                    sale_price: *price,
                    sale_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                    property_type: PropertyType::Terraced,
                    tenure: Tenure::Freehold,
                })
                .collect(),
            radius_miles: 0.5,
            date_range_months: 12,
            fallback_level: 1,
        }
    }

    #[test]
    fn test_zero_comps_is_a_valid_result() {
        let analysis = analyse(220_000, &selection(&[]));
        assert_eq!(analysis.emv, 0.0);
        assert_eq!(analysis.bmv_percent, 0.0);
        assert_eq!(analysis.comps_used, 0);
    }

    #[test]
    fn test_small_sets_use_plain_median() {
        let analysis = analyse(200_000, &selection(&[240_000, 260_000, 280_000]));
        assert_eq!(analysis.emv, 260_000.0);

        let even = analyse(200_000, &selection(&[240_000, 260_000]));
        assert_eq!(even.emv, 250_000.0);
    }

    #[test]
    fn test_trim_drops_single_tails_at_six() {
        // 305k and 420k sit outside the interpolated 10th/90th percentiles;
        // the median of the surviving four is (360k + 365k) / 2.
        let analysis = analyse(
            300_000,
            &selection(&[305_000, 340_000, 360_000, 365_000, 380_000, 420_000]),
        );
        assert_eq!(analysis.emv, 362_500.0);
        assert!((analysis.bmv_percent - 17.241_379_310_344_827).abs() < 1e-9);
        assert_eq!(analysis.comps_used, 6);
        assert_eq!(analysis.comp_prices.len(), 6);
    }

    #[test]
    fn test_trim_drops_single_tails_at_five() {
        let analysis = analyse(
            200_000,
            &selection(&[100_000, 240_000, 250_000, 260_000, 900_000]),
        );
        // Lowest and highest excluded; median of the middle three.
        assert_eq!(analysis.emv, 250_000.0);
    }

    #[test]
    fn test_identical_prices_survive_trim() {
        let analysis = analyse(200_000, &selection(&[250_000; 7]));
        assert_eq!(analysis.emv, 250_000.0);
    }

    #[test]
    fn test_overpriced_is_negative_bmv() {
        let analysis = analyse(
            500_000,
            &selection(&[430_000, 435_000, 445_000, 450_000]),
        );
        assert_eq!(analysis.emv, 440_000.0);
        assert!((analysis.bmv_percent - (-13.636_363_636_363_635)).abs() < 1e-9);
    }

    #[test]
    fn test_comp_ids_preserved_in_selection_order() {
        let sel = selection(&[300_000, 310_000]);
        let expected: Vec<Uuid> = sel.comps.iter().map(|c| c.transaction_id).collect();
        let analysis = analyse(250_000, &sel);
        assert_eq!(analysis.comp_ids, expected);
        assert_eq!(analysis.comp_prices, vec![300_000, 310_000]);
    }
}
