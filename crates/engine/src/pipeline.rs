//! Pipeline orchestration.
//!
//! Each asset runs the stages independently; batches fan out across a
//! tokio task set and are re-ranked globally afterwards. Cancellation is
//! honoured at stage boundaries only, so a cancelled asset is discarded
//! whole rather than half-recorded.

use chrono::{DateTime, Utc};
use common::{Coordinates, ValidatedAsset};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::audit::{assemble, ClassifiedOpportunity};
use crate::classify::classify;
use crate::comps::{CompStore, PostcodeCentroids};
use crate::config::EngineConfig;
use crate::confidence::gate;
use crate::market::analyse;
use crate::score::{ranking_cmp, score, ScoredAsset};

/// The deal engine: comparable data plus configuration.
#[derive(Clone)]
pub struct DealEngine {
    comps: Arc<CompStore>,
    centroids: Arc<PostcodeCentroids>,
    config: EngineConfig,
}

impl DealEngine {
    pub fn new(
        comps: Arc<CompStore>,
        centroids: Arc<PostcodeCentroids>,
        config: EngineConfig,
    ) -> Self {
        Self {
            comps,
            centroids,
            config,
        }
    }

    pub fn comp_store(&self) -> &CompStore {
        &self.comps
    }

    /// Evaluate one asset against the current comparable store.
    pub fn evaluate(&self, asset: &ValidatedAsset) -> ClassifiedOpportunity {
        self.evaluate_at(asset, Utc::now())
    }

    /// Evaluate with an explicit clock. Identical inputs and clock yield
    /// byte-identical output.
    pub fn evaluate_at(&self, asset: &ValidatedAsset, as_of: DateTime<Utc>) -> ClassifiedOpportunity {
        self.run_stages(asset, as_of, None)
            .expect("uncancelled evaluation always completes")
    }

    /// Geodesic origin for comparable selection: the asset's own
    /// coordinates, else its postcode-district centroid.
    fn origin_for(&self, asset: &ValidatedAsset) -> Option<Coordinates> {
        asset
            .coordinates
            .or_else(|| self.centroids.lookup(&asset.postcode))
    }

    fn run_stages(
        &self,
        asset: &ValidatedAsset,
        as_of: DateTime<Utc>,
        cancel: Option<&AtomicBool>,
    ) -> Option<ClassifiedOpportunity> {
        let cancelled = || cancel.is_some_and(|flag| flag.load(Ordering::Relaxed));

        // Stage 3a: comparable selection.
        if cancelled() {
            return None;
        }
        let selection = match self.origin_for(asset) {
            Some(origin) => self.comps.select(
                origin,
                asset.property_type,
                asset.tenure,
                as_of.date_naive(),
            ),
            None => {
                tracing::debug!(
                    asset_id = %asset.asset_id,
                    postcode = %asset.postcode,
                    "no coordinates or centroid; selection is empty"
                );
                crate::comps::CompSelection::exhausted()
            }
        };

        // Stage 3b: market reality.
        if cancelled() {
            return None;
        }
        let market = analyse(asset.asking_price, &selection);

        // Stage 4: confidence gate.
        if cancelled() {
            return None;
        }
        let gated = gate(market);

        // Stage 5: scoring over the metadata-free fact view.
        if cancelled() {
            return None;
        }
        let facts = asset.facts();
        let (scores, overall_score) = score(&facts, &gated, self.config.target_bmv_percent);

        // Stage 6: classification.
        if cancelled() {
            return None;
        }
        let classification = classify(&gated, overall_score);

        let audit = assemble(asset, &gated, &scores, overall_score, &classification, as_of);
        tracing::info!(
            asset_id = %asset.asset_id,
            recommendation = %classification.recommendation,
            comps = gated.market.comps_used,
            "asset classified"
        );
        Some(ClassifiedOpportunity {
            asset: asset.clone(),
            scored: ScoredAsset {
                analysis: gated,
                scores,
                overall_score,
                rank: 1,
            },
            recommendation: classification.recommendation,
            classification_reason: classification.reason,
            audit,
        })
    }

    /// Evaluate a batch and return it ranked.
    pub async fn evaluate_batch(
        &self,
        assets: Vec<ValidatedAsset>,
        as_of: DateTime<Utc>,
    ) -> Vec<ClassifiedOpportunity> {
        self.evaluate_batch_with_cancel(assets, as_of, Arc::new(AtomicBool::new(false)))
            .await
    }

    /// Evaluate a batch with a cancellation flag.
    ///
    /// Assets are independent and fan out across tokio tasks. Results are
    /// reassembled in input order before ranking so the stable tie-break
    /// reflects submission order, not task completion order. Assets whose
    /// stages saw the flag set are discarded whole.
    pub async fn evaluate_batch_with_cancel(
        &self,
        assets: Vec<ValidatedAsset>,
        as_of: DateTime<Utc>,
        cancel: Arc<AtomicBool>,
    ) -> Vec<ClassifiedOpportunity> {
        let mut tasks: JoinSet<(usize, Option<ClassifiedOpportunity>)> = JoinSet::new();
        for (index, asset) in assets.into_iter().enumerate() {
            let engine = self.clone();
            let cancel = Arc::clone(&cancel);
            tasks.spawn(async move {
                let result = engine.run_stages(&asset, as_of, Some(cancel.as_ref()));
                (index, result)
            });
        }

        let mut slots: Vec<Option<ClassifiedOpportunity>> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.expect("pipeline task never panics");
            if slots.len() <= index {
                slots.resize_with(index + 1, || None);
            }
            slots[index] = result;
        }

        let mut opportunities: Vec<ClassifiedOpportunity> =
            slots.into_iter().flatten().collect();
        rank(&mut opportunities);
        opportunities
    }
}

/// Stable global ranking: overall DESC, BMV% DESC, asking price ASC;
/// ranks are 1-indexed.
pub fn rank(opportunities: &mut [ClassifiedOpportunity]) {
    opportunities.sort_by(|a, b| {
        ranking_cmp(
            (
                a.scored.overall_score,
                a.scored.analysis.market.bmv_percent,
                a.asset.asking_price,
            ),
            (
                b.scored.overall_score,
                b.scored.analysis.market.bmv_percent,
                b.asset.asking_price,
            ),
        )
    });
    for (index, opportunity) in opportunities.iter_mut().enumerate() {
        opportunity.scored.rank = (index + 1) as u32;
    }
}
