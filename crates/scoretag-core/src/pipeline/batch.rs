//! Bounded-concurrency batch runner.
//!
//! Identities are resolved first so that assets sharing one can be grouped.
//! Each group runs sequentially inside a single slot of the pool: the first
//! asset classifies and commits, and the rest find its record in the cache.
//! Distinct groups run concurrently up to `max_concurrency`.

use super::analyzer::AssetPipeline;
use super::asset::{Asset, AssetOutcome};
use crate::cancel::CancellationToken;
use crate::models::Identity;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Counts per outcome kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub cached: usize,
    pub analyzed: usize,
    pub provisional: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: &AssetOutcome) {
        match outcome {
            AssetOutcome::Cached { .. } => self.cached += 1,
            AssetOutcome::Analyzed { .. } => self.analyzed += 1,
            AssetOutcome::Provisional { .. } => self.provisional += 1,
            AssetOutcome::Failed { .. } => self.failed += 1,
            AssetOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.cached + self.analyzed + self.provisional + self.failed + self.skipped
    }
}

/// Outcomes in submission order.
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<AssetOutcome>,
    pub summary: BatchSummary,
}

/// Runs many assets through one pipeline.
pub struct BatchRunner {
    pipeline: Arc<AssetPipeline>,
    max_concurrency: usize,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<AssetPipeline>) -> Self {
        let max_concurrency = pipeline.config().max_concurrency;
        Self {
            pipeline,
            max_concurrency,
        }
    }

    /// Override the pool size, clamped to `1..=MAX_CONCURRENCY`.
    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency =
            max_concurrency.clamp(1, crate::config::PipelineConfig::MAX_CONCURRENCY);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub async fn run(&self, assets: Vec<Asset>, cancel: &CancellationToken) -> BatchReport {
        let total = assets.len();
        let pipeline = &self.pipeline;

        // 1. Resolve identities (hashing may read large files). Assets not
        //    yet started when the token fires are never hashed.
        let mut resolved: Vec<(usize, Option<Identity>, Asset)> =
            stream::iter(assets.into_iter().enumerate())
                .map(|(index, asset)| async move {
                    if cancel.is_cancelled() {
                        return (index, None, asset);
                    }
                    let identity = pipeline.identify(&asset).await;
                    (index, Some(identity), asset)
                })
                .buffer_unordered(self.max_concurrency)
                .collect()
                .await;
        resolved.sort_by_key(|(index, _, _)| *index);

        let mut results: Vec<(usize, AssetOutcome)> = Vec::with_capacity(total);
        let mut identified: Vec<(usize, Identity, Asset)> = Vec::with_capacity(total);
        for (index, identity, asset) in resolved {
            match identity {
                Some(identity) => identified.push((index, identity, asset)),
                None => results.push((index, AssetOutcome::Skipped { name: asset.name })),
            }
        }
        if !results.is_empty() {
            info!("Cancelled before identifying {} assets", results.len());
        }

        // 2. Group by identity, keeping first-seen order.
        let identified_count = identified.len();
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Vec<(usize, Identity, Asset)>> = Vec::new();
        for item in identified {
            let key = item.1.storage_key();
            match slots.get(&key) {
                Some(&slot) => groups[slot].push(item),
                None => {
                    slots.insert(key, groups.len());
                    groups.push(vec![item]);
                }
            }
        }
        let duplicates = identified_count - groups.len();
        if duplicates > 0 {
            info!(
                "{} assets share an identity with an earlier asset in this batch",
                duplicates
            );
        }

        // 3. Run groups concurrently, each group sequentially.
        let processed: Vec<(usize, AssetOutcome)> = stream::iter(groups)
            .map(|group| async move {
                let mut outcomes = Vec::with_capacity(group.len());
                for (index, identity, asset) in group {
                    let outcome = pipeline.process_identified(identity, &asset, cancel).await;
                    outcomes.push((index, outcome));
                }
                outcomes
            })
            .buffer_unordered(self.max_concurrency)
            .flat_map(stream::iter)
            .collect()
            .await;
        results.extend(processed);
        results.sort_by_key(|(index, _)| *index);

        let mut summary = BatchSummary::default();
        let outcomes: Vec<AssetOutcome> = results
            .into_iter()
            .map(|(_, outcome)| {
                summary.record(&outcome);
                outcome
            })
            .collect();

        info!(
            "Batch finished: {} assets ({} cached, {} analyzed, {} provisional, {} failed, {} skipped)",
            summary.total(),
            summary.cached,
            summary.analyzed,
            summary.provisional,
            summary.failed,
            summary.skipped
        );

        BatchReport { outcomes, summary }
    }
}
