//! Asset analysis pipeline.
//!
//! - [`AssetPipeline`]: identity, cache, classify, standardize, reconcile, commit
//! - [`BatchRunner`]: bounded worker pool over many assets
//! - [`UpsertCoordinator`]: the only writer to the shared store

mod analyzer;
mod asset;
mod batch;
mod classifier;
mod upsert;

pub use analyzer::{AssetPipeline, PipelineBuilder};
pub use asset::{Asset, AssetOutcome};
pub use batch::{BatchReport, BatchRunner, BatchSummary};
pub use classifier::{Classifier, ClassifierOutput, FeatureVector};
pub use upsert::UpsertCoordinator;
