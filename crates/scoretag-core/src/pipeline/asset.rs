//! Input and outcome types for the pipeline.

use super::classifier::FeatureVector;
use crate::cache::CacheTier;
use crate::error::ScoretagError;
use crate::identity::AssetContent;
use crate::models::{
    AnalysisRecord, ClassificationContext, CommittedRecord, ConfidenceTier, FileMetadata,
};
use std::path::PathBuf;
use std::sync::Arc;

/// One asset submitted for analysis.
#[derive(Debug, Clone, Default)]
pub struct Asset {
    pub name: String,
    pub content: AssetContent,
    pub features: FeatureVector,
    pub context: ClassificationContext,
    pub metadata: FileMetadata,
}

impl Asset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_bytes(mut self, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.content = AssetContent::Bytes(bytes.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.content = AssetContent::Path(path.into());
        self
    }

    pub fn with_features(mut self, features: impl Into<FeatureVector>) -> Self {
        self.features = features.into();
        self
    }

    pub fn with_context(mut self, context: ClassificationContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_metadata(mut self, metadata: FileMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// What happened to one asset.
#[derive(Debug)]
pub enum AssetOutcome {
    /// A prior record was found; the classifier was not called.
    Cached {
        record: AnalysisRecord,
        tier: CacheTier,
    },
    /// Classified and committed to the shared store.
    Analyzed { committed: CommittedRecord },
    /// A record that was not committed; a later run will retry it.
    Provisional {
        record: AnalysisRecord,
        reason: String,
    },
    /// The commit was rejected. `error` is always a commit conflict.
    Failed {
        record: AnalysisRecord,
        error: ScoretagError,
    },
    /// Cancelled before the asset was hashed or looked up.
    Skipped { name: String },
}

impl AssetOutcome {
    /// The record produced for the asset, if it got that far.
    pub fn record(&self) -> Option<&AnalysisRecord> {
        match self {
            AssetOutcome::Cached { record, .. }
            | AssetOutcome::Provisional { record, .. }
            | AssetOutcome::Failed { record, .. } => Some(record),
            AssetOutcome::Analyzed { committed } => Some(&committed.record),
            AssetOutcome::Skipped { .. } => None,
        }
    }

    /// Confidence tier of the produced record, if any.
    pub fn confidence_tier(&self) -> Option<ConfidenceTier> {
        self.record().map(|record| record.confidence_tier)
    }

    pub fn status(&self) -> &'static str {
        match self {
            AssetOutcome::Cached { .. } => "cached",
            AssetOutcome::Analyzed { .. } => "analyzed",
            AssetOutcome::Provisional { .. } => "provisional",
            AssetOutcome::Failed { .. } => "failed",
            AssetOutcome::Skipped { .. } => "skipped",
        }
    }
}
