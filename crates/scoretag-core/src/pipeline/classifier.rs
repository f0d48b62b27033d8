//! External classifier seam.

use crate::error::Result;
use crate::models::{ClassificationContext, ClassifierProvenance, RawLabels};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque feature vector produced by the upstream extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(pub Vec<f32>);

impl FeatureVector {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Labels and provenance guess returned by the classifier.
///
/// The classifier's confidence travels on `provenance.confidence`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierOutput {
    #[serde(default)]
    pub raw_labels: RawLabels,
    #[serde(default)]
    pub provenance: ClassifierProvenance,
}

/// The costly classification call the cache exists to avoid.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        features: &FeatureVector,
        context: &ClassificationContext,
    ) -> Result<ClassifierOutput>;
}
