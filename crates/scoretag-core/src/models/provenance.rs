//! Provenance inputs and the merged provenance stored on a record.

use super::record::ConfidenceTier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fields of [`ProvenanceInfo`] that can carry an origin tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProvenanceField {
    SourceType,
    TitleOrAlbum,
    Scene,
    Creators,
}

/// Which input supplied a provenance field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldOrigin {
    Classifier,
    Metadata,
}

/// Merged provenance of an asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_or_album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creators: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_reason: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_origins: BTreeMap<ProvenanceField, FieldOrigin>,
}

impl ProvenanceInfo {
    /// True when no descriptive field is known.
    pub fn is_unknown(&self) -> bool {
        self.source_type.is_none()
            && self.title_or_album.is_none()
            && self.scene.is_none()
            && self.creators.is_empty()
    }

    pub fn origin_of(&self, field: ProvenanceField) -> Option<FieldOrigin> {
        self.field_origins.get(&field).copied()
    }
}

/// Provenance as guessed by the external classifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierProvenance {
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub scene: Option<String>,
    #[serde(default)]
    pub creators: Vec<String>,
    #[serde(default)]
    pub confidence: Option<ConfidenceTier>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Tags read from the asset file by an upstream extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album_artist: Option<String>,
    #[serde(default)]
    pub composer: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
}
