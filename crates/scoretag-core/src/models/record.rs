//! Analysis records and the identities they are keyed by.

use super::provenance::ProvenanceInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Raw classifier labels: category → set of free-text labels.
pub type RawLabels = BTreeMap<String, BTreeSet<String>>;

/// Standardized labels: category → ordered canonical terms.
pub type StandardizedLabels = BTreeMap<String, Vec<String>>;

/// Content identity of an asset.
///
/// A fingerprint is a content digest and is the dedup key. A name is the
/// fallback when hashing was skipped or failed; it is not unique over time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Identity {
    Fingerprint(String),
    Name(String),
}

impl Identity {
    const FINGERPRINT_PREFIX: &'static str = "fp:";
    const NAME_PREFIX: &'static str = "name:";

    /// The bare fingerprint or name.
    pub fn as_str(&self) -> &str {
        match self {
            Identity::Fingerprint(value) | Identity::Name(value) => value,
        }
    }

    pub fn fingerprint(&self) -> Option<&str> {
        match self {
            Identity::Fingerprint(fp) => Some(fp),
            Identity::Name(_) => None,
        }
    }

    pub fn is_fingerprint(&self) -> bool {
        matches!(self, Identity::Fingerprint(_))
    }

    /// Key used by stores; kind-prefixed so a name can never shadow a digest.
    pub fn storage_key(&self) -> String {
        match self {
            Identity::Fingerprint(fp) => format!("{}{}", Self::FINGERPRINT_PREFIX, fp),
            Identity::Name(name) => format!("{}{}", Self::NAME_PREFIX, name),
        }
    }

    /// Inverse of [`Identity::storage_key`].
    pub fn from_storage_key(key: &str) -> Option<Self> {
        if let Some(fp) = key.strip_prefix(Self::FINGERPRINT_PREFIX) {
            Some(Identity::Fingerprint(fp.to_string()))
        } else {
            key.strip_prefix(Self::NAME_PREFIX)
                .map(|name| Identity::Name(name.to_string()))
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// Coarse trust level on provenance data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    #[default]
    Low,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low => "low",
        }
    }
}

impl std::str::FromStr for ConfidenceTier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(ConfidenceTier::High),
            "medium" => Ok(ConfidenceTier::Medium),
            "low" => Ok(ConfidenceTier::Low),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted result of analysing one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub identity: Identity,
    /// Display name at the time of the last analysis.
    pub name: String,
    #[serde(default)]
    pub raw_labels: RawLabels,
    #[serde(default)]
    pub standardized_labels: StandardizedLabels,
    #[serde(default)]
    pub provenance: ProvenanceInfo,
    #[serde(default)]
    pub confidence_tier: ConfidenceTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisRecord {
    /// Create an empty record stamped with the current time.
    pub fn new(identity: Identity, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            identity,
            name: name.into(),
            raw_labels: RawLabels::new(),
            standardized_labels: StandardizedLabels::new(),
            provenance: ProvenanceInfo::default(),
            confidence_tier: ConfidenceTier::Low,
            created_at: now,
            updated_at: now,
        }
    }

    /// Canonical terms stored for a category, empty if none.
    pub fn terms(&self, category: &str) -> &[String] {
        self.standardized_labels
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// A record as persisted by a store, with the store-assigned identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedRecord {
    pub store_id: String,
    pub record: AnalysisRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_round_trip() {
        let fp = Identity::Fingerprint("abc123".into());
        let name = Identity::Name("fp:abc123".into());

        assert_eq!(fp.storage_key(), "fp:abc123");
        assert_eq!(name.storage_key(), "name:fp:abc123");
        assert_ne!(fp.storage_key(), name.storage_key());
        assert_eq!(Identity::from_storage_key("fp:abc123"), Some(fp));
        assert_eq!(Identity::from_storage_key("name:fp:abc123"), Some(name));
        assert_eq!(Identity::from_storage_key("abc123"), None);
    }

    #[test]
    fn test_confidence_tier_strings() {
        assert_eq!(ConfidenceTier::Medium.as_str(), "medium");
        assert_eq!("HIGH".parse::<ConfidenceTier>(), Ok(ConfidenceTier::High));
        assert!("certain".parse::<ConfidenceTier>().is_err());
        assert_eq!(
            serde_json::to_string(&ConfidenceTier::Low).unwrap(),
            "\"low\""
        );
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let mut record = AnalysisRecord::new(Identity::Fingerprint("abc123".into()), "cue01.wav");
        record
            .standardized_labels
            .insert("scenario".into(), vec!["潜入".into()]);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["identity"]["kind"], "fingerprint");
        assert_eq!(json["identity"]["value"], "abc123");
        assert_eq!(json["standardizedLabels"]["scenario"][0], "潜入");
        assert_eq!(json["confidenceTier"], "low");
        assert_eq!(record.terms("scenario"), ["潜入".to_string()]);
        assert!(record.terms("emotion").is_empty());
    }
}
