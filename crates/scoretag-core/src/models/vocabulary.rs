//! Controlled-vocabulary types shared by the standardizer and review queue.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A canonical term with its aliases and the contexts it fits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyEntry {
    pub category: String,
    pub canonical_term: String,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    /// Context tags (film types, emotions, scenes) this term is compatible
    /// with. Empty means compatible with everything.
    #[serde(default)]
    pub compatible_contexts: BTreeSet<String>,
}

impl VocabularyEntry {
    pub fn new(category: impl Into<String>, canonical_term: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            canonical_term: canonical_term.into(),
            aliases: BTreeSet::new(),
            compatible_contexts: BTreeSet::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn with_contexts<I, S>(mut self, contexts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compatible_contexts
            .extend(contexts.into_iter().map(Into::into));
        self
    }
}

/// How a raw label was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchKind {
    Exact,
    Alias,
    ContextInferred,
    Generated,
    Unresolved,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Alias => "alias",
            MatchKind::ContextInferred => "contextInferred",
            MatchKind::Generated => "generated",
            MatchKind::Unresolved => "unresolved",
        }
    }
}

/// Context supplied alongside a classification request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationContext {
    #[serde(default)]
    pub film_type: Option<String>,
    #[serde(default)]
    pub primary_emotion: Option<String>,
    #[serde(default)]
    pub scene: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl ClassificationContext {
    pub fn with_film_type(mut self, film_type: impl Into<String>) -> Self {
        self.film_type = Some(film_type.into());
        self
    }

    pub fn with_primary_emotion(mut self, emotion: impl Into<String>) -> Self {
        self.primary_emotion = Some(emotion.into());
        self
    }

    /// Every non-empty context tag, de-duplicated.
    pub fn context_tags(&self) -> BTreeSet<&str> {
        [&self.film_type, &self.primary_emotion, &self.scene]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .chain(self.tags.iter().map(String::as_str))
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

/// Annotation attached when a match was kept despite incompatible context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMismatch {
    /// Fraction of supplied context tags the entry is compatible with.
    pub score: f64,
    pub incompatible_tags: Vec<String>,
}

/// Outcome of standardizing one raw label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standardized {
    pub canonical_term: String,
    pub match_kind: MatchKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_mismatch: Option<ContextMismatch>,
}

/// Review state of a candidate term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum CandidateStatus {
    #[default]
    PendingReview,
    Approved,
    Rejected,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::PendingReview => "pendingReview",
            CandidateStatus::Approved => "approved",
            CandidateStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for CandidateStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendingReview" => Ok(CandidateStatus::PendingReview),
            "approved" => Ok(CandidateStatus::Approved),
            "rejected" => Ok(CandidateStatus::Rejected),
            _ => Err(()),
        }
    }
}

/// An unresolved label captured for human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTerm {
    pub term: String,
    pub category: String,
    #[serde(default)]
    pub suggested_aliases: BTreeSet<String>,
    #[serde(default)]
    pub suggested_contexts: BTreeSet<String>,
    pub confidence: f64,
    #[serde(default)]
    pub status: CandidateStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_tags_skip_blank_and_dedupe() {
        let mut context = ClassificationContext::default()
            .with_film_type("警匪片")
            .with_primary_emotion(" ");
        context.tags.insert("警匪片".into());
        context.tags.insert("夜景".into());

        let tags: Vec<&str> = context.context_tags().into_iter().collect();
        assert_eq!(tags, vec!["夜景", "警匪片"]);
    }

    #[test]
    fn test_match_kind_serializes_camel_case() {
        assert_eq!(
            serde_json::to_string(&MatchKind::ContextInferred).unwrap(),
            "\"contextInferred\""
        );
        assert_eq!(MatchKind::ContextInferred.as_str(), "contextInferred");
    }

    #[test]
    fn test_candidate_status_round_trip() {
        for status in [
            CandidateStatus::PendingReview,
            CandidateStatus::Approved,
            CandidateStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<CandidateStatus>(), Ok(status));
        }
    }
}
