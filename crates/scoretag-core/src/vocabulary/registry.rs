//! Controlled vocabulary registry.
//!
//! A [`VocabularySnapshot`] is immutable. Callers hold an `Arc` to one
//! snapshot for the duration of a standardization so a concurrent
//! [`SharedVocabulary::replace`] never changes the rules mid-label.

use super::inference::{InferenceRule, InferenceTable};
use crate::error::{Result, ScoretagError};
use crate::models::{ClassificationContext, VocabularyEntry};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Trimmed, case-folded form used for every vocabulary comparison.
pub(crate) fn fold(term: &str) -> String {
    term.trim().to_lowercase()
}

/// On-disk vocabulary format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyFile {
    #[serde(default)]
    pub entries: Vec<VocabularyEntry>,
    #[serde(default)]
    pub inference_rules: Vec<InferenceRule>,
}

/// A problem found by [`VocabularySnapshot::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyIssue {
    pub category: String,
    pub message: String,
}

impl fmt::Display for VocabularyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

/// Immutable view of the vocabulary and inference table.
#[derive(Debug, Clone, Default)]
pub struct VocabularySnapshot {
    entries: Vec<VocabularyEntry>,
    /// category → indices into `entries`, in file order
    by_category: HashMap<String, Vec<usize>>,
    /// Every tag named in some entry's `compatible_contexts`.
    constrained_contexts: HashSet<String>,
    inference: InferenceTable,
}

impl VocabularySnapshot {
    pub fn new(entries: Vec<VocabularyEntry>, rules: Vec<InferenceRule>) -> Self {
        let mut by_category: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            by_category
                .entry(entry.category.clone())
                .or_default()
                .push(idx);
        }
        let constrained_contexts = entries
            .iter()
            .flat_map(|entry| entry.compatible_contexts.iter().cloned())
            .collect();
        Self {
            entries,
            by_category,
            constrained_contexts,
            inference: InferenceTable::new(rules),
        }
    }

    pub fn from_file(file: VocabularyFile) -> Self {
        Self::new(file.entries, file.inference_rules)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: VocabularyFile = serde_json::from_str(json)?;
        Ok(Self::from_file(file))
    }

    /// Load a vocabulary JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ScoretagError::io_with_path(e, path))?;
        let file: VocabularyFile = serde_json::from_str(&content).map_err(|e| {
            ScoretagError::Json {
                message: format!("Invalid vocabulary file {}", path.display()),
                source: Some(e),
            }
        })?;
        let snapshot = Self::from_file(file);
        info!(
            "Loaded vocabulary from {} ({} entries, {} inference rules)",
            path.display(),
            snapshot.len(),
            snapshot.inference.rules().len()
        );
        Ok(snapshot)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    /// Entries of one category, in vocabulary order.
    pub fn entries_for<'a>(
        &'a self,
        category: &str,
    ) -> impl Iterator<Item = &'a VocabularyEntry> + 'a {
        self.by_category
            .get(category)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.entries[idx])
    }

    /// Entry whose canonical term equals `term` after folding.
    pub fn find_term(&self, category: &str, term: &str) -> Option<&VocabularyEntry> {
        let folded = fold(term);
        self.entries_for(category)
            .find(|entry| fold(&entry.canonical_term) == folded)
    }

    pub fn contains_term(&self, category: &str, term: &str) -> bool {
        self.find_term(category, term).is_some()
    }

    /// Whether any entry lists `tag` as a compatible context.
    pub fn constrains_context(&self, tag: &str) -> bool {
        self.constrained_contexts.contains(tag)
    }

    pub fn infer(&self, category: &str, context: &ClassificationContext) -> Option<&str> {
        self.inference.infer(category, context)
    }

    /// Admin-time consistency checks.
    ///
    /// Reports empty terms, duplicate canonical terms, aliases shared by two
    /// entries or equal to another entry's canonical term, and inference
    /// rules pointing at terms missing from the vocabulary.
    pub fn validate(&self) -> Vec<VocabularyIssue> {
        let mut issues = Vec::new();
        let mut categories: Vec<&String> = self.by_category.keys().collect();
        categories.sort();

        for category in categories {
            // folded name → canonical term that owns it
            let mut owners: HashMap<String, &str> = HashMap::new();

            for entry in self.entries_for(category) {
                let canonical = fold(&entry.canonical_term);
                if canonical.is_empty() {
                    issues.push(VocabularyIssue {
                        category: category.clone(),
                        message: "entry with empty canonical term".to_string(),
                    });
                    continue;
                }
                if let Some(owner) = owners.insert(canonical.clone(), &entry.canonical_term) {
                    issues.push(VocabularyIssue {
                        category: category.clone(),
                        message: format!(
                            "canonical term '{}' collides with '{}'",
                            entry.canonical_term, owner
                        ),
                    });
                }
            }

            for entry in self.entries_for(category) {
                let canonical = fold(&entry.canonical_term);
                for alias in &entry.aliases {
                    let folded = fold(alias);
                    if folded.is_empty() || folded == canonical {
                        continue;
                    }
                    match owners.get(&folded) {
                        Some(owner) if fold(owner) != canonical => {
                            issues.push(VocabularyIssue {
                                category: category.clone(),
                                message: format!(
                                    "alias '{}' of '{}' collides with '{}'",
                                    alias, entry.canonical_term, owner
                                ),
                            });
                        }
                        Some(_) => {}
                        None => {
                            owners.insert(folded, &entry.canonical_term);
                        }
                    }
                }
            }
        }

        for rule in self.inference.rules() {
            if !self.contains_term(&rule.category, &rule.term) {
                issues.push(VocabularyIssue {
                    category: rule.category.clone(),
                    message: format!("inference rule targets unknown term '{}'", rule.term),
                });
            }
        }

        issues
    }

    /// Fail with the first validation issue, if any.
    pub fn ensure_valid(&self) -> Result<()> {
        match self.validate().into_iter().next() {
            Some(issue) => Err(ScoretagError::Vocabulary {
                category: issue.category,
                message: issue.message,
            }),
            None => Ok(()),
        }
    }
}

/// Source of the current vocabulary.
pub trait VocabularyRegistry: Send + Sync {
    fn snapshot(&self) -> Arc<VocabularySnapshot>;
}

/// Process-wide vocabulary that can be swapped at runtime.
#[derive(Debug, Default)]
pub struct SharedVocabulary {
    current: RwLock<Arc<VocabularySnapshot>>,
}

impl SharedVocabulary {
    pub fn new(snapshot: VocabularySnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Install a new snapshot, returning the previous one.
    ///
    /// Standardizations already holding the old snapshot finish against it.
    pub fn replace(&self, snapshot: VocabularySnapshot) -> Arc<VocabularySnapshot> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        info!("Vocabulary replaced ({} entries)", snapshot.len());
        std::mem::replace(&mut *current, Arc::new(snapshot))
    }
}

impl VocabularyRegistry for SharedVocabulary {
    fn snapshot(&self) -> Arc<VocabularySnapshot> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> VocabularySnapshot {
        VocabularySnapshot::new(
            vec![
                VocabularyEntry::new("scenario", "追逐").with_aliases(["追击", "追车"]),
                VocabularyEntry::new("scenario", "潜入").with_aliases(["潜行"]),
                VocabularyEntry::new("emotion", "紧张"),
            ],
            vec![InferenceRule::new("scenario", "潜入").when_film_type("谍战片")],
        )
    }

    #[test]
    fn test_entries_for_keeps_order() {
        let snapshot = sample();
        let terms: Vec<&str> = snapshot
            .entries_for("scenario")
            .map(|e| e.canonical_term.as_str())
            .collect();
        assert_eq!(terms, vec!["追逐", "潜入"]);
        assert_eq!(snapshot.entries_for("missing").count(), 0);
    }

    #[test]
    fn test_find_term_folds_case_and_whitespace() {
        let snapshot = VocabularySnapshot::new(
            vec![VocabularyEntry::new("genre", "Ambient")],
            Vec::new(),
        );
        assert!(snapshot.contains_term("genre", "  ambient "));
        assert!(!snapshot.contains_term("scenario", "ambient"));
    }

    #[test]
    fn test_validate_clean_vocabulary() {
        assert!(sample().validate().is_empty());
        assert!(sample().ensure_valid().is_ok());
    }

    #[test]
    fn test_validate_reports_collisions() {
        let snapshot = VocabularySnapshot::new(
            vec![
                VocabularyEntry::new("scenario", "追逐").with_aliases(["追击"]),
                VocabularyEntry::new("scenario", "追击"),
                VocabularyEntry::new("scenario", "潜入").with_aliases(["追击"]),
                VocabularyEntry::new("scenario", "潜入"),
            ],
            vec![InferenceRule::new("scenario", "不存在")],
        );

        let issues = snapshot.validate();
        let messages: Vec<String> = issues.iter().map(ToString::to_string).collect();
        assert!(messages.iter().any(|m| m.contains("canonical term '潜入'")));
        assert!(messages.iter().any(|m| m.contains("alias '追击' of '追逐'")));
        assert!(messages.iter().any(|m| m.contains("alias '追击' of '潜入'")));
        assert!(messages.iter().any(|m| m.contains("unknown term '不存在'")));
        assert!(matches!(
            snapshot.ensure_valid(),
            Err(ScoretagError::Vocabulary { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vocab.json");
        std::fs::write(
            &path,
            r#"{
                "entries": [
                    {"category": "scenario", "canonicalTerm": "潜入", "aliases": ["潜行"]}
                ],
                "inferenceRules": [
                    {"category": "scenario", "filmType": "谍战片", "term": "潜入"}
                ]
            }"#,
        )
        .unwrap();

        let snapshot = VocabularySnapshot::load(&path).unwrap();
        assert_eq!(snapshot.len(), 1);
        let context = ClassificationContext::default().with_film_type("谍战片");
        assert_eq!(snapshot.infer("scenario", &context), Some("潜入"));
    }

    #[test]
    fn test_shared_vocabulary_replace() {
        let shared = SharedVocabulary::new(sample());
        let held = shared.snapshot();

        let previous = shared.replace(VocabularySnapshot::default());
        assert_eq!(previous.len(), 3);
        assert_eq!(held.len(), 3);
        assert!(shared.snapshot().is_empty());
    }
}
