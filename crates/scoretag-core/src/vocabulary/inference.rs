//! Context inference table.
//!
//! Maps `(category, filmType, primaryEmotion)` to a canonical term for labels
//! that neither match exactly nor by alias. A rule field left unset matches
//! any value; the most specific matching rule wins, ties by table order.

use crate::models::ClassificationContext;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceRule {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub film_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_emotion: Option<String>,
    pub term: String,
}

impl InferenceRule {
    pub fn new(category: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            film_type: None,
            primary_emotion: None,
            term: term.into(),
        }
    }

    pub fn when_film_type(mut self, film_type: impl Into<String>) -> Self {
        self.film_type = Some(film_type.into());
        self
    }

    pub fn when_emotion(mut self, emotion: impl Into<String>) -> Self {
        self.primary_emotion = Some(emotion.into());
        self
    }

    /// Number of constrained fields, or `None` if the rule does not apply.
    fn specificity(&self, category: &str, context: &ClassificationContext) -> Option<usize> {
        if self.category != category {
            return None;
        }
        let film = field_matches(self.film_type.as_deref(), context.film_type.as_deref())?;
        let emotion = field_matches(
            self.primary_emotion.as_deref(),
            context.primary_emotion.as_deref(),
        )?;
        Some(film + emotion)
    }
}

fn field_matches(rule: Option<&str>, actual: Option<&str>) -> Option<usize> {
    match (rule, actual) {
        (None, _) => Some(0),
        (Some(expected), Some(actual)) if expected.trim() == actual.trim() => Some(1),
        _ => None,
    }
}

/// Ordered set of inference rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferenceTable {
    rules: Vec<InferenceRule>,
}

impl InferenceTable {
    pub fn new(rules: Vec<InferenceRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[InferenceRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Best term for a category under a context.
    ///
    /// Rules with no constrained field are only used when the context carries
    /// a film type or primary emotion, so a bare context never infers.
    pub fn infer(&self, category: &str, context: &ClassificationContext) -> Option<&str> {
        if context.film_type.is_none() && context.primary_emotion.is_none() {
            return None;
        }

        let mut best: Option<(usize, &InferenceRule)> = None;
        for rule in &self.rules {
            let Some(score) = rule.specificity(category, context) else {
                continue;
            };
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, rule));
            }
        }
        best.map(|(_, rule)| rule.term.as_str())
    }
}
