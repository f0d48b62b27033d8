//! Raw label → canonical term resolution.
//!
//! Resolution order:
//! 1. Exact match on a canonical term (trimmed, case-folded)
//! 2. Alias match, bidirectional substring, longest alias wins
//! 3. Context compatibility check on 1-2 (lenient unless configured strict)
//! 4. Context inference table
//! 5. Generative fallback, then the category's catch-all term
//!
//! Steps 1-4 are pure for a given snapshot. Step 5 is memoized and only
//! ever adds review candidates keyed by `(category, term)`, so repeating it
//! cannot duplicate state.

use super::candidates::{is_plausible_candidate, pending_candidate, CandidateSink};
use super::generator::TermGenerator;
use super::registry::{fold, VocabularyRegistry, VocabularySnapshot};
use crate::config::StandardizerConfig;
use crate::models::{
    ClassificationContext, ContextMismatch, MatchKind, RawLabels, Standardized,
    StandardizedLabels, VocabularyEntry,
};
use mini_moka::sync::Cache;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Maps classifier labels onto the controlled vocabulary.
pub struct VocabularyStandardizer {
    registry: Arc<dyn VocabularyRegistry>,
    generator: Option<Arc<dyn TermGenerator>>,
    candidates: Option<Arc<dyn CandidateSink>>,
    config: StandardizerConfig,
    /// Generator answers, keyed by category, folded label and context.
    generated: Cache<String, Option<String>>,
}

impl VocabularyStandardizer {
    pub fn new(registry: Arc<dyn VocabularyRegistry>, config: StandardizerConfig) -> Self {
        let generated = Cache::builder()
            .time_to_live(Duration::from_secs(config.generation_memo_ttl_secs))
            .max_capacity(config.generation_memo_capacity)
            .build();
        Self {
            registry,
            generator: None,
            candidates: None,
            config,
            generated,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn TermGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_candidate_sink(mut self, sink: Arc<dyn CandidateSink>) -> Self {
        self.candidates = Some(sink);
        self
    }

    pub fn config(&self) -> &StandardizerConfig {
        &self.config
    }

    /// Resolve using only the vocabulary and inference table.
    ///
    /// Returns `None` when a generator or catch-all would be needed.
    pub fn resolve_local(
        &self,
        raw_label: &str,
        category: &str,
        context: &ClassificationContext,
    ) -> Option<Standardized> {
        let snapshot = self.registry.snapshot();
        resolve_with_snapshot(&snapshot, &self.config, raw_label, category, context)
    }

    /// Resolve a label to a canonical term. Never fails and never returns an
    /// empty term.
    pub async fn standardize(
        &self,
        raw_label: &str,
        category: &str,
        context: &ClassificationContext,
    ) -> Standardized {
        let snapshot = self.registry.snapshot();
        if let Some(resolved) =
            resolve_with_snapshot(&snapshot, &self.config, raw_label, category, context)
        {
            return resolved;
        }

        let label = raw_label.trim();
        if label.is_empty() {
            return self.catch_all(category);
        }

        if let Some(term) = self.generate(label, category, context).await {
            let canonical = snapshot
                .find_term(category, &term)
                .map(|entry| entry.canonical_term.clone());
            if canonical.is_none() {
                self.submit_candidate(
                    &term,
                    category,
                    BTreeSet::from([label.to_string()]),
                    context,
                    self.config.generated_candidate_confidence,
                )
                .await;
            }
            debug!("Generated term '{}' for {}/{}", term, category, label);
            return Standardized {
                canonical_term: canonical.unwrap_or(term),
                match_kind: MatchKind::Generated,
                context_mismatch: None,
            };
        }

        if is_plausible_candidate(label, self.config.candidate_max_chars) {
            self.submit_candidate(
                label,
                category,
                BTreeSet::new(),
                context,
                self.config.unresolved_candidate_confidence,
            )
            .await;
        }
        self.catch_all(category)
    }

    /// Standardize every label of every category.
    ///
    /// Terms keep first-seen order without duplicates. The catch-all term is
    /// only kept for a category when none of its labels resolved to anything
    /// more specific.
    pub async fn standardize_labels(
        &self,
        raw_labels: &RawLabels,
        context: &ClassificationContext,
    ) -> StandardizedLabels {
        let mut standardized = StandardizedLabels::new();

        for (category, labels) in raw_labels {
            let mut terms: Vec<String> = Vec::new();
            let mut fallback: Option<String> = None;

            for label in labels {
                let result = self.standardize(label, category, context).await;
                if result.match_kind == MatchKind::Unresolved {
                    fallback.get_or_insert(result.canonical_term);
                    continue;
                }
                if !terms.contains(&result.canonical_term) {
                    terms.push(result.canonical_term);
                }
            }

            if terms.is_empty() {
                terms.extend(fallback);
            }
            if !terms.is_empty() {
                standardized.insert(category.clone(), terms);
            }
        }

        standardized
    }

    fn catch_all(&self, category: &str) -> Standardized {
        Standardized {
            canonical_term: self.config.catch_all_for(category).to_string(),
            match_kind: MatchKind::Unresolved,
            context_mismatch: None,
        }
    }

    async fn generate(
        &self,
        label: &str,
        category: &str,
        context: &ClassificationContext,
    ) -> Option<String> {
        let generator = self.generator.as_ref()?;
        let key = memo_key(label, category, context);
        if let Some(memoized) = self.generated.get(&key) {
            return memoized;
        }

        let timeout = self.config.generation_timeout();
        let answer = match tokio::time::timeout(
            timeout,
            generator.generate(label, category, context),
        )
        .await
        {
            Ok(Ok(term)) => term
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            Ok(Err(e)) => {
                warn!("Term generation failed for {}/{}: {}", category, label, e);
                return None;
            }
            Err(_) => {
                warn!(
                    "Term generation timed out after {:?} for {}/{}",
                    timeout, category, label
                );
                return None;
            }
        };

        self.generated.insert(key, answer.clone());
        answer
    }

    async fn submit_candidate(
        &self,
        term: &str,
        category: &str,
        aliases: BTreeSet<String>,
        context: &ClassificationContext,
        confidence: f64,
    ) {
        let Some(sink) = &self.candidates else {
            return;
        };
        let contexts = context
            .context_tags()
            .into_iter()
            .map(str::to_string)
            .collect();
        let candidate = pending_candidate(term, category, aliases, contexts, confidence);
        if let Err(e) = sink.submit(candidate).await {
            warn!("Failed to queue review candidate {}/{}: {}", category, term, e);
        }
    }
}

fn memo_key(label: &str, category: &str, context: &ClassificationContext) -> String {
    let tags: Vec<&str> = context.context_tags().into_iter().collect();
    format!("{}\u{1f}{}\u{1f}{}", category, fold(label), tags.join("\u{1e}"))
}

/// Steps 1-4 against a fixed snapshot.
fn resolve_with_snapshot(
    snapshot: &VocabularySnapshot,
    config: &StandardizerConfig,
    raw_label: &str,
    category: &str,
    context: &ClassificationContext,
) -> Option<Standardized> {
    let label = fold(raw_label);
    if label.is_empty() {
        return None;
    }

    let matched = snapshot
        .find_term(category, &label)
        .map(|entry| (entry, MatchKind::Exact))
        .or_else(|| match_alias(snapshot, config, &label, category).map(|e| (e, MatchKind::Alias)));

    if let Some((entry, match_kind)) = matched {
        match check_context(snapshot, entry, context, config.context_acceptance_threshold) {
            None => {
                return Some(Standardized {
                    canonical_term: entry.canonical_term.clone(),
                    match_kind,
                    context_mismatch: None,
                })
            }
            Some(mismatch) if !config.strict_context => {
                warn!(
                    "Context mismatch for '{}' → '{}' (score {:.2}, incompatible: {:?}), keeping match",
                    raw_label.trim(),
                    entry.canonical_term,
                    mismatch.score,
                    mismatch.incompatible_tags
                );
                return Some(Standardized {
                    canonical_term: entry.canonical_term.clone(),
                    match_kind,
                    context_mismatch: Some(mismatch),
                });
            }
            Some(mismatch) => {
                debug!(
                    "Discarding '{}' → '{}' under strict context (score {:.2})",
                    raw_label.trim(),
                    entry.canonical_term,
                    mismatch.score
                );
            }
        }
    }

    snapshot.infer(category, context).map(|term| Standardized {
        canonical_term: term.to_string(),
        match_kind: MatchKind::ContextInferred,
        context_mismatch: None,
    })
}

/// Best alias match for an already-folded label.
///
/// Exact alias equality beats substring containment; among substring
/// matches the longest alias wins and ties keep vocabulary order.
fn match_alias<'a>(
    snapshot: &'a VocabularySnapshot,
    config: &StandardizerConfig,
    label: &str,
    category: &str,
) -> Option<&'a VocabularyEntry> {
    let label_chars = label.chars().count();
    let mut best: Option<((bool, usize), &VocabularyEntry)> = None;

    for entry in snapshot.entries_for(category) {
        let names = std::iter::once(&entry.canonical_term).chain(entry.aliases.iter());
        for name in names {
            let alias = fold(name);
            if alias.is_empty() {
                continue;
            }
            let alias_chars = alias.chars().count();

            let rank = if alias == label {
                (true, alias_chars)
            } else if config.alias_substring_matching
                && alias_chars >= config.min_alias_chars
                && label_chars >= config.min_alias_chars
                && (label.contains(alias.as_str()) || alias.contains(label))
            {
                (false, alias_chars)
            } else {
                continue;
            };

            if best.map_or(true, |(top, _)| rank > top) {
                best = Some((rank, entry));
            }
        }
    }

    best.map(|(_, entry)| entry)
}

/// `None` when the context is acceptable for the entry.
///
/// The film type is always scored. Other tags count only when the
/// vocabulary uses them as a constraint somewhere, so an emotion or scene
/// tag no entry mentions cannot drag a film-type match below threshold.
fn check_context(
    snapshot: &VocabularySnapshot,
    entry: &VocabularyEntry,
    context: &ClassificationContext,
    threshold: f64,
) -> Option<ContextMismatch> {
    if entry.compatible_contexts.is_empty() {
        return None;
    }

    let film_type = context
        .film_type
        .as_deref()
        .map(str::trim)
        .filter(|tag| !tag.is_empty());
    let tags: Vec<&str> = context
        .context_tags()
        .into_iter()
        .filter(|tag| Some(*tag) == film_type || snapshot.constrains_context(tag))
        .collect();
    if tags.is_empty() {
        return None;
    }

    let incompatible_tags: Vec<String> = tags
        .iter()
        .filter(|tag| !entry.compatible_contexts.contains(**tag))
        .map(|tag| tag.to_string())
        .collect();
    let score = (tags.len() - incompatible_tags.len()) as f64 / tags.len() as f64;

    if score >= threshold {
        None
    } else {
        Some(ContextMismatch {
            score,
            incompatible_tags,
        })
    }
}
