//! Controlled vocabulary and label standardization.
//!
//! - [`VocabularyStandardizer`]: raw label → canonical term with fallbacks
//! - [`SharedVocabulary`]: swappable registry behind [`VocabularyRegistry`]
//! - [`CandidateSink`]: review queue for unresolved labels

mod candidates;
mod generator;
mod inference;
mod registry;
mod standardizer;

pub use candidates::{
    is_plausible_candidate, CandidateSink, InMemoryCandidateQueue, SqliteCandidateQueue,
};
pub use generator::TermGenerator;
pub use inference::{InferenceRule, InferenceTable};
pub use registry::{
    SharedVocabulary, VocabularyFile, VocabularyIssue, VocabularyRegistry, VocabularySnapshot,
};
pub use standardizer::VocabularyStandardizer;
