//! Scoretag Core - classification cache and controlled vocabulary for
//! soundtrack cues.
//!
//! Classifying a cue is expensive, so every asset is first identified by a
//! content fingerprint and looked up across a local cache and a shared store.
//! Only unseen assets reach the classifier; its free-text labels are mapped
//! onto a curated vocabulary, its provenance guess is reconciled with file
//! tags, and the result is committed with an atomic upsert so one fingerprint
//! never yields two records.
//!
//! # Example
//!
//! ```rust,ignore
//! use scoretag_core::pipeline::{Asset, AssetPipeline, BatchRunner};
//! use scoretag_core::store::{SqliteLocalStore, SqliteSharedStore};
//! use scoretag_core::vocabulary::{SharedVocabulary, VocabularySnapshot};
//!
//! #[tokio::main]
//! async fn main() -> scoretag_core::Result<()> {
//!     let vocabulary = SharedVocabulary::new(VocabularySnapshot::load("vocab.json")?);
//!     let pipeline = AssetPipeline::builder(classifier, shared_store, Arc::new(vocabulary))
//!         .local_store(Arc::new(SqliteLocalStore::open("local-cache.sqlite")?))
//!         .build()?;
//!
//!     let report = BatchRunner::new(Arc::new(pipeline))
//!         .run(assets, &CancellationToken::new())
//!         .await;
//!     println!("{} analyzed", report.summary.analyzed);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod pipeline;
pub mod provenance;
pub mod remote;
pub mod store;
pub mod vocabulary;

// Re-export commonly used types
pub use cache::{CacheLookup, CacheTier, ThreeTierCache};
pub use cancel::CancellationToken;
pub use config::ScoretagConfig;
pub use error::{Result, ScoretagError};
pub use identity::FingerprintResolver;
pub use models::{AnalysisRecord, CommittedRecord, ConfidenceTier, Identity, MatchKind};
pub use pipeline::{Asset, AssetOutcome, AssetPipeline, BatchReport, BatchRunner};
pub use vocabulary::{SharedVocabulary, VocabularySnapshot, VocabularyStandardizer};
