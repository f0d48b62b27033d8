//! Per-asset control flow.
//!
//! identity → cache lookup → (hit: done) | classify → standardize →
//! reconcile → commit → populate local cache.

use super::asset::{Asset, AssetOutcome};
use super::classifier::{Classifier, ClassifierOutput};
use super::upsert::UpsertCoordinator;
use crate::cache::{CacheLookup, ThreeTierCache};
use crate::cancel::CancellationToken;
use crate::config::{PipelineConfig, ScoretagConfig};
use crate::error::Result;
use crate::identity::FingerprintResolver;
use crate::models::{AnalysisRecord, Identity};
use crate::provenance::reconcile;
use crate::remote::{retry_async, with_timeout, RetryPolicy};
use crate::store::{LocalStore, RemoteStore};
use crate::vocabulary::{CandidateSink, TermGenerator, VocabularyRegistry, VocabularyStandardizer};
use std::sync::Arc;
use tracing::{debug, warn};

/// Builder for [`AssetPipeline`].
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = AssetPipeline::builder(classifier, shared_store, vocabulary)
///     .local_store(local)
///     .generator(generator)
///     .config(config)
///     .build()?;
/// ```
pub struct PipelineBuilder {
    classifier: Arc<dyn Classifier>,
    remote: Arc<dyn RemoteStore>,
    vocabulary: Arc<dyn VocabularyRegistry>,
    local: Option<Arc<dyn LocalStore>>,
    generator: Option<Arc<dyn TermGenerator>>,
    candidates: Option<Arc<dyn CandidateSink>>,
    resolver: Option<FingerprintResolver>,
    config: ScoretagConfig,
}

impl PipelineBuilder {
    /// Use a local durable store as cache tier 1.
    pub fn local_store(mut self, local: Arc<dyn LocalStore>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TermGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn candidate_sink(mut self, sink: Arc<dyn CandidateSink>) -> Self {
        self.candidates = Some(sink);
        self
    }

    /// Override the resolver derived from `config.identity`.
    pub fn resolver(mut self, resolver: FingerprintResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn config(mut self, config: ScoretagConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<AssetPipeline> {
        self.config.validate()?;
        let ScoretagConfig {
            identity,
            cache,
            standardizer,
            pipeline,
        } = self.config;

        let resolver = self
            .resolver
            .unwrap_or_else(|| FingerprintResolver::from_config(&identity));
        let cache = ThreeTierCache::new(self.local, Some(Arc::clone(&self.remote)), cache);

        let mut vocabulary = VocabularyStandardizer::new(self.vocabulary, standardizer);
        if let Some(generator) = self.generator {
            vocabulary = vocabulary.with_generator(generator);
        }
        if let Some(sink) = self.candidates {
            vocabulary = vocabulary.with_candidate_sink(sink);
        }

        Ok(AssetPipeline {
            resolver,
            cache,
            classifier: self.classifier,
            standardizer: vocabulary,
            upsert: UpsertCoordinator::new(self.remote, pipeline.commit_timeout()),
            retry: RetryPolicy::from_pipeline(&pipeline),
            config: pipeline,
        })
    }
}

/// Analyzes assets, reusing prior results wherever possible.
pub struct AssetPipeline {
    resolver: FingerprintResolver,
    cache: ThreeTierCache,
    classifier: Arc<dyn Classifier>,
    standardizer: VocabularyStandardizer,
    upsert: UpsertCoordinator,
    retry: RetryPolicy,
    config: PipelineConfig,
}

impl AssetPipeline {
    pub fn builder(
        classifier: Arc<dyn Classifier>,
        remote: Arc<dyn RemoteStore>,
        vocabulary: Arc<dyn VocabularyRegistry>,
    ) -> PipelineBuilder {
        PipelineBuilder {
            classifier,
            remote,
            vocabulary,
            local: None,
            generator: None,
            candidates: None,
            resolver: None,
            config: ScoretagConfig::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ThreeTierCache {
        &self.cache
    }

    pub fn standardizer(&self) -> &VocabularyStandardizer {
        &self.standardizer
    }

    /// Derive an asset's identity. Never fails.
    pub async fn identify(&self, asset: &Asset) -> Identity {
        self.resolver.resolve_content(&asset.content, &asset.name).await
    }

    /// Run one asset end to end.
    pub async fn process(&self, asset: &Asset, cancel: &CancellationToken) -> AssetOutcome {
        if cancel.is_cancelled() {
            return AssetOutcome::Skipped {
                name: asset.name.clone(),
            };
        }
        let identity = self.identify(asset).await;
        self.process_identified(identity, asset, cancel).await
    }

    /// Run one asset whose identity is already known.
    ///
    /// Cancellation is honoured up to the cache lookup. Past that point the
    /// asset runs to completion so a paid-for classification is committed.
    pub async fn process_identified(
        &self,
        identity: Identity,
        asset: &Asset,
        cancel: &CancellationToken,
    ) -> AssetOutcome {
        if cancel.is_cancelled() {
            return AssetOutcome::Skipped {
                name: asset.name.clone(),
            };
        }

        if let CacheLookup::Hit { record, tier } = self.cache.lookup(&identity, &asset.name).await {
            return AssetOutcome::Cached { record, tier };
        }

        let output = match self.classify(asset).await {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    "Classification of {} failed, returning provisional record: {}",
                    asset.name, e
                );
                let reason = format!("classification failed: {}", e);
                let mut record = AnalysisRecord::new(identity, asset.name.clone());
                record.provenance.confidence_reason = Some(reason.clone());
                return AssetOutcome::Provisional { record, reason };
            }
        };

        let record = self.build_record(identity.clone(), asset, output).await;

        match self.upsert.commit(&identity, &record).await {
            Ok(committed) => {
                self.cache.remember(&identity, &committed.record).await;
                AssetOutcome::Analyzed { committed }
            }
            Err(error) if error.is_commit_conflict() => AssetOutcome::Failed { record, error },
            Err(e) => AssetOutcome::Provisional {
                record,
                reason: format!("commit failed: {}", e),
            },
        }
    }

    async fn classify(&self, asset: &Asset) -> Result<ClassifierOutput> {
        let timeout = self.config.classifier_timeout();
        let what = format!("classify {}", asset.name);
        retry_async(&self.retry, &what, || {
            with_timeout(
                timeout,
                self.classifier.classify(&asset.features, &asset.context),
            )
        })
        .await
    }

    async fn build_record(
        &self,
        identity: Identity,
        asset: &Asset,
        output: ClassifierOutput,
    ) -> AnalysisRecord {
        let standardized = self
            .standardizer
            .standardize_labels(&output.raw_labels, &asset.context)
            .await;
        let reconciled = reconcile(&output.provenance, &asset.metadata);
        debug!(
            "{}: {} categories standardized, provenance tier {}",
            asset.name,
            standardized.len(),
            reconciled.tier
        );

        let mut record = AnalysisRecord::new(identity, asset.name.clone());
        record.raw_labels = output.raw_labels;
        record.standardized_labels = standardized;
        record.provenance = reconciled.provenance;
        record.confidence_tier = reconciled.tier;
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScoretagError;
    use crate::models::{
        ClassificationContext, ConfidenceTier, FileMetadata, RawLabels, VocabularyEntry,
    };
    use crate::pipeline::FeatureVector;
    use crate::store::InMemoryRemoteStore;
    use crate::vocabulary::{SharedVocabulary, VocabularySnapshot};
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyClassifier {
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Classifier for FlakyClassifier {
        async fn classify(
            &self,
            _features: &FeatureVector,
            _context: &ClassificationContext,
        ) -> Result<ClassifierOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(ScoretagError::RemoteStatus {
                    service: "classifier".into(),
                    status: 503,
                    message: "busy".into(),
                });
            }
            let mut raw_labels = RawLabels::new();
            raw_labels.insert("scenario".into(), BTreeSet::from(["追击戏".to_string()]));
            Ok(ClassifierOutput {
                raw_labels,
                provenance: Default::default(),
            })
        }
    }

    fn pipeline(classifier: Arc<FlakyClassifier>, store: Arc<InMemoryRemoteStore>) -> AssetPipeline {
        let vocabulary = SharedVocabulary::new(VocabularySnapshot::new(
            vec![VocabularyEntry::new("scenario", "追逐").with_aliases(["追击"])],
            Vec::new(),
        ));
        let mut config = ScoretagConfig::default();
        config.pipeline.classifier_max_attempts = 2;
        config.pipeline.retry_base_delay_ms = 1;
        AssetPipeline::builder(classifier, store, Arc::new(vocabulary))
            .config(config)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_transient_classifier_failure_is_retried() {
        let classifier = Arc::new(FlakyClassifier {
            failures_left: AtomicUsize::new(1),
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(InMemoryRemoteStore::new());
        let pipeline = pipeline(classifier.clone(), store.clone());

        let asset = Asset::new("cue.wav").with_bytes(b"cue bytes".to_vec());
        let outcome = pipeline.process(&asset, &CancellationToken::new()).await;

        match outcome {
            AssetOutcome::Analyzed { committed } => {
                assert_eq!(committed.record.terms("scenario"), ["追逐".to_string()]);
            }
            other => panic!("unexpected outcome: {}", other.status()),
        }
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_classifier_yields_provisional_record() {
        let classifier = Arc::new(FlakyClassifier {
            failures_left: AtomicUsize::new(10),
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(InMemoryRemoteStore::new());
        let pipeline = pipeline(classifier.clone(), store.clone());

        let asset = Asset::new("cue.wav")
            .with_bytes(b"cue bytes".to_vec())
            .with_metadata(FileMetadata {
                album: Some("Heat OST".into()),
                ..Default::default()
            });
        let outcome = pipeline.process(&asset, &CancellationToken::new()).await;

        let AssetOutcome::Provisional { record, reason } = outcome else {
            panic!("expected provisional outcome");
        };
        assert!(reason.contains("classification failed"));
        assert_eq!(record.confidence_tier, ConfidenceTier::Low);
        assert!(record.standardized_labels.is_empty());
        assert!(store.is_empty());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_lookup_is_skipped() {
        let classifier = Arc::new(FlakyClassifier {
            failures_left: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        });
        let pipeline = pipeline(classifier.clone(), Arc::new(InMemoryRemoteStore::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = pipeline.process(&Asset::new("cue.wav"), &cancel).await;
        assert!(matches!(outcome, AssetOutcome::Skipped { .. }));
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let classifier = Arc::new(FlakyClassifier {
            failures_left: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        });
        let mut config = ScoretagConfig::default();
        config.pipeline.max_concurrency = 0;
        let result = AssetPipeline::builder(
            classifier,
            Arc::new(InMemoryRemoteStore::new()),
            Arc::new(SharedVocabulary::default()),
        )
        .config(config)
        .build();
        assert!(result.is_err());
    }
}
