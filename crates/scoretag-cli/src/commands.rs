//! Subcommand implementations.

use crate::manifest;
use crate::AnalyzeArgs;
use anyhow::{bail, Context, Result};
use scoretag_core::config::StoreConfig;
use scoretag_core::models::{AnalysisRecord, ConfidenceTier};
use scoretag_core::remote::{HttpClassifier, HttpRemoteStore, HttpTermGenerator};
use scoretag_core::store::{RemoteStore, SqliteLocalStore, SqliteSharedStore};
use scoretag_core::vocabulary::{SharedVocabulary, SqliteCandidateQueue, VocabularySnapshot};
use scoretag_core::{AssetOutcome, AssetPipeline, BatchRunner, CancellationToken, ScoretagConfig};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// One line of `analyze` output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeLine<'a> {
    name: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tier: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence_tier: Option<ConfidenceTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<&'a AnalysisRecord>,
}

impl<'a> OutcomeLine<'a> {
    fn new(outcome: &'a AssetOutcome) -> Self {
        let (name, tier, store_id, reason) = match outcome {
            AssetOutcome::Cached { record, tier } => {
                (record.name.as_str(), Some(tier.as_str()), None, None)
            }
            AssetOutcome::Analyzed { committed } => (
                committed.record.name.as_str(),
                None,
                Some(committed.store_id.as_str()),
                None,
            ),
            AssetOutcome::Provisional { record, reason } => {
                (record.name.as_str(), None, None, Some(reason.clone()))
            }
            AssetOutcome::Failed { record, error } => {
                (record.name.as_str(), None, None, Some(error.to_string()))
            }
            AssetOutcome::Skipped { name } => (name.as_str(), None, None, None),
        };
        Self {
            name,
            status: outcome.status(),
            tier,
            store_id,
            confidence_tier: outcome.confidence_tier(),
            reason,
            record: outcome.record(),
        }
    }
}

fn load_config(args: &AnalyzeArgs) -> Result<ScoretagConfig> {
    let mut config = match &args.config {
        Some(path) => ScoretagConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ScoretagConfig::default(),
    };
    if args.no_hash {
        config.identity.hash_enabled = false;
    }
    if let Some(concurrency) = args.concurrency {
        config.pipeline.max_concurrency = concurrency;
    }
    config.validate()?;
    Ok(config)
}

fn load_vocabulary(path: &Path) -> Result<VocabularySnapshot> {
    let snapshot = VocabularySnapshot::load(path)
        .with_context(|| format!("failed to load vocabulary {}", path.display()))?;
    for issue in snapshot.validate() {
        warn!("Vocabulary issue: {}", issue);
    }
    Ok(snapshot)
}

fn open_shared_store(args: &AnalyzeArgs) -> Result<Arc<dyn RemoteStore>> {
    if let Some(url) = &args.remote_url {
        info!("Using HTTP shared store at {}", url);
        return Ok(Arc::new(HttpRemoteStore::new(url)?));
    }
    let path = args
        .shared_db
        .clone()
        .unwrap_or_else(|| args.data_dir.join(StoreConfig::SHARED_DB_FILENAME));
    info!("Using SQLite shared store at {}", path.display());
    Ok(Arc::new(SqliteSharedStore::open(path)?))
}

/// `scoretag analyze`
pub async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let config = load_config(&args)?;
    let vocabulary = Arc::new(SharedVocabulary::new(load_vocabulary(&args.vocabulary)?));
    let assets = manifest::load(&args.manifest).await?;
    info!("Loaded {} assets from {}", assets.len(), args.manifest.display());

    let classifier = Arc::new(HttpClassifier::new(&args.classifier_url)?);
    let remote = open_shared_store(&args)?;
    let local = Arc::new(SqliteLocalStore::open(
        args.data_dir.join(StoreConfig::LOCAL_DB_FILENAME),
    )?);
    let candidates = Arc::new(SqliteCandidateQueue::open(
        args.data_dir.join(StoreConfig::CANDIDATES_DB_FILENAME),
    )?);

    let mut builder = AssetPipeline::builder(classifier, remote, vocabulary)
        .local_store(local)
        .candidate_sink(candidates)
        .config(config);
    if let Some(url) = &args.generator_url {
        builder = builder.generator(Arc::new(HttpTermGenerator::new(url)?));
    }
    let pipeline = Arc::new(builder.build()?);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight assets");
            signal_cancel.cancel();
        }
    });

    let report = BatchRunner::new(pipeline).run(assets, &cancel).await;
    signal_task.abort();

    for outcome in &report.outcomes {
        println!("{}", serde_json::to_string(&OutcomeLine::new(outcome))?);
    }
    eprintln!("{}", serde_json::to_string(&report.summary)?);

    if report.summary.failed > 0 {
        bail!("{} assets failed to commit", report.summary.failed);
    }
    Ok(())
}

/// `scoretag validate-vocabulary`
pub fn validate_vocabulary(path: &Path) -> Result<()> {
    let snapshot = VocabularySnapshot::load(path)
        .with_context(|| format!("failed to load vocabulary {}", path.display()))?;
    let issues = snapshot.validate();
    for issue in &issues {
        println!("{}", issue);
    }
    if !issues.is_empty() {
        bail!("{} vocabulary issues found", issues.len());
    }
    info!("{} entries, no issues", snapshot.len());
    Ok(())
}

/// `scoretag candidates`
pub fn candidates(data_dir: &Path) -> Result<()> {
    let path = data_dir.join(StoreConfig::CANDIDATES_DB_FILENAME);
    if !path.exists() {
        info!("No review queue at {}", path.display());
        return Ok(());
    }
    let queue = SqliteCandidateQueue::open(&path)?;
    for candidate in queue.list_pending()? {
        println!("{}", serde_json::to_string(&candidate)?);
    }
    Ok(())
}
