//! Three-tier lookup cascade that avoids re-invoking the classifier.
//!
//! Order of operations:
//! 1. Local durable store by fingerprint (only when a fingerprint exists)
//! 2. Shared store by fingerprint (bounded timeout)
//! 3. Shared store by display name (bounded timeout)
//!
//! Tier 3 runs even when the asset has a fingerprint: a curator may have
//! corrected a record uploaded from another device, and that record must win
//! over a fresh classification. The first hit short-circuits. Errors and
//! timeouts in any tier count as misses for that tier only.

use crate::config::CacheConfig;
use crate::error::Result;
use crate::models::{AnalysisRecord, Identity};
use crate::store::{LocalStore, RemoteStore};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Which tier answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheTier {
    Local,
    RemoteFingerprint,
    RemoteName,
}

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Local => "local",
            CacheTier::RemoteFingerprint => "remote-fingerprint",
            CacheTier::RemoteName => "remote-name",
        }
    }

    fn index(&self) -> usize {
        match self {
            CacheTier::Local => 0,
            CacheTier::RemoteFingerprint => 1,
            CacheTier::RemoteName => 2,
        }
    }
}

/// Result of a cascade lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit {
        record: AnalysisRecord,
        tier: CacheTier,
    },
    Miss,
}

/// Per-tier counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStats {
    pub hits: u64,
    pub misses: u64,
    pub failures: u64,
}

#[derive(Default)]
struct TierCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
}

impl TierCounters {
    fn snapshot(&self) -> TierStats {
        TierStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Cascading cache over a local store and a shared store.
pub struct ThreeTierCache {
    local: Option<Arc<dyn LocalStore>>,
    remote: Option<Arc<dyn RemoteStore>>,
    config: CacheConfig,
    counters: [TierCounters; 3],
}

impl ThreeTierCache {
    pub fn new(
        local: Option<Arc<dyn LocalStore>>,
        remote: Option<Arc<dyn RemoteStore>>,
        config: CacheConfig,
    ) -> Self {
        Self {
            local,
            remote,
            config,
            counters: Default::default(),
        }
    }

    /// Look up a prior record for an asset.
    ///
    /// Never fails: unavailable tiers are skipped, and only when every tier
    /// misses does this return [`CacheLookup::Miss`].
    pub async fn lookup(&self, identity: &Identity, name: &str) -> CacheLookup {
        // 1. Local durable store
        if let (Some(fp), Some(local)) = (identity.fingerprint(), &self.local) {
            if let Some(record) = self
                .query_tier(CacheTier::Local, self.config.local_timeout(), local.get(fp))
                .await
            {
                return CacheLookup::Hit {
                    record,
                    tier: CacheTier::Local,
                };
            }
        }

        let Some(remote) = &self.remote else {
            return CacheLookup::Miss;
        };

        // 2. Shared store by fingerprint
        if let Some(fp) = identity.fingerprint() {
            if let Some(record) = self
                .query_tier(
                    CacheTier::RemoteFingerprint,
                    self.config.remote_fingerprint_timeout(),
                    remote.get_by_fingerprint(fp),
                )
                .await
            {
                self.write_back(identity, &record).await;
                return CacheLookup::Hit {
                    record,
                    tier: CacheTier::RemoteFingerprint,
                };
            }
        }

        // 3. Shared store by name
        if let Some(record) = self
            .query_tier(
                CacheTier::RemoteName,
                self.config.remote_name_timeout(),
                remote.get_by_name(name),
            )
            .await
        {
            self.write_back(identity, &record).await;
            return CacheLookup::Hit {
                record,
                tier: CacheTier::RemoteName,
            };
        }

        debug!("Cache miss in all tiers for {}", identity);
        CacheLookup::Miss
    }

    /// Cache a committed record in the local store (best-effort).
    pub async fn remember(&self, identity: &Identity, record: &AnalysisRecord) {
        let (Some(fp), Some(local)) = (identity.fingerprint(), &self.local) else {
            return;
        };
        if let Err(e) = local.put(fp, record).await {
            warn!("Failed to cache {} locally: {}", identity, e);
        }
    }

    /// Counters for one tier.
    pub fn stats(&self, tier: CacheTier) -> TierStats {
        self.counters[tier.index()].snapshot()
    }

    async fn write_back(&self, identity: &Identity, record: &AnalysisRecord) {
        if self.config.write_back {
            self.remember(identity, record).await;
        }
    }

    async fn query_tier<F>(&self, tier: CacheTier, timeout: Duration, fut: F) -> Option<AnalysisRecord>
    where
        F: Future<Output = Result<Option<AnalysisRecord>>>,
    {
        let counters = &self.counters[tier.index()];
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(Some(record))) => {
                debug!("Cache hit ({}) for {}", tier.as_str(), record.identity);
                counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(record)
            }
            Ok(Ok(None)) => {
                counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Ok(Err(e)) => {
                warn!("Cache tier {} failed, treating as miss: {}", tier.as_str(), e);
                counters.failures.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(_) => {
                warn!(
                    "Cache tier {} timed out after {:?}, treating as miss",
                    tier.as_str(),
                    timeout
                );
                counters.failures.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }
}
