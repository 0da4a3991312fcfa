//! The tenant configuration provider.
//!
//! [`TenantProvider`] owns the currently published [`TenantSnapshot`] and
//! the machinery that keeps it fresh:
//!
//! ```text
//!   load_all ──────────────┐
//!   (bulk prefix reads)    │   ArcSwap<TenantSnapshot>     read API
//!                          ├──► (one atomic store) ───────► (one atomic load)
//!   watch loop ────────────┘           │
//!   (one event = one copy)             └──► fallback cache (off the hot path)
//! ```
//!
//! Writers never mutate a published snapshot; readers never take a lock.

mod builder;
mod read;
mod watch;


use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwap;
pub use builder::*;
use tracing::debug;
use tracing::info;
use tracing::warn;
pub use watch::WatchState;

use self::watch::WatchControl;
use crate::metrics::CACHE_SAVES;
use crate::metrics::CODEC_FAILURES;
use crate::metrics::SNAPSHOT_PUBLISHED;
use crate::metrics::TENANT_COUNT;
use crate::utils::async_task::spawn_task;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::CacheError;
use crate::CoordinationStore;
use crate::Error;
use crate::FallbackCache;
use crate::KeyCodec;
use crate::Result;
use crate::RetryPolicies;
use crate::SnapshotOrigin;
use crate::TenantSnapshot;
use crate::WatchConfig;

/// Cheap to clone; every clone shares the same snapshot and watch.
#[derive(Clone)]
pub struct TenantProvider {
    pub(crate) inner: Arc<ProviderInner>,
}

impl std::fmt::Debug for TenantProvider {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let snapshot = self.inner.current.load();
        f.debug_struct("TenantProvider")
            .field("namespace", &self.inner.codec.keyspace().namespace())
            .field("revision", &snapshot.revision())
            .field("origin", &snapshot.origin())
            .field("tenants", &snapshot.tenant_count())
            .field("watch", &self.watch_state())
            .finish()
    }
}

pub(crate) struct ProviderInner {
    pub(crate) store: Arc<dyn CoordinationStore>,
    pub(crate) codec: KeyCodec,
    pub(crate) cache: Option<Arc<dyn FallbackCache>>,
    pub(crate) watch_config: WatchConfig,
    pub(crate) retry: RetryPolicies,

    pub(crate) current: ArcSwap<TenantSnapshot>,
    /// Serializes bulk loads
    load_lock: tokio::sync::Mutex<()>,
    pub(crate) watch: parking_lot::Mutex<WatchControl>,

    /// Sequence of the newest snapshot handed to the cache
    persist_seq: AtomicU64,
    /// Sequence of the newest snapshot the cache actually holds
    persisted_seq: Arc<parking_lot::Mutex<u64>>,
}

impl ProviderInner {
    pub(super) fn new(
        store: Arc<dyn CoordinationStore>,
        codec: KeyCodec,
        cache: Option<Arc<dyn FallbackCache>>,
        watch_config: WatchConfig,
        retry: RetryPolicies,
    ) -> Self {
        Self {
            store,
            codec,
            cache,
            watch_config,
            retry,
            current: ArcSwap::from_pointee(TenantSnapshot::new()),
            load_lock: tokio::sync::Mutex::new(()),
            watch: parking_lot::Mutex::new(WatchControl::default()),
            persist_seq: AtomicU64::new(0),
            persisted_seq: Arc::new(parking_lot::Mutex::new(0)),
        }
    }

    /// Reads every tenant and common key into a fresh snapshot and publishes it.
    ///
    /// Nothing is published unless both prefix reads succeed. Returns the
    /// store revision the snapshot reflects.
    pub(crate) async fn load_all(&self) -> Result<i64> {
        let _guard = self.load_lock.lock().await;
        let keyspace = self.codec.keyspace();

        let tenants = self.store.get_prefix(&keyspace.tenants_prefix()).await?;
        let common = self.store.get_prefix(&keyspace.common_prefix()).await?;
        // Resuming from the older of the two reads replays at most a few
        // already-applied upserts, which is harmless.
        let revision = tenants.revision.min(common.revision);

        let mut fresh = TenantSnapshot::new();
        let mut malformed = 0usize;
        for kv in tenants.kvs.iter().chain(common.kvs.iter()) {
            let Some(key) = kv.key_str() else {
                warn!(key = ?kv.key, "skipping non UTF-8 key");
                continue;
            };
            if let Err(e) = self.codec.apply_put(&mut fresh, key, &kv.value) {
                warn!(key, error = %e, "skipping malformed tenant record");
                CODEC_FAILURES.with_label_values(&[key_category(&self.codec, key)]).inc();
                malformed += 1;
            }
        }
        fresh.enrich_all();
        fresh.rebuild_indexes();
        fresh.set_revision(revision);
        fresh.set_origin(SnapshotOrigin::Store);

        let tenant_count = fresh.tenant_count();
        let fresh = Arc::new(fresh);
        let mut replaced = false;
        self.current.rcu(|current| {
            replaced = current.origin() != SnapshotOrigin::Store || current.revision() <= revision;
            if replaced {
                Arc::clone(&fresh)
            } else {
                Arc::clone(current)
            }
        });

        if replaced {
            self.after_publish(&fresh, "load");
            info!(
                tenants = tenant_count,
                keys = tenants.kvs.len() + common.kvs.len(),
                malformed,
                revision,
                "tenant snapshot loaded"
            );
        } else {
            debug!(revision, "bulk load is older than the watched snapshot, not publishing");
        }
        Ok(revision)
    }

    /// Publishes the fallback cache's snapshot. Returns `false` when there
    /// is no cache or it holds nothing.
    pub(crate) fn load_from_cache(&self) -> Result<bool> {
        let Some(cache) = &self.cache else {
            return Ok(false);
        };
        let snapshot = match cache.load() {
            Ok(snapshot) => snapshot,
            Err(CacheError::Empty) => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let snapshot = Arc::new(snapshot);
        self.current.store(Arc::clone(&snapshot));
        self.after_publish(&snapshot, "fallback");
        warn!(
            tenants = snapshot.tenant_count(),
            revision = snapshot.revision(),
            "serving tenant snapshot from fallback cache"
        );
        Ok(true)
    }

    pub(crate) fn has_store_snapshot(&self) -> bool {
        self.current.load().origin() == SnapshotOrigin::Store
    }

    pub(crate) fn after_publish(
        &self,
        snapshot: &Arc<TenantSnapshot>,
        source: &'static str,
    ) {
        SNAPSHOT_PUBLISHED.with_label_values(&[source]).inc();
        TENANT_COUNT.set(snapshot.tenant_count() as i64);
        if snapshot.origin() == SnapshotOrigin::Store {
            self.persist(Arc::clone(snapshot));
        }
    }

    /// Saves `snapshot` on a blocking thread. A save that finishes after a
    /// newer one is dropped, so the cache only ever moves forward.
    fn persist(
        &self,
        snapshot: Arc<TenantSnapshot>,
    ) {
        let Some(cache) = self.cache.clone() else {
            return;
        };
        let seq = self.persist_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let persisted_seq = Arc::clone(&self.persisted_seq);

        spawn_task("persist_fallback_cache", async move {
            tokio::task::spawn_blocking(move || {
                let mut persisted = persisted_seq.lock();
                if *persisted >= seq {
                    debug!(seq, newest = *persisted, "skipping superseded cache save");
                    return Ok(());
                }
                match cache.save(&snapshot) {
                    Ok(()) => {
                        *persisted = seq;
                        CACHE_SAVES.with_label_values(&["ok"]).inc();
                        Ok(())
                    }
                    Err(e) => {
                        CACHE_SAVES.with_label_values(&["error"]).inc();
                        Err(Error::Cache(e))
                    }
                }
            })
            .await
            .map_err(|e| Error::Fatal(format!("cache save task panicked: {e}")))?
        });
    }
}

/// Category label for metrics; unknown keys are labelled `other`.
pub(crate) fn key_category(
    codec: &KeyCodec,
    key: &str,
) -> &'static str {
    codec.keyspace().parse(key).map(|k| k.category()).unwrap_or("other")
}

impl TenantProvider {
    pub fn builder(store: impl CoordinationStore) -> ProviderBuilder {
        ProviderBuilder::new(store)
    }

    /// Builds the provider and performs the startup load.
    ///
    /// Configuration errors from [`ProviderBuilder::build`] are returned
    /// without touching the store.
    ///
    /// `load_all` is retried per `retry.startup_load`. If every attempt
    /// fails, the fallback cache is published instead; without one, the
    /// last load error is returned.
    pub async fn connect_with_retry(builder: ProviderBuilder) -> Result<Self> {
        let provider = builder.build()?;
        let policy = provider.inner.retry.startup_load;

        let result = task_with_timeout_and_exponential_backoff(|| provider.inner.load_all(), policy).await;
        let load_error = match result {
            Ok(_) => return Ok(provider),
            Err(e) => e,
        };

        warn!(error = %load_error, "initial tenant load failed, trying fallback cache");
        match provider.inner.load_from_cache() {
            Ok(true) => Ok(provider),
            Ok(false) => Err(load_error),
            Err(e) => {
                warn!(error = %e, "fallback cache unusable");
                Err(load_error)
            }
        }
    }

    /// Replaces the snapshot with a fresh read of the store.
    ///
    /// On failure nothing is published and the previous snapshot stays live.
    pub async fn load_all(&self) -> Result<()> {
        self.inner.load_all().await.map(|_| ())
    }

    /// Like [`TenantProvider::load_all`], but if the store is unreachable
    /// and no store snapshot has ever been published, publishes the fallback
    /// cache instead.
    pub async fn load_all_or_fallback(&self) -> Result<()> {
        let load_error = match self.inner.load_all().await {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };
        if self.inner.has_store_snapshot() {
            return Err(load_error);
        }

        warn!(error = %load_error, "tenant load failed, trying fallback cache");
        match self.inner.load_from_cache() {
            Ok(true) => Ok(()),
            Ok(false) => Err(load_error),
            Err(e) => {
                warn!(error = %e, "fallback cache unusable");
                Err(load_error)
            }
        }
    }
}
