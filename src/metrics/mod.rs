//! Prometheus collectors for the snapshot pipeline.
//!
//! Collectors are created lazily and are not registered anywhere by the
//! library. Embedding applications call [`register_custom_metrics`] with the
//! registry they expose.


use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;

lazy_static! {
    /// Snapshots published, by source: `load`, `watch`, `fallback`
    pub static ref SNAPSHOT_PUBLISHED: IntCounterVec = IntCounterVec::new(
        Opts::new("tenant_snapshot_published_total", "Tenant snapshots published"),
        &["source"]
    )
    .expect("metric can not be created");

    /// Watch events applied, by kind: `put`, `delete`
    pub static ref WATCH_EVENTS_APPLIED: IntCounterVec = IntCounterVec::new(
        Opts::new("tenant_watch_events_applied_total", "Watch events applied to the snapshot"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_RECONNECTS: IntCounter = IntCounter::new(
        "tenant_watch_reconnects_total",
        "Watch subscriptions re-established after a loss"
    )
    .expect("metric can not be created");

    /// Records skipped because they could not be decoded, by category
    pub static ref CODEC_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("tenant_codec_failures_total", "Malformed tenant records skipped"),
        &["category"]
    )
    .expect("metric can not be created");

    /// Fallback cache writes, by result: `ok`, `error`
    pub static ref CACHE_SAVES: IntCounterVec = IntCounterVec::new(
        Opts::new("tenant_cache_saves_total", "Fallback cache save attempts"),
        &["result"]
    )
    .expect("metric can not be created");

    pub static ref TENANT_COUNT: IntGauge = IntGauge::new(
        "tenant_count",
        "Tenants in the current snapshot"
    )
    .expect("metric can not be created");
}

pub fn register_custom_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(SNAPSHOT_PUBLISHED.clone()))?;
    registry.register(Box::new(WATCH_EVENTS_APPLIED.clone()))?;
    registry.register(Box::new(WATCH_RECONNECTS.clone()))?;
    registry.register(Box::new(CODEC_FAILURES.clone()))?;
    registry.register(Box::new(CACHE_SAVES.clone()))?;
    registry.register(Box::new(TENANT_COUNT.clone()))?;
    Ok(())
}
