//! Watch and reconnect engine.
//!
//! ```text
//!            start_watch            stream lost
//!  Stopped ─────────────► Watching ────────────► Reconnecting
//!     ▲                      ▲                        │
//!     │                      └──── resubscribed ──────┤
//!     └──────────── stop_watch / parent cancelled ────┘
//! ```
//!
//! The loop resumes from the revision after the last event it applied. When
//! that history has been compacted it reloads everything and resumes from
//! the reload's revision instead.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::key_category;
use super::ProviderInner;
use super::TenantProvider;
use crate::metrics::CODEC_FAILURES;
use crate::metrics::WATCH_EVENTS_APPLIED;
use crate::metrics::WATCH_RECONNECTS;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::CodecError;
use crate::ConfigKey;
use crate::Error;
use crate::Result;
use crate::SnapshotOrigin;
use crate::StoreError;
use crate::TenantSnapshot;
use crate::WatchConfig;
use crate::WatchError;
use crate::WatchEvent;
use crate::WatchEventType;
use crate::WatchResponse;
use crate::WatchStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchState {
    #[default]
    Stopped,
    Watching,
    Reconnecting,
}

/// Lifecycle state and the handle that cancels the running loop, kept
/// under one lock so they never disagree.
#[derive(Debug, Default)]
pub(crate) struct WatchControl {
    state: WatchState,
    cancel: Option<CancellationToken>,
    /// Bumped by every `start_watch`; a loop only touches state it owns.
    generation: u64,
}

/// `min(current * multiplier, max_delay)`
pub(crate) fn next_backoff(
    current: Duration,
    config: &WatchConfig,
) -> Duration {
    let max = config.max_delay();
    if current >= max {
        return max;
    }
    current.mul_f64(config.multiplier).min(max)
}

enum EventOutcome {
    Applied(ConfigKey),
    Ignored,
    Stale,
    Malformed(CodecError),
}

/// Marks the watch `Stopped` when dropped unless disarmed. Held by a
/// pending `start_watch` and by the running loop, so an early return or a
/// panic never leaves the state stuck.
struct WatchGuard<'a> {
    inner: &'a ProviderInner,
    generation: u64,
    armed: bool,
}

impl Drop for WatchGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.finish_watch(self.generation);
        }
    }
}

impl TenantProvider {
    /// Subscribes to the namespace and keeps the snapshot in sync in a
    /// background task until `stop_watch` or until `parent` is cancelled.
    ///
    /// Returns once the subscription is open. Fails with
    /// [`WatchError::AlreadyRunning`] unless the watch is stopped, or with
    /// the store error if the subscription cannot be opened.
    pub async fn start_watch(
        &self,
        parent: &CancellationToken,
    ) -> Result<()> {
        let inner = &self.inner;
        let (token, generation) = {
            let mut control = inner.watch.lock();
            if control.state != WatchState::Stopped {
                return Err(WatchError::AlreadyRunning.into());
            }
            let token = parent.child_token();
            control.generation += 1;
            control.cancel = Some(token.clone());
            control.state = WatchState::Watching;
            (token, control.generation)
        };
        let mut guard = WatchGuard {
            inner: inner.as_ref(),
            generation,
            armed: true,
        };

        let resume_from = {
            let current = inner.current.load();
            (current.origin() == SnapshotOrigin::Store).then(|| current.revision())
        };
        let (stream, last_revision) = inner.subscribe(resume_from).await?;

        if token.is_cancelled() {
            debug!("watch cancelled while subscribing");
            return Ok(());
        }
        guard.armed = false;

        info!(
            prefix = inner.codec.keyspace().watch_prefix(),
            resume_from = ?last_revision,
            "tenant watch started"
        );
        tokio::spawn(Arc::clone(inner).run_watch_loop(token, generation, stream, last_revision));
        Ok(())
    }

    /// [`TenantProvider::start_watch`] retried per `retry.watch_start`.
    pub async fn start_watch_with_retry(
        &self,
        parent: &CancellationToken,
    ) -> Result<()> {
        if self.watch_state() != WatchState::Stopped {
            return Err(WatchError::AlreadyRunning.into());
        }
        let policy = self.inner.retry.watch_start;
        task_with_timeout_and_exponential_backoff(|| self.start_watch(parent), policy).await
    }

    /// Cancels the watch loop. Calling it on a stopped provider is a no-op.
    pub fn stop_watch(&self) {
        let mut control = self.inner.watch.lock();
        if let Some(token) = control.cancel.take() {
            token.cancel();
            info!("tenant watch stopped");
        }
        control.state = WatchState::Stopped;
    }

    pub fn watch_state(&self) -> WatchState {
        self.inner.watch.lock().state
    }
}

impl ProviderInner {
    /// Opens the namespace watch after `resume_from`, or from now when
    /// `None`. Falls back to a full reload if that history is compacted.
    ///
    /// Returns the stream and the revision it resumes after.
    async fn subscribe(
        &self,
        resume_from: Option<i64>,
    ) -> Result<(WatchStream, Option<i64>)> {
        let prefix = self.codec.keyspace().watch_prefix();
        match self.store.watch_prefix(prefix, resume_from.map(|r| r + 1)).await {
            Ok(stream) => Ok((stream, resume_from)),
            Err(StoreError::Compacted {
                requested,
                compact_revision,
            }) => {
                warn!(requested, compact_revision, "watch history compacted, reloading tenant snapshot");
                let revision = self.load_all().await?;
                let stream = self.store.watch_prefix(prefix, Some(revision + 1)).await?;
                Ok((stream, Some(revision)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Without a known revision there is no way to tell what was missed,
    /// so the snapshot is reloaded first.
    async fn resubscribe(
        &self,
        last_revision: Option<i64>,
        reload: bool,
    ) -> Result<(WatchStream, Option<i64>)> {
        let resume_from = match last_revision {
            Some(revision) if !reload => revision,
            _ => self.load_all().await?,
        };
        self.subscribe(Some(resume_from)).await
    }

    async fn run_watch_loop(
        self: Arc<Self>,
        token: CancellationToken,
        generation: u64,
        mut stream: WatchStream,
        mut last_revision: Option<i64>,
    ) {
        let _guard = WatchGuard {
            inner: self.as_ref(),
            generation,
            armed: true,
        };
        let mut delay = self.watch_config.base_delay();
        let mut reset_on_response = false;

        loop {
            let item = tokio::select! {
                _ = token.cancelled() => break,
                item = stream.next() => item,
            };

            let mut reload = match item {
                Some(Ok(response)) => {
                    if reset_on_response {
                        delay = self.watch_config.base_delay();
                        reset_on_response = false;
                    }
                    last_revision = self.apply_response(&response, last_revision);
                    continue;
                }
                Some(Err(StoreError::Compacted {
                    requested,
                    compact_revision,
                })) => {
                    warn!(requested, compact_revision, "watch stream reported compaction");
                    true
                }
                Some(Err(e)) => {
                    warn!(error = %e, "watch stream failed");
                    false
                }
                None => {
                    warn!("watch stream ended");
                    false
                }
            };

            self.set_watch_state(generation, WatchState::Reconnecting);
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = sleep(delay) => {}
                }
                delay = next_backoff(delay, &self.watch_config);

                match self.resubscribe(last_revision, reload).await {
                    Ok((next, resumed)) => {
                        stream = next;
                        last_revision = resumed;
                        break;
                    }
                    Err(e) => {
                        if matches!(e, Error::Store(StoreError::Compacted { .. })) {
                            reload = true;
                        }
                        warn!(error = %e, next_delay_ms = delay.as_millis() as u64, "watch resubscribe failed");
                    }
                }
            }

            if token.is_cancelled() {
                break;
            }
            WATCH_RECONNECTS.inc();
            self.set_watch_state(generation, WatchState::Watching);
            reset_on_response = true;
            info!(resume_from = ?last_revision, "tenant watch re-established");
        }

        debug!(generation, "watch loop exited");
    }

    /// Applies the events of one response, in order, to a single copy of
    /// the snapshot and publishes it once. Returns the newest revision seen.
    ///
    /// Events of one store transaction share a revision, so staleness is
    /// judged against the revision the snapshot had before this response.
    fn apply_response(
        &self,
        response: &WatchResponse,
        last_revision: Option<i64>,
    ) -> Option<i64> {
        let newest = response.events.iter().map(|e| e.kv.mod_revision).max();
        let Some(newest) = newest else {
            return last_revision;
        };

        let mut outcomes: Vec<(usize, EventOutcome)> = Vec::new();
        let mut published = None;
        self.current.rcu(|current| {
            outcomes.clear();
            published = None;
            // A bulk load may already include some of these events.
            let applied_revision = (current.origin() == SnapshotOrigin::Store).then(|| current.revision());

            let mut next = TenantSnapshot::clone(current);
            let mut changed = false;
            for (index, event) in response.events.iter().enumerate() {
                let outcome = self.apply_event(&mut next, event, applied_revision);
                changed |= matches!(outcome, EventOutcome::Applied(_));
                outcomes.push((index, outcome));
            }
            if !changed {
                return Arc::clone(current);
            }
            next.rebuild_indexes();
            if next.origin() == SnapshotOrigin::Store {
                next.set_revision(newest.max(current.revision()));
            }
            let next = Arc::new(next);
            published = Some(Arc::clone(&next));
            next
        });

        for (index, outcome) in outcomes {
            let event = &response.events[index];
            let key = event.kv.key_str().unwrap_or_default();
            let revision = event.kv.mod_revision;
            match outcome {
                EventOutcome::Applied(applied) => {
                    let kind = match event.event_type {
                        WatchEventType::Put => "put",
                        WatchEventType::Delete => "delete",
                    };
                    WATCH_EVENTS_APPLIED.with_label_values(&[kind]).inc();
                    debug!(key, revision, kind, tenant_id = ?applied.tenant_id(), "applied watch event");
                }
                EventOutcome::Malformed(e) => {
                    warn!(key, revision, error = %e, "skipping malformed tenant record");
                    CODEC_FAILURES.with_label_values(&[key_category(&self.codec, key)]).inc();
                }
                EventOutcome::Stale => trace!(key, revision, "skipping event already in snapshot"),
                EventOutcome::Ignored => trace!(key, revision, "ignoring watch event"),
            }
        }
        if let Some(snapshot) = &published {
            self.after_publish(snapshot, "watch");
        }

        Some(last_revision.map_or(newest, |r| r.max(newest)))
    }

    /// Applies one event to an unpublished copy.
    fn apply_event(
        &self,
        next: &mut TenantSnapshot,
        event: &WatchEvent,
        applied_revision: Option<i64>,
    ) -> EventOutcome {
        let Some(key) = event.kv.key_str() else {
            warn!(key = ?event.kv.key, "skipping non UTF-8 key");
            return EventOutcome::Ignored;
        };
        if self.codec.classify(key).is_none() {
            return EventOutcome::Ignored;
        }
        if applied_revision.is_some_and(|applied| event.kv.mod_revision <= applied) {
            return EventOutcome::Stale;
        }

        match event.event_type {
            WatchEventType::Put => match self.codec.apply_put(next, key, &event.kv.value) {
                Ok(Some(applied)) => EventOutcome::Applied(applied),
                Ok(None) => EventOutcome::Ignored,
                Err(e) => EventOutcome::Malformed(e),
            },
            WatchEventType::Delete => match self.codec.apply_delete(next, key) {
                Some(applied) => EventOutcome::Applied(applied),
                None => EventOutcome::Ignored,
            },
        }
    }

    fn set_watch_state(
        &self,
        generation: u64,
        state: WatchState,
    ) {
        let mut control = self.watch.lock();
        if control.generation == generation && control.state != WatchState::Stopped {
            control.state = state;
        }
    }

    /// Marks the watch stopped, unless a newer `start_watch` has taken over.
    fn finish_watch(
        &self,
        generation: u64,
    ) {
        let mut control = self.watch.lock();
        if control.generation == generation {
            if let Some(token) = control.cancel.take() {
                token.cancel();
            }
            control.state = WatchState::Stopped;
        }
    }
}
