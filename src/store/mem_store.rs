//! In-process revisioned key-value store.
//!
//! Mirrors the parts of etcd's data model the provider relies on: a global
//! revision bumped by every write, per-revision event history that can be
//! compacted, and prefix watches that replay history from a start revision
//! before streaming live changes. Used by tests and by embedders that keep
//! tenant configuration in-process.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;
use tracing::trace;

use super::CoordinationStore;
use super::KeyValue;
use super::RangeResponse;
use super::WatchEvent;
use super::WatchEventType;
use super::WatchResponse;
use super::WatchStream;
use crate::StoreError;

type WatchSender = mpsc::UnboundedSender<Result<WatchResponse, StoreError>>;

struct Watcher {
    id: u64,
    prefix: String,
    sender: WatchSender,
}

#[derive(Default)]
struct MemState {
    revision: i64,
    compact_revision: i64,
    data: BTreeMap<String, KeyValue>,
    /// Events grouped by the revision that produced them, ascending
    history: Vec<(i64, Vec<WatchEvent>)>,
    watchers: Vec<Watcher>,
    next_watcher_id: u64,
    unavailable: bool,
}

impl MemState {
    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("memory store marked unavailable".to_string()));
        }
        Ok(())
    }

    fn commit(
        &mut self,
        events: Vec<WatchEvent>,
    ) {
        let revision = self.revision;
        self.history.push((revision, events.clone()));

        self.watchers.retain(|w| {
            let matching: Vec<WatchEvent> = events
                .iter()
                .filter(|e| e.kv.key.starts_with(w.prefix.as_bytes()))
                .cloned()
                .collect();
            if matching.is_empty() {
                return !w.sender.is_closed();
            }
            let delivered = w
                .sender
                .send(Ok(WatchResponse {
                    revision,
                    events: matching,
                }))
                .is_ok();
            if !delivered {
                trace!(watcher_id = w.id, "dropping closed watcher");
            }
            delivered
        });
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemState>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryStore")
            .field("revision", &state.revision)
            .field("keys", &state.data.len())
            .field("watchers", &state.watchers.len())
            .finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_revision(&self) -> i64 {
        self.state.lock().revision
    }

    pub fn watcher_count(&self) -> usize {
        let mut state = self.state.lock();
        state.watchers.retain(|w| !w.sender.is_closed());
        state.watchers.len()
    }

    /// Writes one key and returns the new store revision.
    pub fn put(
        &self,
        key: impl Into<String>,
        value: impl Into<Bytes>,
    ) -> i64 {
        self.put_batch([(key.into(), value.into())])
    }

    /// Writes several keys at a single revision.
    pub fn put_batch<I, K, V>(
        &self,
        entries: I,
    ) -> i64
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Bytes>,
    {
        let mut state = self.state.lock();
        let entries: Vec<(String, Bytes)> = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        if entries.is_empty() {
            return state.revision;
        }

        state.revision += 1;
        let revision = state.revision;
        let mut events = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let kv = KeyValue::new(key.clone(), value, revision);
            state.data.insert(key, kv.clone());
            events.push(WatchEvent {
                event_type: WatchEventType::Put,
                kv,
            });
        }
        state.commit(events);
        revision
    }

    /// Deletes one key. Returns the new revision, or `None` if the key did
    /// not exist (which leaves the revision unchanged).
    pub fn delete(
        &self,
        key: &str,
    ) -> Option<i64> {
        let mut state = self.state.lock();
        state.data.remove(key)?;

        state.revision += 1;
        let revision = state.revision;
        state.commit(vec![WatchEvent {
            event_type: WatchEventType::Delete,
            kv: KeyValue::new(key.to_string(), Bytes::new(), revision),
        }]);
        Some(revision)
    }

    /// Discards history before `revision`. Watches that ask to start below
    /// it fail with [`StoreError::Compacted`].
    pub fn compact(
        &self,
        revision: i64,
    ) {
        let mut state = self.state.lock();
        let revision = revision.min(state.revision);
        if revision <= state.compact_revision {
            return;
        }
        state.compact_revision = revision;
        state.history.retain(|(rev, _)| *rev >= revision);
        debug!(revision, "memory store compacted");
    }

    /// Ends every open watch stream, as a dropped connection would.
    pub fn disconnect_watchers(&self) {
        let mut state = self.state.lock();
        let dropped = state.watchers.len();
        state.watchers.clear();
        debug!(dropped, "memory store disconnected watchers");
    }

    /// While unavailable, reads and new watches fail and open watches end.
    pub fn set_available(
        &self,
        available: bool,
    ) {
        let mut state = self.state.lock();
        state.unavailable = !available;
        if !available {
            state.watchers.clear();
        }
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn get_prefix(
        &self,
        prefix: &str,
    ) -> Result<RangeResponse, StoreError> {
        let state = self.state.lock();
        state.check_available()?;

        let kvs = state
            .data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(_, kv)| kv.clone())
            .collect();
        Ok(RangeResponse {
            kvs,
            revision: state.revision,
        })
    }

    async fn watch_prefix(
        &self,
        prefix: &str,
        start_revision: Option<i64>,
    ) -> Result<WatchStream, StoreError> {
        let mut state = self.state.lock();
        state.check_available()?;

        let (sender, receiver) = mpsc::unbounded_channel();

        if let Some(start) = start_revision {
            if start < state.compact_revision {
                return Err(StoreError::Compacted {
                    requested: start,
                    compact_revision: state.compact_revision,
                });
            }
            for (revision, events) in state.history.iter().filter(|(rev, _)| *rev >= start) {
                let matching: Vec<WatchEvent> = events
                    .iter()
                    .filter(|e| e.kv.key.starts_with(prefix.as_bytes()))
                    .cloned()
                    .collect();
                if matching.is_empty() {
                    continue;
                }
                // The receiver is held locally, so this cannot fail.
                let _ = sender.send(Ok(WatchResponse {
                    revision: *revision,
                    events: matching,
                }));
            }
        }

        state.next_watcher_id += 1;
        let id = state.next_watcher_id;
        state.watchers.push(Watcher {
            id,
            prefix: prefix.to_string(),
            sender,
        });
        trace!(watcher_id = id, prefix, ?start_revision, "memory store watch registered");

        Ok(Box::pin(UnboundedReceiverStream::new(receiver)))
    }
}
