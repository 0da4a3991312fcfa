//! Coordination store abstraction.
//!
//! The provider needs exactly two capabilities from the store: a prefix
//! range read that reports the revision it observed, and a prefix watch
//! that can resume from a given revision. Anything offering etcd-like
//! revisioned semantics can sit behind [`CoordinationStore`].
//!
//! A [`WatchStream`] that ends (returns `None`) means the subscription was
//! lost; the provider treats this exactly like an error item and
//! reconnects.

mod mem_store;

#[cfg(test)]
mod mem_store_test;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
pub use mem_store::*;
#[cfg(test)]
use mockall::automock;

use crate::StoreError;

/// Event type for watch notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventType {
    /// Key was inserted or updated
    Put,
    /// Key was deleted
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: Bytes,
    /// Empty for deletes
    pub value: Bytes,
    /// Revision of the last modification of this key
    pub mod_revision: i64,
}

impl KeyValue {
    pub fn new(
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
        mod_revision: i64,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            mod_revision,
        }
    }

    /// Keys are UTF-8 in practice; anything else is not ours.
    pub fn key_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.key).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub event_type: WatchEventType,
    pub kv: KeyValue,
}

/// One batch of events delivered by a watch subscription
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchResponse {
    /// Store revision at the time the batch was produced
    pub revision: i64,
    pub events: Vec<WatchEvent>,
}

/// Result of a prefix range read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeResponse {
    pub kvs: Vec<KeyValue>,
    /// Store revision the read was served at
    pub revision: i64,
}

pub type WatchStream = Pin<Box<dyn Stream<Item = Result<WatchResponse, StoreError>> + Send>>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CoordinationStore: Send + Sync + 'static {
    /// Reads every key under `prefix` at a single revision.
    async fn get_prefix(
        &self,
        prefix: &str,
    ) -> Result<RangeResponse, StoreError>;

    /// Subscribes to changes under `prefix`.
    ///
    /// With `start_revision` set, every change at or after that revision is
    /// delivered first. Fails with [`StoreError::Compacted`] if the store no
    /// longer has history that far back; a store may also report compaction
    /// as an item on the returned stream.
    async fn watch_prefix(
        &self,
        prefix: &str,
        start_revision: Option<i64>,
    ) -> Result<WatchStream, StoreError>;
}
