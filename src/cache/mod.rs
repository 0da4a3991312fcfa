//! Durable fallback for the tenant snapshot.
//!
//! The provider saves every published store snapshot here and restores the
//! last one when the coordination store cannot be reached at startup.
//! Derived indices are never persisted; they are rebuilt on load.

mod file_cache;
mod mem_cache;


pub use file_cache::*;
pub use mem_cache::*;
#[cfg(test)]
use mockall::automock;

use crate::CacheError;
use crate::TenantSnapshot;

#[cfg_attr(test, automock)]
pub trait FallbackCache: Send + Sync + 'static {
    /// Returns the last saved snapshot with origin `Fallback` and indices
    /// rebuilt, or [`CacheError::Empty`] if nothing was saved yet.
    fn load(&self) -> Result<TenantSnapshot, CacheError>;

    fn save(
        &self,
        snapshot: &TenantSnapshot,
    ) -> Result<(), CacheError>;

    fn is_available(&self) -> bool;
}
