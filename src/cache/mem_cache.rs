use parking_lot::Mutex;

use super::FallbackCache;
use crate::CacheError;
use crate::TenantSnapshot;

/// Keeps the last saved snapshot in memory.
///
/// Behaves like [`super::FileCache`] minus the disk: loads return a copy
/// marked as fallback data with indices rebuilt.
#[derive(Debug, Default)]
pub struct MemoryCache {
    saved: Mutex<Option<TenantSnapshot>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated cache, as if `snapshot` had been saved by an earlier run.
    pub fn with_snapshot(snapshot: TenantSnapshot) -> Self {
        Self {
            saved: Mutex::new(Some(snapshot)),
        }
    }

    pub fn clear(&self) {
        *self.saved.lock() = None;
    }

    /// Revision of the saved snapshot, if any
    pub fn saved_revision(&self) -> Option<i64> {
        self.saved.lock().as_ref().map(TenantSnapshot::revision)
    }
}

impl FallbackCache for MemoryCache {
    fn load(&self) -> Result<TenantSnapshot, CacheError> {
        let saved = self.saved.lock().clone().ok_or(CacheError::Empty)?;
        Ok(saved.into_fallback())
    }

    fn save(
        &self,
        snapshot: &TenantSnapshot,
    ) -> Result<(), CacheError> {
        *self.saved.lock() = Some(snapshot.clone());
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.saved.lock().is_some()
    }
}
