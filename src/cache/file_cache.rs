use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use parking_lot::RwLock;
use tracing::debug;

use super::FallbackCache;
use crate::constants::CACHE_FILE_NAME;
use crate::constants::CACHE_PATH_ENV;
use crate::constants::DEFAULT_CACHE_DIR;
use crate::CacheError;
use crate::TenantSnapshot;

/// Pretty-printed JSON file, replaced atomically on every save
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    /// `$TENANT_CACHE_PATH/tenant_metadata.json`, or
    /// `./cache/tenant_metadata.json` when the variable is unset or empty.
    pub fn from_env() -> Self {
        Self::new(default_cache_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the cache file. Clearing a missing file is not an error.
    pub fn clear(&self) -> Result<(), CacheError> {
        let _guard = self.lock.write();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(
        &self,
        source: io::Error,
    ) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

pub fn default_cache_path() -> PathBuf {
    let dir = std::env::var(CACHE_PATH_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string());
    Path::new(&dir).join(CACHE_FILE_NAME)
}

impl FallbackCache for FileCache {
    fn load(&self) -> Result<TenantSnapshot, CacheError> {
        let _guard = self.lock.read();
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(CacheError::Empty),
            Err(e) => return Err(self.io_error(e)),
        };
        let snapshot: TenantSnapshot = serde_json::from_slice(&bytes)?;
        debug!(path = %self.path.display(), tenants = snapshot.tenant_count(), "loaded fallback cache");
        Ok(snapshot.into_fallback())
    }

    fn save(
        &self,
        snapshot: &TenantSnapshot,
    ) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;

        let _guard = self.lock.write();
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }

        let tmp = self.temp_path();
        fs::write(&tmp, &bytes).map_err(|e| self.io_error(e))?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(self.io_error(e));
        }
        debug!(path = %self.path.display(), revision = snapshot.revision(), "saved fallback cache");
        Ok(())
    }

    fn is_available(&self) -> bool {
        let _guard = self.lock.read();
        self.path.is_file()
    }
}
