//! SpaceAPI health cache storage adapter.
//!
//! Implements [`spaceapi::HealthStore`] as a single JSON file. The file maps
//! each candidate website to `{"stamp": <epoch seconds>, "valid": <bool>}`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** File locations, atomic replacement and tolerance of
//! damaged files live here; the domain crate sees only
//! [`spaceapi::HealthCache`].
//!
//! ## Durability
//!
//! A save writes a sibling temporary file and renames it over the cache, so
//! an interrupted save leaves the previous cache intact. Loading never fails:
//! a missing file is an empty cache, and an unreadable or corrupt file is an
//! empty cache plus a warning.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use spaceapi::{HealthCache, HealthStore, StoreError};
use tracing::{debug, instrument, warn};

/// Cache file name inside the user cache directory.
pub const CACHE_FILE_NAME: &str = "spaceapi-directory";

/// [`HealthStore`] backed by a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileHealthStore {
    path: PathBuf,
}

impl JsonFileHealthStore {
    /// Creates a store at `path`. Nothing is touched until the first load or save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at [`default_path`](Self::default_path).
    pub fn at_default_path() -> Self {
        Self::new(Self::default_path())
    }

    /// The platform cache directory entry, falling back to `~/.cache` and
    /// finally to the working directory.
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
            .unwrap_or_default()
            .join(CACHE_FILE_NAME)
    }

    /// Location of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| CACHE_FILE_NAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl HealthStore for JsonFileHealthStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> HealthCache {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No health cache on disk");
                return HealthCache::new();
            }
            Err(err) => {
                warn!(error = %err, "Could not read health cache; starting empty");
                return HealthCache::new();
            }
        };

        match serde_json::from_slice::<HealthCache>(&bytes) {
            Ok(cache) => {
                debug!(entries = cache.len(), "Health cache loaded");
                cache
            }
            Err(err) => {
                warn!(error = %err, "Health cache is corrupt; starting empty");
                HealthCache::new()
            }
        }
    }

    #[instrument(skip(self, cache), fields(path = %self.path.display(), entries = cache.len()))]
    async fn save(&self, cache: &HealthCache) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec(cache)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(parent, e))?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &encoded)
            .await
            .map_err(|e| self.io_error(&temp, e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.io_error(&self.path, e))?;

        debug!("Health cache saved");
        Ok(())
    }
}
