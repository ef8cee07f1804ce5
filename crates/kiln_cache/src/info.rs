//! `info.json`: what the disk cache was built with.
//!
//! Artifacts on disk are only reusable when they were produced by a
//! compatible cache format and the same global environment (developer mode,
//! VR, extra and feature defines). The file is checked at startup and
//! rewritten at shutdown.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Name of the metadata file within the cache directory.
pub const INFO_FILE: &str = "info.json";

/// Version string written by this build.
pub const CACHE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Disk cache metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskCacheInfo {
    /// Cache format version that produced the directory.
    pub cache_version: String,
    /// Environment values the artifacts were compiled under.
    #[serde(default)]
    pub fingerprint: BTreeMap<String, String>,
}

impl DiskCacheInfo {
    /// Creates metadata with an explicit version.
    pub fn new(cache_version: &str, fingerprint: BTreeMap<String, String>) -> Self {
        Self {
            cache_version: cache_version.to_string(),
            fingerprint,
        }
    }

    /// Metadata for this build.
    pub fn current(fingerprint: BTreeMap<String, String>) -> Self {
        Self::new(CACHE_VERSION, fingerprint)
    }

    /// Reads `info.json` from `cache_dir`. A missing file is `Ok(None)`.
    pub fn load(cache_dir: &Path) -> Result<Option<Self>, CacheError> {
        let path = cache_dir.join(INFO_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io { path, source: e }),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CacheError::InfoParse {
                reason: e.to_string(),
            })
    }

    /// Writes `info.json`, creating the cache directory if needed.
    pub fn save(&self, cache_dir: &Path) -> Result<(), CacheError> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::Io {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;
        let path = cache_dir.join(INFO_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::Io { path, source: e })
    }

    /// Returns `true` if artifacts written under `self` may be used by `current`.
    pub fn is_compatible(&self, current: &DiskCacheInfo) -> bool {
        self.cache_version == current.cache_version && self.fingerprint == current.fingerprint
    }
}
