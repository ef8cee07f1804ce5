//! Per-variant artifact files under the cache directory.
//!
//! Each variant is stored at `<cache_dir>/<Family>/<DESCRIPTOR_HEX>.<ext>`
//! where the extension encodes the stage. A file starts with a 4-byte
//! little-endian header length, followed by a bincode [`ArtifactHeader`],
//! followed by the raw bytecode.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use kiln_common::{ContentHash, ShaderFamily, ShaderStage, VariantDescriptor};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::info::DiskCacheInfo;
use crate::tracker::ModificationTracker;

/// Magic bytes identifying a kiln artifact file.
const ARTIFACT_MAGIC: [u8; 4] = *b"KILN";

/// Current artifact format version. Increment on breaking changes to the
/// header or payload layout.
const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Header prepended to every persisted artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Must be `b"KILN"`.
    pub magic: [u8; 4],
    /// Artifact format version.
    pub format_version: u32,
    /// Cache key of the variant, checked on load.
    pub key: String,
    /// Digest of the payload.
    pub checksum: ContentHash,
}

/// The on-disk half of the cache.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Creates a disk cache rooted at `root`. Nothing is touched until the
    /// first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<Family>/<HEX>.<ext>`.
    pub fn artifact_path(
        &self,
        family: ShaderFamily,
        stage: ShaderStage,
        descriptor: VariantDescriptor,
    ) -> PathBuf {
        self.root
            .join(family.name())
            .join(format!("{descriptor}.{}", stage.disk_extension()))
    }

    /// Writes an artifact, creating the family directory on demand.
    ///
    /// The file's modification time is set to `compiled_at`, so a source
    /// edit made while the variant was compiling makes the file stale.
    pub fn save(
        &self,
        family: ShaderFamily,
        stage: ShaderStage,
        descriptor: VariantDescriptor,
        key: &str,
        bytecode: &[u8],
        compiled_at: SystemTime,
    ) -> Result<PathBuf, CacheError> {
        let path = self.artifact_path(family, stage, descriptor);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| CacheError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let header = ArtifactHeader {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
            key: key.to_string(),
            checksum: ContentHash::from_bytes(bytecode),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + bytecode.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(bytecode);

        let io_err = |e| CacheError::Io {
            path: path.clone(),
            source: e,
        };
        std::fs::write(&path, &output).map_err(io_err)?;
        std::fs::File::options()
            .write(true)
            .open(&path)
            .and_then(|f| f.set_modified(compiled_at))
            .map_err(io_err)?;
        log::debug!("wrote {} ({} bytes)", path.display(), bytecode.len());
        Ok(path)
    }

    /// Loads an artifact if the file exists, is intact, was written for
    /// `key`, and is not older than the family's last recorded modification.
    ///
    /// Every failure is a miss; corrupt files are logged.
    pub fn load(
        &self,
        family: ShaderFamily,
        stage: ShaderStage,
        descriptor: VariantDescriptor,
        key: &str,
        tracker: &ModificationTracker,
    ) -> Option<Vec<u8>> {
        let path = self.artifact_path(family, stage, descriptor);
        let written = self.written_at(family, stage, descriptor)?;
        if tracker.modified_since(family, written) {
            log::debug!("disk entry {} is older than its source", path.display());
            return None;
        }
        match read_artifact(&path, key) {
            Ok(bytecode) => Some(bytecode),
            Err(e) => {
                log::warn!("ignoring disk cache entry: {e}");
                None
            }
        }
    }

    /// Modification time of a stored artifact, if present.
    pub fn written_at(
        &self,
        family: ShaderFamily,
        stage: ShaderStage,
        descriptor: VariantDescriptor,
    ) -> Option<SystemTime> {
        let path = self.artifact_path(family, stage, descriptor);
        std::fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    /// Removes one artifact file. A missing file is not an error.
    pub fn remove(
        &self,
        family: ShaderFamily,
        stage: ShaderStage,
        descriptor: VariantDescriptor,
    ) -> Result<(), CacheError> {
        let path = self.artifact_path(family, stage, descriptor);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }

    /// Removes the whole cache directory. A missing directory is not an error.
    pub fn delete_all(&self) -> Result<(), CacheError> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {
                log::info!("deleted disk cache at {}", self.root.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io {
                path: self.root.clone(),
                source: e,
            }),
        }
    }

    /// Compares the stored `info.json` with `expected` and deletes the cache
    /// directory when it is missing, unreadable or different.
    ///
    /// Returns `true` if the existing cache was kept.
    pub fn validate(&self, expected: &DiskCacheInfo) -> Result<bool, CacheError> {
        let stored = match DiskCacheInfo::load(&self.root) {
            Ok(info) => info,
            Err(e) => {
                log::debug!("no usable disk cache info: {e}");
                None
            }
        };
        match stored {
            Some(info) if info.is_compatible(expected) => Ok(true),
            Some(info) => {
                log::info!(
                    "disk cache version {} does not match {}, deleting",
                    info.cache_version,
                    expected.cache_version
                );
                self.delete_all()?;
                Ok(false)
            }
            None => {
                self.delete_all()?;
                Ok(false)
            }
        }
    }

    /// Writes `info.json` into the cache directory.
    pub fn write_info(&self, info: &DiskCacheInfo) -> Result<(), CacheError> {
        info.save(&self.root)
    }
}

/// Reads and validates one artifact file.
pub fn read_artifact(path: &Path, expected_key: &str) -> Result<Vec<u8>, CacheError> {
    let raw = std::fs::read(path).map_err(|e| CacheError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let invalid = |reason: &str| CacheError::InvalidHeader {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if raw.len() < 4 {
        return Err(invalid("truncated header length"));
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&raw[..4]);
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    if raw.len() < 4 + header_len {
        return Err(invalid("truncated header"));
    }

    let (header, _): (ArtifactHeader, usize) =
        bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

    if header.magic != ARTIFACT_MAGIC {
        return Err(invalid("bad magic"));
    }
    if header.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(CacheError::VersionMismatch {
            path: path.to_path_buf(),
            expected: ARTIFACT_FORMAT_VERSION,
            actual: header.format_version,
        });
    }
    if header.key != expected_key {
        return Err(invalid("written for a different define set"));
    }

    let payload = &raw[4 + header_len..];
    let actual = ContentHash::from_bytes(payload);
    if actual != header.checksum {
        return Err(CacheError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: header.checksum.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(payload.to_vec())
}
