//! Disk cache errors.

use std::path::PathBuf;

/// Failures of the on-disk side of the cache.
///
/// Lookups never surface these: a disk error is logged and treated as a
/// miss. They are returned from explicit operations such as saving an
/// artifact or deleting the cache directory.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Reading, writing or removing a cache file failed.
    #[error("cache I/O error at {}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// `info.json` is present but unreadable as cache metadata.
    #[error("unreadable disk cache info: {reason}")]
    InfoParse {
        /// What the JSON parser reported.
        reason: String,
    },

    /// An artifact file is truncated or lacks the `KILN` preamble.
    #[error("bad artifact header in {}: {reason}", path.display())]
    InvalidHeader {
        /// Artifact file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// The bytecode does not hash to the value recorded when it was saved.
    #[error("bytecode checksum mismatch in {}: stored {expected}, computed {actual}", path.display())]
    ChecksumMismatch {
        /// Artifact file.
        path: PathBuf,
        /// Hash from the header.
        expected: String,
        /// Hash of the bytecode read back.
        actual: String,
    },

    /// The artifact was framed by a different build of the cache.
    #[error("artifact format {actual} in {} (this build reads {expected})", path.display())]
    VersionMismatch {
        /// Artifact file.
        path: PathBuf,
        /// Format this build writes.
        expected: u32,
        /// Format found in the file.
        actual: u32,
    },

    /// Encoding a header or `info.json` failed.
    #[error("cannot encode cache metadata: {reason}")]
    Serialization {
        /// Encoder message.
        reason: String,
    },
}
