//! Compiled shader storage.
//!
//! Holds the in-memory artifact table shared by the render thread and the
//! compile workers, the per-variant disk cache with its `info.json` metadata,
//! and the modification tracker that decides when a stored artifact is stale.
//!
//! Disk operations are fail-safe: unreadable or corrupt files are cache
//! misses, never hard failures.

#![warn(missing_docs)]

pub mod disk;
pub mod error;
pub mod info;
pub mod store;
pub mod tracker;

pub use disk::DiskCache;
pub use error::CacheError;
pub use info::{DiskCacheInfo, CACHE_VERSION, INFO_FILE};
pub use store::{Artifact, ArtifactStore, CacheEntry, CompileStatus, CompileTicket, Lookup};
pub use tracker::ModificationTracker;
