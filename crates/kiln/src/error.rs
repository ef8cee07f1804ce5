//! Error types for the cache facade.

use std::path::PathBuf;

use kiln_cache::CacheError;
use kiln_common::{ShaderFamily, ShaderStage};
use kiln_scheduler::SchedulerError;
use kiln_watch::WatchError;

/// Why a variant could not be produced, or the cache could not start.
///
/// Renderer-facing lookups swallow these and return `None`; they surface
/// from explicit operations and are logged otherwise.
#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    /// The family's source file does not exist.
    #[error("shader source not found: {}", path.display())]
    SourceMissing {
        /// The expected source path.
        path: PathBuf,
    },

    /// The compiler rejected the variant.
    #[error("failed to compile {key}: {message}")]
    CompileFailure {
        /// Descriptor-inclusive key of the variant.
        key: String,
        /// Compiler output.
        message: String,
    },

    /// Reading or writing the disk cache failed.
    #[error("disk cache error: {0}")]
    DiskIo(#[from] CacheError),

    /// The cache does not serve this family or stage.
    #[error("{stage} {family} shaders are not served")]
    Disabled {
        /// Requested family.
        family: ShaderFamily,
        /// Requested stage.
        stage: ShaderStage,
    },

    /// The variant is blocked for debugging.
    #[error("variant {key} is blocked")]
    Blocked {
        /// The blocked key.
        key: String,
    },

    /// The compile workers could not be started.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// The source watcher could not be started.
    #[error(transparent)]
    Watch(#[from] WatchError),
}
