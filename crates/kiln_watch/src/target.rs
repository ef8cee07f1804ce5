//! The seam between the listener and the cache.

use std::time::SystemTime;

use kiln_common::ShaderFamily;

/// Receives invalidations decided by the listener.
pub trait InvalidationTarget: Send + Sync {
    /// A family's source file changed at `modified`: record the time and
    /// drop that family's in-memory entries.
    fn invalidate_family(&self, family: ShaderFamily, modified: SystemTime);

    /// A shared include changed: drop the disk cache and every entry.
    fn invalidate_all(&self);
}
