//! Source file watching and cache invalidation.
//!
//! File-system notifications arrive on arbitrary threads and are pushed into
//! a single-consumer inbox. A polling [`InvalidationListener`] batches them
//! and, once a batch stops growing, translates it into per-family or global
//! invalidations on an [`InvalidationTarget`].

#![warn(missing_docs)]

pub mod change;
pub mod error;
pub mod listener;
pub mod target;
pub mod watcher;

pub use change::{ChangeKind, FileChange};
pub use error::WatchError;
pub use listener::{classify, Classification, FlushReport, InvalidationListener, ListenerState};
pub use target::InvalidationTarget;
pub use watcher::SourceWatcher;
