//! Error types for the source watcher.

/// Errors raised while starting the watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The platform watcher could not be created or attached.
    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The listener thread could not be spawned.
    #[error("failed to spawn listener thread: {0}")]
    Spawn(#[from] std::io::Error),
}
