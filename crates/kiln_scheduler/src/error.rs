//! Error types for starting the worker pool.

/// Errors raised while starting [`CompilationWorkers`](crate::CompilationWorkers).
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The rayon pool could not be created.
    #[error("failed to build compile pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),

    /// The scheduler thread could not be spawned.
    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),
}
