//! The scheduler thread and compile pool.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::SchedulerError;
use crate::set::{CompilationSet, TaskOutcome};
use crate::task::CompilationTask;
use crate::token::CancellationToken;

/// Performs the work of one task and reports how it ended.
///
/// Implemented by the cache facade: the runner compiles (or loads) the
/// variant and publishes the result before returning.
pub trait TaskRunner: Send + Sync {
    /// Runs one task to completion.
    fn run(&self, task: &CompilationTask) -> TaskOutcome;
}

/// One scheduler thread feeding a rayon pool from a [`CompilationSet`].
///
/// The scheduler blocks in [`CompilationSet::wait_take`]; every task it
/// receives is spawned onto the pool, run, and completed. The scheduler
/// thread exits only after its spawned tasks have returned. The pool is sized
/// to the larger of the two budgets so the set's budget is the only limit.
pub struct CompilationWorkers {
    set: Arc<CompilationSet>,
    token: CancellationToken,
    scheduler: Option<JoinHandle<()>>,
}

impl CompilationWorkers {
    /// Starts the pool and the scheduler thread.
    pub fn start(
        set: Arc<CompilationSet>,
        runner: Arc<dyn TaskRunner>,
        pool_threads: usize,
    ) -> Result<Self, SchedulerError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(pool_threads.max(1))
            .thread_name(|i| format!("kiln-compile-{i}"))
            .build()?;
        let token = CancellationToken::new();

        let scheduler = {
            let set = Arc::clone(&set);
            let token = token.clone();
            std::thread::Builder::new()
                .name("kiln-scheduler".to_string())
                .spawn(move || schedule(set, runner, pool, token))?
        };
        log::debug!("started compile workers ({} threads)", pool_threads.max(1));

        Ok(Self {
            set,
            token,
            scheduler: Some(scheduler),
        })
    }

    /// Whether the scheduler thread is still attached.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Cancels the scheduler and joins it. Returns after in-flight compiles
    /// have finished and published; queued tasks are not started. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.scheduler.take() else {
            return;
        };
        self.token.cancel();
        self.set.wake_all();
        if handle.join().is_err() {
            log::error!("compile scheduler thread panicked");
        }
        log::debug!("stopped compile workers");
    }
}

impl Drop for CompilationWorkers {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn schedule(
    set: Arc<CompilationSet>,
    runner: Arc<dyn TaskRunner>,
    pool: rayon::ThreadPool,
    token: CancellationToken,
) {
    // the scope returns only once every spawned compile has finished
    pool.in_place_scope(|scope| {
        while let Some(task) = set.wait_take(&token) {
            let set = Arc::clone(&set);
            let runner = Arc::clone(&runner);
            scope.spawn(move |_| {
                let outcome = catch_unwind(AssertUnwindSafe(|| runner.run(&task))).unwrap_or_else(|_| {
                    log::error!("compile task panicked: {}", task.key);
                    TaskOutcome::Failed
                });
                set.complete(&task, outcome);
            });
        }
    });
}
