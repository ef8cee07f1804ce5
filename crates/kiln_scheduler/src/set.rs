//! The deduplicating compilation queue.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use kiln_common::ShaderFamily;
use parking_lot::{Condvar, Mutex};

use crate::stats::CompilationStats;
use crate::task::CompilationTask;
use crate::token::CancellationToken;

/// How a dispatched task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// An artifact was published.
    Succeeded,
    /// A failure was published.
    Failed,
}

#[derive(Debug, Default)]
struct SetState {
    available: VecDeque<CompilationTask>,
    in_progress: HashSet<CompilationTask>,
    processed: HashSet<CompilationTask>,
    total: u64,
    completed: u64,
    failed: u64,
    cache_hits: u64,
    elapsed: Duration,
    /// Last point the elapsed clock was advanced; `None` while idle.
    clock: Option<Instant>,
    background: bool,
}

impl SetState {
    fn contains(&self, task: &CompilationTask) -> bool {
        self.in_progress.contains(task)
            || self.processed.contains(task)
            || self.available.contains(task)
    }

    fn is_compiling(&self) -> bool {
        self.total > 0 && self.completed + self.failed < self.total
    }

    fn advance_clock(&mut self) {
        if let Some(last) = self.clock {
            let now = Instant::now();
            self.elapsed += now - last;
            self.clock = Some(now);
        }
    }
}

/// A FIFO of pending compiles partitioned into available, in-progress and
/// processed tasks.
///
/// A task appears in at most one partition, so each variant is dispatched at
/// most once until it is forgotten or the set is cleared. [`wait_take`]
/// hands out tasks while fewer than the active budget are in flight.
///
/// [`wait_take`]: CompilationSet::wait_take
pub struct CompilationSet {
    state: Mutex<SetState>,
    cond: Condvar,
    foreground_threads: usize,
    background_threads: usize,
}

impl CompilationSet {
    /// Creates an empty set with the two concurrency budgets.
    pub fn new(foreground_threads: usize, background_threads: usize) -> Self {
        Self {
            state: Mutex::new(SetState::default()),
            cond: Condvar::new(),
            foreground_threads: foreground_threads.max(1),
            background_threads: background_threads.max(1),
        }
    }

    /// Enqueues a task unless it is already resolved or known to the set.
    ///
    /// `is_resolved` runs before the set lock is taken so the caller may
    /// consult the artifact store without nesting locks. Returns `true` if
    /// the task was inserted.
    pub fn add(&self, task: CompilationTask, is_resolved: impl FnOnce() -> bool) -> bool {
        if is_resolved() {
            return false;
        }
        let mut state = self.state.lock();
        if state.contains(&task) {
            return false;
        }
        log::debug!("queued {}:{}:{}", task.source_id(), task.stage, task.descriptor);
        state.available.push_back(task);
        state.total += 1;
        drop(state);
        self.cond.notify_one();
        true
    }

    /// Blocks until a task may start or `token` is cancelled.
    ///
    /// Starts the elapsed clock when work resumes after an idle period.
    pub fn wait_take(&self, token: &CancellationToken) -> Option<CompilationTask> {
        let mut state = self.state.lock();
        loop {
            if token.is_cancelled() {
                return None;
            }
            let budget = self.budget_for(state.background);
            if !state.available.is_empty() && state.in_progress.len() < budget {
                if state.clock.is_none() {
                    state.clock = Some(Instant::now());
                }
                let task = state.available.pop_front()?;
                state.in_progress.insert(task.clone());
                return Some(task);
            }
            self.cond.wait(&mut state);
        }
    }

    /// Moves a dispatched task to processed and updates the counters.
    ///
    /// Completions for tasks dropped by [`clear`](Self::clear) are ignored.
    pub fn complete(&self, task: &CompilationTask, outcome: TaskOutcome) {
        let mut state = self.state.lock();
        if !state.in_progress.remove(task) {
            log::debug!("ignoring completion of untracked task {}", task.key);
            return;
        }
        match outcome {
            TaskOutcome::Succeeded => {
                log::debug!("compiling task succeeded: {}", task.key);
                state.completed += 1;
            }
            TaskOutcome::Failed => {
                log::debug!("compiling task failed: {}", task.key);
                state.failed += 1;
            }
        }
        state.advance_clock();
        state.processed.insert(task.clone());
        if state.in_progress.is_empty() && state.available.is_empty() {
            state.clock = None;
        }
        drop(state);
        self.cond.notify_one();
    }

    /// Drops a task from the available and processed partitions so it can be
    /// enqueued again. In-progress tasks are left alone.
    pub fn forget(&self, task: &CompilationTask) {
        let mut state = self.state.lock();
        state.processed.remove(task);
        let before = state.available.len();
        state.available.retain(|t| t != task);
        let dropped = (before - state.available.len()) as u64;
        state.total -= dropped;
    }

    /// [`forget`](Self::forget) for every task of a family.
    pub fn forget_family(&self, family: ShaderFamily) {
        let mut state = self.state.lock();
        state.processed.retain(|t| t.family != family);
        let before = state.available.len();
        state.available.retain(|t| t.family != family);
        let dropped = (before - state.available.len()) as u64;
        state.total -= dropped;
    }

    /// Drops all partitions and resets every counter and the clock.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let background = state.background;
        *state = SetState {
            background,
            ..SetState::default()
        };
    }

    /// Counts a request satisfied without compiling.
    pub fn record_cache_hit(&self) {
        self.state.lock().cache_hits += 1;
    }

    /// A consistent snapshot of the counters.
    pub fn stats(&self) -> CompilationStats {
        let mut state = self.state.lock();
        state.advance_clock();
        let eta = CompilationStats::estimate_eta(state.completed, state.total, state.failed, state.elapsed);
        CompilationStats {
            completed: state.completed,
            failed: state.failed,
            total: state.total,
            cache_hits: state.cache_hits,
            elapsed: state.elapsed,
            eta,
        }
    }

    /// `total > 0 && completed + failed < total`.
    pub fn is_compiling(&self) -> bool {
        self.state.lock().is_compiling()
    }

    /// Switches between the foreground and background budgets.
    pub fn set_background(&self, background: bool) {
        self.state.lock().background = background;
        self.cond.notify_all();
    }

    /// Whether the background budget is active.
    pub fn is_background(&self) -> bool {
        self.state.lock().background
    }

    /// The active concurrency budget.
    pub fn budget(&self) -> usize {
        self.budget_for(self.state.lock().background)
    }

    fn budget_for(&self, background: bool) -> usize {
        if background {
            self.background_threads
        } else {
            self.foreground_threads
        }
    }

    /// Number of tasks waiting to be taken.
    pub fn queued(&self) -> usize {
        self.state.lock().available.len()
    }

    /// Number of tasks currently dispatched.
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_progress.len()
    }

    /// Wakes every waiter so it can observe a cancelled token.
    pub fn wake_all(&self) {
        let _state = self.state.lock();
        self.cond.notify_all();
    }
}
