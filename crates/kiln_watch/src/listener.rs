//! Batching and classification of file changes.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use kiln_common::ShaderFamily;

use crate::change::{ChangeKind, FileChange};
use crate::target::InvalidationTarget;

/// Where the listener is in its collect/flush cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Nothing pending.
    Idle,
    /// Changes arrived since the previous tick; waiting for the batch to settle.
    Collecting,
    /// Applying a settled batch.
    Flushing,
}

/// The effect of one change on the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A family source file changed.
    Family(ShaderFamily, SystemTime),
    /// A shared shader file changed.
    Global,
    /// Not a shader source, a directory, or no longer on disk.
    Ignored,
}

/// What a flush did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Families invalidated, in event order.
    pub families: Vec<ShaderFamily>,
    /// Whether a global invalidation ran.
    pub global: bool,
    /// Events that caused nothing.
    pub ignored: usize,
}

/// Consumes the change inbox and applies invalidations.
///
/// Driven by [`tick`](Self::tick) at a fixed interval: a non-empty batch is
/// flushed only on a tick where it did not grow since the previous one, so
/// a burst of saves turns into a single invalidation pass.
pub struct InvalidationListener {
    shader_dir: PathBuf,
    inbox: flume::Receiver<FileChange>,
    pending: Vec<FileChange>,
    last_len: usize,
    state: ListenerState,
}

impl InvalidationListener {
    /// Creates a listener for sources rooted at `shader_dir`.
    pub fn new(shader_dir: impl Into<PathBuf>, inbox: flume::Receiver<FileChange>) -> Self {
        Self {
            shader_dir: shader_dir.into(),
            inbox,
            pending: Vec::new(),
            last_len: 0,
            state: ListenerState::Idle,
        }
    }

    /// The current state.
    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Number of changes waiting in the batch.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Drains the inbox and flushes the batch if it settled.
    ///
    /// Returns the flush report when a flush happened.
    pub fn tick(&mut self, target: &dyn InvalidationTarget) -> Option<FlushReport> {
        for change in self.inbox.try_iter() {
            if self.pending.last() != Some(&change) {
                self.pending.push(change);
            }
        }

        if self.pending.is_empty() {
            self.state = ListenerState::Idle;
            return None;
        }
        if self.pending.len() != self.last_len {
            self.last_len = self.pending.len();
            self.state = ListenerState::Collecting;
            return None;
        }

        self.state = ListenerState::Flushing;
        let batch = std::mem::take(&mut self.pending);
        let report = self.flush(&batch, target);
        self.last_len = 0;
        self.state = ListenerState::Idle;
        Some(report)
    }

    fn flush(&self, batch: &[FileChange], target: &dyn InvalidationTarget) -> FlushReport {
        let mut report = FlushReport::default();
        for change in batch {
            match change.kind {
                ChangeKind::Added | ChangeKind::Modified => {}
                ChangeKind::Deleted | ChangeKind::Moved => {
                    log::info!("{:?}: {}", change.kind, change.path.display());
                    report.ignored += 1;
                    continue;
                }
            }
            match classify(&self.shader_dir, &change.path) {
                Classification::Family(family, modified) => {
                    log::info!("{} changed, invalidating {family}", change.path.display());
                    target.invalidate_family(family, modified);
                    report.families.push(family);
                }
                Classification::Global => report.global = true,
                Classification::Ignored => report.ignored += 1,
            }
        }
        if report.global {
            log::info!("shared shader source changed, clearing the whole cache");
            target.invalidate_all();
        }
        report
    }
}

/// Decides what a change to `path` invalidates.
///
/// Only existing `.hlsl*` files count. A file directly in `shader_dir` whose
/// stem names a family invalidates that family; any other shader file may be
/// included from anywhere and invalidates everything.
pub fn classify(shader_dir: &Path, path: &Path) -> Classification {
    let Ok(meta) = std::fs::metadata(path) else {
        return Classification::Ignored;
    };
    if meta.is_dir() || !has_shader_extension(path) {
        return Classification::Ignored;
    }
    let modified = meta.modified().unwrap_or_else(|_| SystemTime::now());

    let family = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.parse::<ShaderFamily>().ok());
    match family {
        Some(family) if path.parent().is_some_and(|p| same_dir(p, shader_dir)) => {
            Classification::Family(family, modified)
        }
        _ => Classification::Global,
    }
}

fn has_shader_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.to_ascii_lowercase().starts_with("hlsl"))
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
