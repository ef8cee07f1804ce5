//! File change events.

use std::path::PathBuf;

use notify::event::ModifyKind;
use notify::EventKind;

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The file was created.
    Added,
    /// The file contents or metadata changed.
    Modified,
    /// The file was removed.
    Deleted,
    /// The file was renamed.
    Moved,
}

/// One observed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Affected path.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: ChangeKind,
}

impl FileChange {
    /// Creates a change record.
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Converts a notify event into one change per path. Access and other
    /// events produce nothing.
    pub fn from_event(event: notify::Event) -> Vec<FileChange> {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Added,
            EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Moved,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Deleted,
            _ => return Vec::new(),
        };
        event
            .paths
            .into_iter()
            .map(|path| FileChange { path, kind })
            .collect()
    }
}
