//! Last observed source modification time per family.

use std::collections::HashMap;
use std::path::Path;
use std::time::SystemTime;

use kiln_common::ShaderFamily;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct TrackerState {
    enabled: bool,
    records: HashMap<ShaderFamily, SystemTime>,
}

/// Records when each family's source file last changed.
///
/// Artifacts compiled (or written to disk) before the recorded time are
/// stale. While disabled, no artifact is ever considered stale.
#[derive(Debug, Default)]
pub struct ModificationTracker {
    state: Mutex<TrackerState>,
}

impl ModificationTracker {
    /// Creates a tracker in the given enabled state.
    pub fn new(enabled: bool) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                enabled,
                records: HashMap::new(),
            }),
        }
    }

    /// Whether staleness checks are active.
    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Turns staleness checks on or off. Records are kept.
    pub fn set_enabled(&self, enabled: bool) {
        self.state.lock().enabled = enabled;
    }

    /// Records a modification time, replacing any previous one.
    pub fn record(&self, family: ShaderFamily, modified: SystemTime) {
        self.state.lock().records.insert(family, modified);
    }

    /// The recorded modification time for a family.
    pub fn last_modified(&self, family: ShaderFamily) -> Option<SystemTime> {
        self.state.lock().records.get(&family).copied()
    }

    /// Returns `true` if tracking is enabled and the family changed after `time`.
    pub fn modified_since(&self, family: ShaderFamily, time: SystemTime) -> bool {
        let state = self.state.lock();
        state.enabled
            && state
                .records
                .get(&family)
                .is_some_and(|recorded| *recorded > time)
    }

    /// Stats `source` and records its modification time if it is newer than
    /// the current record. Returns the new time when the record changed.
    pub fn refresh_from_source(&self, family: ShaderFamily, source: &Path) -> Option<SystemTime> {
        let modified = std::fs::metadata(source).and_then(|m| m.modified()).ok()?;
        let mut state = self.state.lock();
        match state.records.get(&family) {
            Some(recorded) if *recorded >= modified => None,
            _ => {
                state.records.insert(family, modified);
                Some(modified)
            }
        }
    }

    /// Drops every record.
    pub fn clear(&self) {
        self.state.lock().records.clear();
    }
}
