//! Single-level transactions on top of [`History`].
//!
//! ```text
//! begin     take_snapshot()          remember (pos, max_depth), lift the bound
//! rollback  restore_from_snapshot()  undo back to pos, drop what came after
//! commit    release_snapshot()       keep everything, restore the bound
//! ```
//!
//! At most one snapshot is open at a time.

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;

use crate::history::{History, HistoryConfig, SerializedHistory};
use crate::observer::Tracked;

/// Depth bound while a snapshot is open, so the transaction cannot evict
/// its own baseline.
pub const SNAPSHOT_MAX_DEPTH: usize = 1000;

/// Description of the commit that captures pending records on rollback.
pub const SNAPSHOT_DESCRIPTION: &str = "snapshot";

/// Saved pointer and depth bound of an open snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMark {
    pub pos: i64,
    pub max: usize,
}

/// A [`History`] with transaction support. Dereferences to the history.
#[derive(Debug)]
pub struct SnapshotHistory {
    history: History,
    snapshot: Option<SnapshotMark>,
}

impl SnapshotHistory {
    pub fn new(root: Tracked, config: HistoryConfig) -> Self {
        Self {
            history: History::new(root, config),
            snapshot: None,
        }
    }

    pub fn snapshot(&self) -> Option<SnapshotMark> {
        self.snapshot
    }

    /// Opens a snapshot. `false` if one is already open.
    pub fn take_snapshot(&mut self) -> bool {
        if self.snapshot.is_some() {
            return false;
        }
        let mark = SnapshotMark {
            pos: self.history.pos(),
            max: self.history.max_depth(),
        };
        self.history.set_max_depth(SNAPSHOT_MAX_DEPTH);
        self.snapshot = Some(mark);
        debug!(pos = mark.pos, max = mark.max, "snapshot taken");
        true
    }

    /// Closes the snapshot keeping every commit made since, then evicts the
    /// oldest commits that no longer fit the restored bound. `false` if no
    /// snapshot is open.
    pub fn release_snapshot(&mut self) -> bool {
        let Some(mark) = self.snapshot.take() else {
            return false;
        };
        self.history.set_max_depth(mark.max);
        let evicted = self.history.evict_over_bound();
        debug!(evicted, "snapshot released");
        true
    }

    /// Rolls back to the snapshot.
    ///
    /// Pending records are committed first, then commits are undone until
    /// the pointer is back where it was and everything above it is dropped.
    /// Returns `None` if no snapshot is open, otherwise whether anything
    /// was undone.
    pub fn restore_from_snapshot(&mut self) -> Option<bool> {
        let mark = self.snapshot.take()?;
        self.history.commit(SNAPSHOT_DESCRIPTION, Json::Bool(true));
        let restored = mark.pos < self.history.pos();
        while mark.pos < self.history.pos() {
            if self.history.undo().is_none() {
                break;
            }
        }
        self.history.set_max_depth(mark.max);
        self.history.truncate_above_pos();
        debug!(pos = self.history.pos(), restored, "snapshot restored");
        Some(restored)
    }

    /// Like [`History::set`], also restoring an open snapshot mark.
    pub fn set(&mut self, serialized: SerializedHistory) {
        self.snapshot = serialized.snapshot;
        if let Some(mark) = self.snapshot {
            self.history.set_max_depth(SNAPSHOT_MAX_DEPTH);
            debug!(pos = mark.pos, max = mark.max, "snapshot mark restored");
        }
        self.history.set(serialized);
    }

    pub fn serialize(&self) -> SerializedHistory {
        SerializedHistory {
            snapshot: self.snapshot,
            ..self.history.serialize()
        }
    }

    pub fn into_inner(self) -> History {
        self.history
    }
}

impl Deref for SnapshotHistory {
    type Target = History;

    fn deref(&self) -> &History {
        &self.history
    }
}

impl DerefMut for SnapshotHistory {
    fn deref_mut(&mut self) -> &mut History {
        &mut self.history
    }
}
