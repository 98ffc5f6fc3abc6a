//! Linear undo/redo history over an observed graph.
//!
//! A [`History`] accumulates change records from an observer's change
//! callback into a pending buffer and groups them into [`Commit`]s on a
//! bounded stack with a position pointer:
//!
//! ```text
//! commit("a"), commit("b"), commit("c")
//!   stack: [a, b, c]   pos: 2
//!
//! undo() x2
//!   stack: [a, b, c]   pos: 0     redo available: "b"
//!
//! commit("d")   <-- pointer behind the top, redo branch discarded
//!   stack: [a, d]      pos: 1
//! ```
//!
//! # Invariants
//!
//! 1. `-1 <= pos < stack.len()`; `pos == -1` means nothing can be undone
//! 2. `stack.len() <= max_depth` after every commit
//! 3. Redo is refused while the pending buffer is not empty
//! 4. Recorded payloads never share nodes with the live graph

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use json_observer_path::has_prefix;
use json_observer_value::{Node, NodeId, Value};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, trace, warn};

use crate::change::ChangeRecord;
use crate::observer::{ChangeEvent, Tracked};
use crate::replay::{Direction, Reconstruct};
use crate::snapshot::SnapshotMark;

// ── Clock ─────────────────────────────────────────────────────────────────

/// Millisecond time source for the coalescing window.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall-clock time since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

// ── Configuration ─────────────────────────────────────────────────────────

/// Which change paths a history records.
#[derive(Clone, Default)]
pub enum HistoryFilter {
    #[default]
    All,
    /// Paths starting with any of these strings (plain textual prefix).
    Prefixes(Vec<String>),
    Predicate(Rc<dyn Fn(&str) -> bool>),
}

impl HistoryFilter {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        HistoryFilter::Prefixes(vec![prefix.into()])
    }

    pub fn predicate(f: impl Fn(&str) -> bool + 'static) -> Self {
        HistoryFilter::Predicate(Rc::new(f))
    }

    pub fn accepts(&self, path: &str) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::Prefixes(prefixes) => prefixes.iter().any(|p| has_prefix(path, p)),
            HistoryFilter::Predicate(f) => f(path),
        }
    }
}

impl fmt::Debug for HistoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryFilter::All => f.write_str("All"),
            HistoryFilter::Prefixes(prefixes) => f.debug_tuple("Prefixes").field(prefixes).finish(),
            HistoryFilter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Configuration for a [`History`].
#[derive(Clone)]
pub struct HistoryConfig {
    /// Maximum number of commits kept on the stack.
    pub max_depth: usize,
    /// Commits with the same description and meta closer together than
    /// this collapse into one.
    pub coalesce_window_ms: u64,
    pub filter: HistoryFilter,
    pub reconstruct: Option<Reconstruct>,
    pub clock: Rc<dyn Clock>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            coalesce_window_ms: 1000,
            filter: HistoryFilter::All,
            reconstruct: None,
            clock: Rc::new(SystemClock),
        }
    }
}

impl HistoryConfig {
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_coalesce_window_ms(mut self, ms: u64) -> Self {
        self.coalesce_window_ms = ms;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: HistoryFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_reconstruct(mut self, f: impl Fn(&Node, Value) -> Value + 'static) -> Self {
        self.reconstruct = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Rc::new(clock);
        self
    }
}

impl fmt::Debug for HistoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryConfig")
            .field("max_depth", &self.max_depth)
            .field("coalesce_window_ms", &self.coalesce_window_ms)
            .field("filter", &self.filter)
            .field("reconstruct", &self.reconstruct.is_some())
            .finish_non_exhaustive()
    }
}

// ── Persisted state ───────────────────────────────────────────────────────

fn default_meta() -> Json {
    Json::Bool(true)
}

fn default_pos() -> i64 {
    -1
}

/// One undo/redo unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub changes: Vec<ChangeRecord>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_meta")]
    pub meta: Json,
    /// Milliseconds, from the history's clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// Storage layout of a history: pending records, pointer and stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedHistory {
    #[serde(default)]
    pub changes: Vec<ChangeRecord>,
    #[serde(default = "default_pos")]
    pub pos: i64,
    #[serde(default)]
    pub stack: Vec<Commit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotMark>,
}

impl Default for SerializedHistory {
    fn default() -> Self {
        Self {
            changes: Vec::new(),
            pos: -1,
            stack: Vec::new(),
            snapshot: None,
        }
    }
}

/// Point-in-time view of a history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryStatus {
    pub changes: Vec<ChangeRecord>,
    pub stack: Vec<Commit>,
    pub pos: i64,
    /// Description of the commit `undo` would revert.
    pub undo: Option<String>,
    /// Description of the commit `redo` would apply.
    pub redo: Option<String>,
}

// ── History ───────────────────────────────────────────────────────────────

/// Undo/redo history bound to one observed root.
pub struct History {
    root: Tracked,
    config: HistoryConfig,
    changes: Vec<ChangeRecord>,
    stack: Vec<Commit>,
    pos: i64,
    recording: bool,
    last_commit: Option<u64>,
}

impl fmt::Debug for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("root", &self.root.id())
            .field("pending", &self.changes.len())
            .field("depth", &self.stack.len())
            .field("pos", &self.pos)
            .field("recording", &self.recording)
            .field("config", &self.config)
            .finish()
    }
}

impl History {
    /// Creates a history for `root`. It starts idle; call
    /// [`endure`](Self::endure) to start recording.
    pub fn new(root: Tracked, config: HistoryConfig) -> Self {
        Self {
            root,
            config,
            changes: Vec::new(),
            stack: Vec::new(),
            pos: -1,
            recording: false,
            last_commit: None,
        }
    }

    pub fn root(&self) -> &Tracked {
        &self.root
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn max_depth(&self) -> usize {
        self.config.max_depth
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.config.max_depth = max_depth;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Uncommitted records.
    pub fn pending(&self) -> &[ChangeRecord] {
        &self.changes
    }

    pub fn stack(&self) -> &[Commit] {
        &self.stack
    }

    pub fn pos(&self) -> i64 {
        self.pos
    }

    pub fn can_undo(&self) -> bool {
        self.pos >= 0
    }

    pub fn can_redo(&self) -> bool {
        self.changes.is_empty() && self.pos < self.stack.len() as i64 - 1
    }

    /// Feeds one change notification.
    ///
    /// Recorded only while recording, only for changes below this history's
    /// root, and only if the filter accepts the change's path.
    pub fn onchange(&mut self, root: NodeId, event: &ChangeEvent<'_>) {
        if !self.recording || root != self.root.id() {
            return;
        }
        let path = event.path();
        if !self.config.filter.accepts(&path) {
            trace!(path = %path, "change filtered out of history");
            return;
        }
        self.changes.push(ChangeRecord::new(path, event.change.deep_clone()));
    }

    /// Stops recording and drops pending records.
    pub fn pause(&mut self) {
        self.recording = false;
        self.reset_changes();
    }

    /// Starts recording from an empty pending buffer.
    pub fn endure(&mut self) {
        self.recording = true;
        self.reset_changes();
    }

    pub fn reset_changes(&mut self) {
        self.changes.clear();
    }

    pub fn reset_history(&mut self) {
        self.pos = -1;
        self.stack.clear();
    }

    /// Groups the pending records into a commit.
    ///
    /// Returns `None` if nothing is pending. A commit matching the top one
    /// by description and meta within the coalescing window replaces it: the
    /// top commit is dropped and only the new records are kept, so undoing
    /// the replacement lands on the state the dropped commit produced.
    pub fn commit(&mut self, description: &str, meta: Json) -> Option<&Commit> {
        if self.changes.is_empty() {
            return None;
        }
        let top = self.stack.len() as i64 - 1;
        if self.pos < top {
            let keep = (self.pos + 1) as usize;
            debug!(discarded = self.stack.len() - keep, "redo branch discarded");
            self.stack.truncate(keep);
        }

        let now = self.config.clock.now_ms();
        let changes = std::mem::take(&mut self.changes);
        let repeats_top = self
            .stack
            .last()
            .is_some_and(|top| top.description == description && top.meta == meta);
        let within_window = self
            .last_commit
            .is_some_and(|at| now.saturating_sub(at) < self.config.coalesce_window_ms);
        if repeats_top && within_window {
            if let Some(dropped) = self.stack.pop() {
                debug!(description, dropped = dropped.changes.len(), "commit coalesced");
            }
        }

        self.stack.push(Commit {
            changes,
            description: description.to_string(),
            meta,
            timestamp: Some(now),
        });
        self.last_commit = Some(now);
        self.evict_over_bound();
        self.pos = self.stack.len() as i64 - 1;
        debug!(description, depth = self.stack.len(), "committed");
        self.stack.last()
    }

    /// Drops the oldest commits until the stack fits `max_depth`, moving the
    /// pointer down with them. Returns how many were dropped.
    pub(crate) fn evict_over_bound(&mut self) -> usize {
        let excess = self.stack.len().saturating_sub(self.config.max_depth);
        if excess > 0 {
            self.stack.drain(..excess);
            self.pos = (self.pos - excess as i64).max(-1);
            debug!(evicted = excess, max_depth = self.config.max_depth, "oldest commits evicted");
        }
        excess
    }

    /// Drops every commit above the pointer.
    pub(crate) fn truncate_above_pos(&mut self) {
        self.stack.truncate((self.pos + 1) as usize);
    }

    fn play(&mut self, direction: Direction, index: usize) {
        self.changes.clear();
        let commit = &self.stack[index];
        debug!(%direction, description = %commit.description, records = commit.changes.len(), "replaying commit");
        let observer = self.root.observer();
        if let Err(err) = observer.replay(direction, &commit.changes, self.config.reconstruct.as_ref()) {
            warn!(%direction, error = %err, "commit replay incomplete");
        }
    }

    /// Reverts the commit at the pointer. `None` if nothing can be undone.
    pub fn undo(&mut self) -> Option<&Commit> {
        if self.pos < 0 {
            return None;
        }
        let index = self.pos as usize;
        self.pos -= 1;
        self.play(Direction::Undo, index);
        self.stack.get(index)
    }

    /// Re-applies the commit after the pointer.
    ///
    /// `None` at the top of the stack and whenever records are pending:
    /// those must be committed or discarded first.
    pub fn redo(&mut self) -> Option<&Commit> {
        if !self.changes.is_empty() {
            trace!(pending = self.changes.len(), "redo refused with pending changes");
            return None;
        }
        if self.pos >= self.stack.len() as i64 - 1 {
            return None;
        }
        self.pos += 1;
        let index = self.pos as usize;
        self.play(Direction::Redo, index);
        self.stack.get(index)
    }

    pub fn status(&self) -> HistoryStatus {
        let undo = usize::try_from(self.pos)
            .ok()
            .and_then(|i| self.stack.get(i))
            .map(|c| c.description.clone());
        let redo = if self.can_redo() {
            self.stack.get((self.pos + 1) as usize).map(|c| c.description.clone())
        } else {
            None
        };
        HistoryStatus {
            changes: self.changes.clone(),
            stack: self.stack.clone(),
            pos: self.pos,
            undo,
            redo,
        }
    }

    /// Replaces pending records, pointer and stack. A pointer outside the
    /// stack is clamped into it. Any snapshot mark is ignored here.
    pub fn set(&mut self, serialized: SerializedHistory) {
        let SerializedHistory {
            changes, pos, stack, ..
        } = serialized;
        self.pos = pos.clamp(-1, stack.len() as i64 - 1);
        self.changes = changes;
        self.stack = stack;
        self.last_commit = None;
    }

    pub fn serialize(&self) -> SerializedHistory {
        SerializedHistory {
            changes: self.changes.clone(),
            pos: self.pos,
            stack: self.stack.clone(),
            snapshot: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{Observer, ObserverOptions};
    use serde_json::json;
    use std::cell::RefCell;

    /// History manually fed from the observer through a shared cell.
    fn setup(doc: Json, config: HistoryConfig) -> (Tracked, Rc<RefCell<Option<History>>>) {
        let slot: Rc<RefCell<Option<History>>> = Rc::new(RefCell::new(None));
        let sink = slot.clone();
        let options = ObserverOptions::default().with_on_change(move |e| {
            if let Some(history) = sink.borrow_mut().as_mut() {
                history.onchange(e.root, e);
            }
        });
        let observer = Observer::new(Value::from(doc).into_node().unwrap(), options);
        let mut history = History::new(observer.root(), config);
        history.endure();
        *slot.borrow_mut() = Some(history);
        (observer.root(), slot)
    }

    #[test]
    fn test_commit_requires_pending() {
        let (_, slot) = setup(json!({}), HistoryConfig::default());
        let mut slot = slot.borrow_mut();
        let history = slot.as_mut().unwrap();
        assert!(history.commit("nothing", json!(true)).is_none());
        assert_eq!(history.pos(), -1);
    }

    #[test]
    fn test_paused_history_ignores_changes() {
        let (root, slot) = setup(json!({}), HistoryConfig::default());
        slot.borrow_mut().as_mut().unwrap().pause();
        root.set("a", 1);
        assert!(slot.borrow().as_ref().unwrap().pending().is_empty());
    }

    #[test]
    fn test_filter_by_prefix() {
        let config = HistoryConfig::default().with_filter(HistoryFilter::prefix("arr"));
        let (root, slot) = setup(json!({"array": [], "other": {}}), config);
        root.get("array").into_tracked().unwrap().push([Value::from(1)]);
        root.get("other").into_tracked().unwrap().set("x", 1);
        let slot = slot.borrow();
        let pending = slot.as_ref().unwrap().pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].path, "array");
    }

    #[test]
    fn test_changes_from_another_root_are_ignored() {
        let (root, slot) = setup(json!({}), HistoryConfig::default());
        let sink = slot.clone();
        let options = ObserverOptions::default().with_on_change(move |e| {
            if let Some(history) = sink.borrow_mut().as_mut() {
                history.onchange(e.root, e);
            }
        });
        let other = Observer::new(Value::from(json!({})).into_node().unwrap(), options);
        other.root().set("b", 1);
        assert!(slot.borrow().as_ref().unwrap().pending().is_empty());

        root.set("a", 1);
        assert_eq!(slot.borrow().as_ref().unwrap().pending().len(), 1);
    }

    #[test]
    fn test_status_descriptions() {
        let (root, slot) = setup(json!({}), HistoryConfig::default().with_coalesce_window_ms(0));
        root.set("a", 1);
        slot.borrow_mut().as_mut().unwrap().commit("first", json!(true));
        root.set("a", 2);
        slot.borrow_mut().as_mut().unwrap().commit("second", json!(true));
        let mut slot = slot.borrow_mut();
        let history = slot.as_mut().unwrap();
        assert_eq!(history.status().undo.as_deref(), Some("second"));
        assert_eq!(history.status().redo, None);
        history.undo();
        let status = history.status();
        assert_eq!(status.undo.as_deref(), Some("first"));
        assert_eq!(status.redo.as_deref(), Some("second"));
        assert_eq!(root.to_json(), json!({"a": 1}));
    }

    #[test]
    fn test_commit_after_undo_discards_redo_branch() {
        let (root, slot) = setup(json!({}), HistoryConfig::default().with_coalesce_window_ms(0));
        for (i, name) in ["a", "b", "c"].into_iter().enumerate() {
            root.set(name, i);
            slot.borrow_mut().as_mut().unwrap().commit(name, json!(true));
        }
        {
            let mut slot = slot.borrow_mut();
            let history = slot.as_mut().unwrap();
            history.undo();
            history.undo();
        }
        root.set("d", 3);
        let mut slot = slot.borrow_mut();
        let history = slot.as_mut().unwrap();
        history.commit("d", json!(true));
        let names: Vec<_> = history.stack().iter().map(|c| c.description.as_str()).collect();
        assert_eq!(names, vec!["a", "d"]);
        assert_eq!(history.pos(), 1);
        assert_eq!(root.to_json(), json!({"a": 0, "d": 3}));
    }

    #[test]
    fn test_redo_refused_with_pending() {
        let (root, slot) = setup(json!({}), HistoryConfig::default());
        root.set("a", 1);
        slot.borrow_mut().as_mut().unwrap().commit("a", json!(true));
        slot.borrow_mut().as_mut().unwrap().undo();
        root.set("b", 1);
        let mut slot = slot.borrow_mut();
        let history = slot.as_mut().unwrap();
        assert!(!history.can_redo());
        assert!(history.redo().is_none());
        assert_eq!(history.pos(), -1);
    }

    #[test]
    fn test_set_clamps_pointer() {
        let (_, slot) = setup(json!({}), HistoryConfig::default());
        let mut slot = slot.borrow_mut();
        let history = slot.as_mut().unwrap();
        history.set(SerializedHistory {
            pos: 5,
            ..SerializedHistory::default()
        });
        assert_eq!(history.pos(), -1);
    }

    #[test]
    fn test_serialized_layout() {
        let serialized = SerializedHistory {
            changes: vec![],
            pos: 0,
            stack: vec![Commit {
                changes: vec![ChangeRecord::new("", crate::change::Change::Reverse)],
                description: "test".into(),
                meta: json!(true),
                timestamp: None,
            }],
            snapshot: None,
        };
        let json = serde_json::to_value(&serialized).unwrap();
        assert_eq!(
            json,
            json!({
                "changes": [],
                "pos": 0,
                "stack": [{"changes": [["", "reverse"]], "description": "test", "meta": true}]
            })
        );
        let back: SerializedHistory = serde_json::from_value(json!({"stack": []})).unwrap();
        assert_eq!(back, SerializedHistory::default());
    }
}
