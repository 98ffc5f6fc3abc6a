//! An observer bundled with its own snapshot-capable history.

use std::cell::{OnceCell, RefCell};
use std::rc::{Rc, Weak};

use json_observer_value::Node;
use serde_json::Value as Json;
use tracing::warn;

use crate::history::{Commit, HistoryConfig, HistoryStatus, SerializedHistory};
use crate::observer::{Observer, ObserverOptions, Tracked};
use crate::snapshot::SnapshotHistory;

/// An [`Observer`] whose changes are recorded by an owned
/// [`SnapshotHistory`].
///
/// The user's `on_change` callback, if any, still sees every change, before
/// the history does. Recording starts immediately.
///
/// # Example
///
/// ```
/// use json_observer::{HistoryConfig, HistoryObserver, ObserverOptions};
/// use json_observer_value::Value;
/// use serde_json::json;
///
/// let doc = Value::from(json!({"string": "data", "array": [1, 2]})).into_node().unwrap();
/// let o = HistoryObserver::new(doc, ObserverOptions::default(), HistoryConfig::default());
///
/// o.root().set("string", Value::from("ello"));
/// o.root().get("array").into_tracked().unwrap().push([Value::from(3)]);
/// o.commit_changes("edit");
///
/// o.undo();
/// assert_eq!(o.root().to_json(), json!({"string": "data", "array": [1, 2]}));
/// o.redo();
/// assert_eq!(o.root().to_json(), json!({"string": "ello", "array": [1, 2, 3]}));
/// ```
#[derive(Debug)]
pub struct HistoryObserver {
    observer: Observer,
    history: Rc<RefCell<SnapshotHistory>>,
}

impl HistoryObserver {
    pub fn new(source: Node, options: ObserverOptions, config: HistoryConfig) -> Self {
        let slot: Rc<OnceCell<Weak<RefCell<SnapshotHistory>>>> = Rc::new(OnceCell::new());
        let user = options.on_change.clone();
        let sink = Rc::clone(&slot);
        let options = options.with_on_change(move |event| {
            if let Some(user) = &user {
                user(event);
            }
            let Some(history) = sink.get().and_then(Weak::upgrade) else {
                return;
            };
            match history.try_borrow_mut() {
                Ok(mut history) => history.onchange(event.root, event),
                Err(_) => warn!(op = event.change.op_name(), "change made while the history is busy was not recorded"),
            };
        });
        let observer = Observer::new(source, options);
        let mut history = SnapshotHistory::new(observer.root(), config);
        history.endure();
        let history = Rc::new(RefCell::new(history));
        // the slot is fresh, so this is the only set
        let installed = slot.set(Rc::downgrade(&history)).is_ok();
        debug_assert!(installed);
        Self { observer, history }
    }

    pub fn root(&self) -> Tracked {
        self.observer.root()
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    /// Commits pending changes with meta `true`.
    pub fn commit_changes(&self, description: &str) -> Option<Commit> {
        self.commit_changes_with(description, Json::Bool(true))
    }

    pub fn commit_changes_with(&self, description: &str, meta: Json) -> Option<Commit> {
        self.history.borrow_mut().commit(description, meta).cloned()
    }

    pub fn undo(&self) -> Option<Commit> {
        self.history.borrow_mut().undo().cloned()
    }

    pub fn redo(&self) -> Option<Commit> {
        self.history.borrow_mut().redo().cloned()
    }

    pub fn pause(&self) {
        self.history.borrow_mut().pause();
    }

    pub fn endure(&self) {
        self.history.borrow_mut().endure();
    }

    pub fn history_status(&self) -> HistoryStatus {
        self.history.borrow().status()
    }

    pub fn serialize_history(&self) -> SerializedHistory {
        self.history.borrow().serialize()
    }

    pub fn set_history(&self, serialized: SerializedHistory) {
        self.history.borrow_mut().set(serialized);
    }

    pub fn take_snapshot(&self) -> bool {
        self.history.borrow_mut().take_snapshot()
    }

    pub fn release_snapshot(&self) -> bool {
        self.history.borrow_mut().release_snapshot()
    }

    pub fn restore_from_snapshot(&self) -> Option<bool> {
        self.history.borrow_mut().restore_from_snapshot()
    }

    /// Runs `f` with the history borrowed. Changes made through the graph
    /// inside `f` are not recorded.
    pub fn with_history<R>(&self, f: impl FnOnce(&mut SnapshotHistory) -> R) -> R {
        f(&mut self.history.borrow_mut())
    }
}
