//! json-observer — transparent, undoable mutation tracking for object graphs.
//!
//! An [`Observer`] wraps a graph from `json-observer-value` and reports every
//! mutation made through its [`Tracked`] handles as a canonical
//! [`ChangeRecord`]: the path of the mutated node plus an invertible
//! [`Change`]. Records can be replayed in either direction on any graph of
//! the same shape, grouped into undoable commits by a [`History`], wrapped
//! in single-level transactions by a [`SnapshotHistory`], or produced from
//! a plain target value by [`patch`].
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use json_observer::{Direction, Observer, ObserverOptions};
//! use json_observer_value::Value;
//! use serde_json::json;
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&log);
//! let options = ObserverOptions::default().with_on_change(move |event| {
//!     sink.borrow_mut().push(event.record());
//! });
//!
//! let doc = Value::from(json!({"array": [1, 2, {"id": "foo"}]})).into_node().unwrap();
//! let observer = Observer::new(doc, options);
//! let item = observer.root().get("array").into_tracked().unwrap().get("2").into_tracked().unwrap();
//! item.set("id", Value::from("bar"));
//!
//! let records = log.borrow().clone();
//! assert_eq!(records[0].path, "array/2");
//! assert_eq!(json_observer::change::to_json(&records[0]), json!(["array/2", "set", "id", "bar", "foo"]));
//!
//! observer.replay(Direction::Undo, &records, None).unwrap();
//! assert_eq!(observer.root().to_json(), json!({"array": [1, 2, {"id": "foo"}]}));
//! ```

pub mod change;
pub mod history;
pub mod instance;
pub mod observer;
pub mod patch;
pub mod replay;
pub mod snapshot;
pub mod trap;

pub use change::{Change, ChangeRecord, CodecError, KeyOp, LengthPrev, SeqOp};
pub use history::{
    Clock, Commit, History, HistoryConfig, HistoryFilter, HistoryStatus, ManualClock, SerializedHistory, SystemClock,
};
pub use instance::HistoryObserver;
pub use observer::{BoundMethod, ChangeEvent, Member, Observer, ObserverOptions, Tracked};
pub use patch::{patch, PatchOptions};
pub use replay::{apply_changes, Direction, Reconstruct, ReplayError};
pub use snapshot::{SnapshotHistory, SnapshotMark, SNAPSHOT_DESCRIPTION, SNAPSHOT_MAX_DEPTH};
pub use trap::{AllowAll, ValidateCalls, ValidateKeys, Validator, ValueBox};
