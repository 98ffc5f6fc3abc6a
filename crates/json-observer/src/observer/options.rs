use std::fmt;
use std::rc::Rc;

use json_observer_value::{NodeId, Value};

use super::Tracked;
use crate::change::{Change, ChangeRecord};
use crate::trap::sequence::DEFAULT_MAX_LEN;
use crate::trap::{AllowAll, Validator};

/// Notification sent after every successful mutation.
pub struct ChangeEvent<'a> {
    /// Identity of the observed root.
    pub root: NodeId,
    /// The node that was mutated.
    pub target: &'a Tracked,
    pub change: &'a Change,
}

impl ChangeEvent<'_> {
    /// Path of the mutated node.
    pub fn path(&self) -> String {
        self.target.path()
    }

    /// The event as an addressed record. Payloads are shared with the live
    /// graph; use [`Change::deep_clone`] before keeping it.
    pub fn record(&self) -> ChangeRecord {
        ChangeRecord::new(self.path(), self.change.clone())
    }
}

impl fmt::Debug for ChangeEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeEvent")
            .field("root", &self.root)
            .field("target", &self.target.node().id())
            .field("change", &self.change)
            .finish()
    }
}

pub type OnChange = Rc<dyn Fn(&ChangeEvent<'_>)>;
pub type EqualFn = Rc<dyn Fn(&Value, &Value) -> bool>;
pub type ExcludeFn = Rc<dyn Fn(&Value) -> bool>;

/// Options for [`Observer::new`](super::Observer::new).
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use json_observer::{Observer, ObserverOptions};
/// use json_observer_value::Value;
/// use serde_json::json;
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let sink = seen.clone();
/// let options = ObserverOptions::default()
///     .with_on_change(move |event| sink.borrow_mut().push(event.record()))
///     .with_reserved(["_cache"]);
///
/// let doc = Value::from(json!({"a": 1})).into_node().unwrap();
/// let observer = Observer::new(doc, options);
/// observer.root().set("a", Value::from(2));
/// observer.root().set("_cache", Value::from(true));
/// assert_eq!(seen.borrow().len(), 1);
/// ```
#[derive(Clone)]
pub struct ObserverOptions {
    pub on_change: Option<OnChange>,
    pub validator: Rc<dyn Validator>,
    /// Writes of a value `equal` to the current one are skipped.
    pub equal: EqualFn,
    /// Values for which this returns `true` are handed out unwrapped and
    /// never get back-references.
    pub exclude: Option<ExcludeFn>,
    /// Keys that are read and written raw, without validation or records.
    pub reserved: Vec<String>,
    /// Longest a sequence may become through an index write or a length
    /// assignment. Writes beyond it are rejected.
    pub max_sequence_len: usize,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            on_change: None,
            validator: Rc::new(AllowAll),
            equal: Rc::new(Value::same),
            exclude: None,
            reserved: Vec::new(),
            max_sequence_len: DEFAULT_MAX_LEN,
        }
    }
}

impl ObserverOptions {
    pub fn with_on_change(mut self, f: impl Fn(&ChangeEvent<'_>) + 'static) -> Self {
        self.on_change = Some(Rc::new(f));
        self
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Rc::new(validator);
        self
    }

    pub fn with_equal(mut self, f: impl Fn(&Value, &Value) -> bool + 'static) -> Self {
        self.equal = Rc::new(f);
        self
    }

    pub fn with_exclude(mut self, f: impl Fn(&Value) -> bool + 'static) -> Self {
        self.exclude = Some(Rc::new(f));
        self
    }

    pub fn with_reserved<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn with_max_sequence_len(mut self, max: usize) -> Self {
        self.max_sequence_len = max;
        self
    }

    pub(crate) fn is_reserved(&self, key: &str) -> bool {
        self.reserved.iter().any(|k| k == key)
    }

    pub(crate) fn is_excluded(&self, value: &Value) -> bool {
        self.exclude.as_ref().is_some_and(|f| f(value))
    }
}

impl fmt::Debug for ObserverOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverOptions")
            .field("on_change", &self.on_change.is_some())
            .field("exclude", &self.exclude.is_some())
            .field("reserved", &self.reserved)
            .field("max_sequence_len", &self.max_sequence_len)
            .finish_non_exhaustive()
    }
}
