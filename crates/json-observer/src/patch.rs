//! Structural patch through the interception layer.
//!
//! [`patch`] brings a tracked node in line with a plain source value using
//! the fewest member writes it can find. Every write goes through the
//! [`Tracked`] API, so each difference shows up as an ordinary change
//! record and is undoable like any other edit.

use std::fmt;
use std::rc::Rc;

use json_observer_value::{deep_equal, Kind, Node, Value};

use crate::observer::{EqualFn, Member, Tracked};

/// Options for [`patch`].
#[derive(Clone)]
pub struct PatchOptions {
    /// Members for which this holds are left alone.
    pub equal: EqualFn,
    /// Keys missing from the source are deleted when `true`, set to
    /// `Undefined` when `false`.
    pub delete_properties: bool,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            equal: Rc::new(deep_equal),
            delete_properties: true,
        }
    }
}

impl PatchOptions {
    #[must_use]
    pub fn with_equal(mut self, f: impl Fn(&Value, &Value) -> bool + 'static) -> Self {
        self.equal = Rc::new(f);
        self
    }

    #[must_use]
    pub fn with_delete_properties(mut self, delete: bool) -> Self {
        self.delete_properties = delete;
        self
    }
}

impl fmt::Debug for PatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchOptions")
            .field("delete_properties", &self.delete_properties)
            .finish_non_exhaustive()
    }
}

struct Patcher<'a> {
    options: &'a PatchOptions,
    writes: usize,
}

impl Patcher<'_> {
    fn assign(&mut self, target: &Tracked, key: &str, value: Value) {
        if value.is_undefined() && self.options.delete_properties {
            target.delete(key);
        } else {
            target.set(key, value);
        }
        self.writes += 1;
    }

    fn element(&mut self, target: &Tracked, source: &Node, key: &str) {
        let incoming = source.get(key).unwrap_or_default();
        let current = target.get(key);
        if (self.options.equal)(&current.to_value(), &incoming) {
            return;
        }
        match (&current, &incoming) {
            (Member::Node(child), Value::Node(from)) if child.kind() == from.kind() => {
                self.composite(child, from);
            }
            _ => self.assign(target, key, incoming.deep_clone()),
        }
    }

    fn composite(&mut self, target: &Tracked, source: &Node) {
        match source.kind() {
            Kind::Sequence => self.sequence(target, source),
            _ => self.keyed(target, source),
        }
    }

    fn sequence(&mut self, target: &Tracked, source: &Node) {
        let have = target.len();
        let want = source.len();
        for i in (0..have.min(want)).rev() {
            self.element(target, source, &i.to_string());
        }
        if want < have {
            target.set_length(want);
            self.writes += 1;
        } else if want > have {
            let tail: Vec<Value> = source
                .sequence_items()
                .map(|items| items[have..].iter().map(Value::deep_clone).collect())
                .unwrap_or_default();
            self.writes += tail.len();
            target.push(tail);
        }
    }

    fn keyed(&mut self, target: &Tracked, source: &Node) {
        for key in target.keys() {
            if !source.contains_key(&key) {
                self.assign(target, &key, Value::Undefined);
            }
        }
        for key in source.keys() {
            self.element(target, source, &key);
        }
    }
}

/// Patches `target` to match `source`.
///
/// Equal members are skipped; composites of the same kind are patched
/// recursively; anything else is overwritten with a copy of the source
/// member. Sequences longer than the source are truncated and shorter ones
/// are extended with one push. Returns the number of writes, or `None` if
/// `source` is not a composite of the same kind as `target`.
///
/// # Example
///
/// ```
/// use json_observer::{patch, Observer, ObserverOptions, PatchOptions};
/// use json_observer_value::Value;
/// use serde_json::json;
///
/// let doc = Value::from(json!({"a": 1, "b": 1, "d": [1, 2, 3]})).into_node().unwrap();
/// let observer = Observer::new(doc, ObserverOptions::default());
/// let source = Value::from(json!({"a": 2, "c": 1, "d": [0, 2, 3, 5]}));
///
/// let writes = patch(&observer.root(), &source, &PatchOptions::default());
/// assert_eq!(writes, Some(5));
/// assert_eq!(observer.root().to_json(), json!({"a": 2, "d": [0, 2, 3, 5], "c": 1}));
/// ```
pub fn patch(target: &Tracked, source: &Value, options: &PatchOptions) -> Option<usize> {
    let source = source.as_node()?;
    if source.kind() != target.kind() {
        return None;
    }
    let mut patcher = Patcher { options, writes: 0 };
    patcher.composite(target, source);
    Some(patcher.writes)
}
