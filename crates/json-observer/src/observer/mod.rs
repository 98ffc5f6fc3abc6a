//! Interception layer.
//!
//! An [`Observer`] owns one graph root and hands out [`Tracked`] wrappers.
//! Every mutation made through a wrapper is validated, normalized into a
//! [`Change`] and reported to the `on_change` callback. Reads of composite
//! members return wrappers too, so tracking extends to the whole graph.
//!
//! Each observer keeps its own wrapper cache (one wrapper per live node)
//! and its own back-reference table (parent and local name per node),
//! from which [`Tracked::path`] is computed. Both hold weak handles only.

mod bindings;
mod options;

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use json_observer_path::{format_path, retrieve};
use json_observer_value::{Kind, Node, NodeId, Value};
use serde_json::Value as Json;
use tracing::{debug, trace};

use bindings::Bindings;
pub use options::{ChangeEvent, EqualFn, ExcludeFn, ObserverOptions, OnChange};

use crate::change::{Change, ChangeRecord, SeqOp};
use crate::replay::{self, Direction, Reconstruct, ReplayError};
use crate::trap::keyed;
use crate::trap::sequence::{self, CallResult};

struct Shared {
    root: Node,
    options: ObserverOptions,
    bindings: RefCell<Bindings>,
    cache: RefCell<HashMap<NodeId, Weak<TrackedInner>>>,
}

impl Shared {
    fn wrap(self: &Rc<Self>, node: &Node) -> Tracked {
        if let Some(inner) = self.cache.borrow().get(&node.id()).and_then(Weak::upgrade) {
            return Tracked { inner };
        }
        let inner = Rc::new(TrackedInner {
            node: node.clone(),
            shared: Rc::clone(self),
        });
        self.cache.borrow_mut().insert(node.id(), Rc::downgrade(&inner));
        self.compact_if_needed();
        Tracked { inner }
    }

    /// Wrapper for `child`, found under `key` of `parent`.
    fn child(self: &Rc<Self>, child: &Node, parent: &Node, key: &str) -> Tracked {
        {
            let mut bindings = self.bindings.borrow_mut();
            if bindings.is_bound(child) {
                bindings.bind(child, parent, key);
            } else {
                bindings.attach(child, Some((parent, key)), &self.options);
            }
        }
        self.wrap(child)
    }

    fn attach(&self, child: &Node, parent: &Node, key: &str) {
        self.bindings
            .borrow_mut()
            .attach(child, Some((parent, key)), &self.options);
        self.compact_if_needed();
    }

    fn refresh(&self, node: &Node) {
        self.bindings.borrow_mut().refresh(node, &self.options);
        self.compact_if_needed();
    }

    fn steps(&self, node: &Node, key: Option<&str>) -> Vec<String> {
        let mut steps = self.bindings.borrow().steps(node);
        if let Some(key) = key {
            steps.push(key.to_string());
        }
        steps
    }

    fn compact_if_needed(&self) {
        if self.bindings.borrow().needs_compaction() {
            self.compact();
        }
    }

    fn compact(&self) -> usize {
        let removed = self.bindings.borrow_mut().compact();
        self.cache
            .borrow_mut()
            .retain(|_, inner| inner.strong_count() > 0);
        trace!(root = %self.root.id(), removed, "compacted back-references");
        removed
    }

    fn emit(&self, target: &Tracked, change: &Change) {
        if let Some(on_change) = &self.options.on_change {
            on_change(&ChangeEvent {
                root: self.root.id(),
                target,
                change,
            });
        }
    }
}

// ── Observer ──────────────────────────────────────────────────────────────

/// Tracks mutations of the graph below one root node.
///
/// Cloning an `Observer` clones the handle.
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
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let sink = log.clone();
/// let doc = Value::from(json!({"array": [1, 2, {"id": "foo"}]})).into_node().unwrap();
/// let observer = Observer::new(
///     doc,
///     ObserverOptions::default().with_on_change(move |e| sink.borrow_mut().push(e.record())),
/// );
///
/// let array = observer.root().get("array").into_tracked().unwrap();
/// array.shift();
/// let item = array.get("1").into_tracked().unwrap();
/// item.set("id", Value::from("bar"));
///
/// let paths: Vec<_> = log.borrow().iter().map(|r| r.path.clone()).collect();
/// assert_eq!(paths, vec!["array", "array/1"]);
/// ```
#[derive(Clone)]
pub struct Observer {
    shared: Rc<Shared>,
}

impl Observer {
    pub fn new(source: Node, options: ObserverOptions) -> Self {
        let mut bindings = Bindings::new(source.id());
        bindings.attach(&source, None, &options);
        debug!(root = %source.id(), nodes = bindings.len(), "observer attached");
        Self {
            shared: Rc::new(Shared {
                root: source,
                options,
                bindings: RefCell::new(bindings),
                cache: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn root(&self) -> Tracked {
        self.shared.wrap(&self.shared.root)
    }

    pub fn root_id(&self) -> NodeId {
        self.shared.root.id()
    }

    /// The raw root node.
    pub fn source(&self) -> &Node {
        &self.shared.root
    }

    pub fn options(&self) -> &ObserverOptions {
        &self.shared.options
    }

    /// Wraps an arbitrary node of this graph, such as one returned by a
    /// sequence call.
    pub fn track(&self, node: &Node) -> Tracked {
        self.shared.wrap(node)
    }

    /// Slash-delimited path of `node`, optionally extended by `key`.
    pub fn path(&self, node: &Node, key: Option<&str>) -> String {
        format_path(&self.shared.steps(node, key))
    }

    /// [`path`](Self::path) as a list of steps.
    pub fn path_steps(&self, node: &Node, key: Option<&str>) -> Vec<String> {
        self.shared.steps(node, key)
    }

    /// Resolves `path` from the root. `None` if any step is missing.
    pub fn retrieve(&self, path: &str) -> Option<Value> {
        retrieve(&Value::Node(self.shared.root.clone()), path)
    }

    /// Rebinds the direct composite children of `node` and attaches any
    /// new subtrees below it. Needed after mutating raw nodes directly.
    pub fn refresh(&self, node: &Node) {
        self.shared.refresh(node);
    }

    /// Applies `records` to the raw graph without reporting them, then
    /// refreshes every touched node.
    ///
    /// # Errors
    ///
    /// Stops at the first record that cannot be applied; earlier records of
    /// the batch stay applied.
    pub fn replay(
        &self,
        direction: Direction,
        records: &[ChangeRecord],
        reconstruct: Option<&Reconstruct>,
    ) -> Result<(), ReplayError> {
        replay::apply_changes_visiting(&self.shared.root, direction, records, reconstruct, |target| {
            self.shared.refresh(target)
        })
    }

    /// Drops back-references and cached wrappers of dead nodes. Returns the
    /// number of back-references removed.
    pub fn compact(&self) -> usize {
        self.shared.compact()
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("root", &self.shared.root.id())
            .field("bindings", &self.shared.bindings.borrow().len())
            .finish()
    }
}

// ── Tracked ───────────────────────────────────────────────────────────────

struct TrackedInner {
    node: Node,
    shared: Rc<Shared>,
}

/// A wrapped node whose mutations are tracked.
#[derive(Clone)]
pub struct Tracked {
    inner: Rc<TrackedInner>,
}

/// A member read through a [`Tracked`] node.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    /// A composite, wrapped.
    Node(Tracked),
    /// A scalar, a missing key (`Undefined`), an excluded value or a
    /// reserved key's raw value.
    Value(Value),
}

impl Member {
    pub fn as_tracked(&self) -> Option<&Tracked> {
        match self {
            Member::Node(tracked) => Some(tracked),
            Member::Value(_) => None,
        }
    }

    pub fn into_tracked(self) -> Option<Tracked> {
        match self {
            Member::Node(tracked) => Some(tracked),
            Member::Value(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Member::Node(tracked) => tracked.to_value(),
            Member::Value(value) => value.clone(),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Member::Value(Value::Undefined))
    }
}

/// A sequence-mutating method read off a sequence, ready to be called.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    target: Tracked,
    op: SeqOp,
}

impl BoundMethod {
    pub fn op(&self) -> SeqOp {
        self.op
    }

    /// See [`Tracked::call`].
    pub fn call(&self, args: Vec<Value>) -> Option<Value> {
        self.target.call(self.op, args)
    }
}

impl Tracked {
    pub fn node(&self) -> &Node {
        &self.inner.node
    }

    pub fn id(&self) -> NodeId {
        self.inner.node.id()
    }

    pub fn kind(&self) -> Kind {
        self.inner.node.kind()
    }

    pub fn is_sequence(&self) -> bool {
        self.inner.node.is_sequence()
    }

    pub fn observer(&self) -> Observer {
        Observer {
            shared: Rc::clone(&self.inner.shared),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.node.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.node.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.node.keys()
    }

    /// Members in order, composites wrapped.
    pub fn entries(&self) -> Vec<(String, Member)> {
        self.keys()
            .into_iter()
            .map(|key| {
                let member = self.get(&key);
                (key, member)
            })
            .collect()
    }

    /// Reads `key`. Composite members come back wrapped, and reading one
    /// (re)establishes its back-reference to this node.
    pub fn get(&self, key: &str) -> Member {
        let shared = &self.inner.shared;
        let node = &self.inner.node;
        let value = keyed::read_member(node, key);
        if shared.options.is_reserved(key) || shared.options.is_excluded(&value) {
            return Member::Value(value);
        }
        match value {
            Value::Node(child) => Member::Node(shared.child(&child, node, key)),
            other => Member::Value(other),
        }
    }

    /// Writes `key`.
    ///
    /// Returns `false` when the validator rejects the write or the key
    /// cannot address a member (a non-index key of a sequence, or an index
    /// at or past [`ObserverOptions::max_sequence_len`]). Writes of a
    /// value equal to the current one succeed without a record. `"length"`
    /// of a sequence is routed to [`set_length`](Self::set_length).
    pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let shared = &self.inner.shared;
        let node = &self.inner.node;
        let max_len = shared.options.max_sequence_len;
        if shared.options.is_reserved(key) {
            return keyed::is_storable(node, key, max_len) && keyed::write_member(node, key, value);
        }
        let current = keyed::read_member(node, key);
        if (shared.options.equal)(&current, &value) {
            return true;
        }
        if node.is_sequence() && key == SeqOp::Length.as_str() {
            return self.invoke(SeqOp::Length, vec![value], None) == Some(CallResult::Assigned);
        }
        let outcome = keyed::set_property(node, key, value, shared.options.validator.as_ref(), max_len);
        if !outcome.approved {
            trace!(key, "set rejected");
            return false;
        }
        if let Some(change) = &outcome.change {
            if let Change::Set {
                value: stored @ Value::Node(child),
                ..
            } = change
            {
                if !shared.options.is_excluded(stored) {
                    shared.attach(child, node, key);
                }
            }
            shared.emit(self, change);
        }
        true
    }

    /// Deletes `key`. Returns whether the validator approved.
    pub fn delete(&self, key: &str) -> bool {
        let shared = &self.inner.shared;
        let node = &self.inner.node;
        if shared.options.is_reserved(key) {
            keyed::remove_member(node, key);
            return true;
        }
        let outcome = keyed::delete_property(node, key, shared.options.validator.as_ref());
        if !outcome.approved {
            trace!(key, substituted = outcome.change.is_some(), "delete rejected");
            return false;
        }
        if let Some(change) = &outcome.change {
            shared.emit(self, change);
        }
        true
    }

    /// Looks up a sequence-mutating method by name, e.g. `"copyWithin"`.
    ///
    /// `None` for keyed nodes and for names that are not mutating methods.
    pub fn method(&self, name: &str) -> Option<BoundMethod> {
        if !self.is_sequence() {
            return None;
        }
        SeqOp::from_name(name).map(|op| BoundMethod {
            target: self.clone(),
            op,
        })
    }

    fn invoke(
        &self,
        op: SeqOp,
        mut args: Vec<Value>,
        compare: Option<&mut dyn FnMut(&Value, &Value) -> Ordering>,
    ) -> Option<CallResult> {
        let shared = &self.inner.shared;
        let node = &self.inner.node;
        if !node.is_sequence() {
            return None;
        }
        if !shared.options.validator.validate_call(node, op, &mut args) {
            trace!(op = op.as_str(), "call rejected");
            return None;
        }
        let outcome = {
            let mut items = node.sequence_mut()?;
            sequence::call(&mut items, op, args, compare, shared.options.max_sequence_len)
        };
        match &outcome.change {
            Some(change) => {
                shared.refresh(node);
                shared.emit(self, change);
            }
            None => trace!(op = op.as_str(), "call left sequence unchanged"),
        }
        Some(outcome.result)
    }

    /// Calls a sequence-mutating method with loosely typed arguments.
    ///
    /// The validator may rewrite `args`. Returns `None` if this is not a
    /// sequence or the validator rejected the call; otherwise what the
    /// method returns: removed elements for `splice`, the element for
    /// `pop`/`shift` (`Undefined` when empty), the new length for `push`/
    /// `unshift`, the sequence itself for the in-place methods and `true`
    /// for `length`. Malformed arguments give `Undefined`.
    pub fn call(&self, op: SeqOp, args: Vec<Value>) -> Option<Value> {
        let result = self.invoke(op, args, None)?;
        Some(match result {
            CallResult::Nothing => Value::Undefined,
            CallResult::Removed(removed) => Value::sequence(removed),
            CallResult::Element(elem) => elem,
            CallResult::Length(len) => Value::from(len),
            CallResult::Itself => self.to_value(),
            CallResult::Assigned => Value::Bool(true),
        })
    }

    pub fn push(&self, values: impl IntoIterator<Item = Value>) -> Option<usize> {
        match self.invoke(SeqOp::Push, values.into_iter().collect(), None)? {
            CallResult::Length(len) => Some(len),
            _ => None,
        }
    }

    pub fn unshift(&self, values: impl IntoIterator<Item = Value>) -> Option<usize> {
        match self.invoke(SeqOp::Unshift, values.into_iter().collect(), None)? {
            CallResult::Length(len) => Some(len),
            _ => None,
        }
    }

    pub fn pop(&self) -> Option<Value> {
        match self.invoke(SeqOp::Pop, Vec::new(), None)? {
            CallResult::Element(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn shift(&self) -> Option<Value> {
        match self.invoke(SeqOp::Shift, Vec::new(), None)? {
            CallResult::Element(elem) => Some(elem),
            _ => None,
        }
    }

    /// Removes `delete_count` elements at `start` (negative counts from the
    /// end) and inserts `inserted` there. Returns the removed elements.
    pub fn splice(&self, start: i64, delete_count: usize, inserted: Vec<Value>) -> Option<Vec<Value>> {
        let mut args = Vec::with_capacity(inserted.len() + 2);
        args.push(Value::from(start));
        args.push(Value::from(delete_count));
        args.extend(inserted);
        match self.invoke(SeqOp::Splice, args, None)? {
            CallResult::Removed(removed) => Some(removed),
            _ => Some(Vec::new()),
        }
    }

    /// Stable sort with the default value ordering. Returns `false` if the
    /// call was rejected.
    pub fn sort(&self) -> bool {
        self.invoke(SeqOp::Sort, Vec::new(), None).is_some()
    }

    /// Stable sort with `compare`. The comparator runs while the sequence
    /// is borrowed and must not touch the graph.
    pub fn sort_by(&self, mut compare: impl FnMut(&Value, &Value) -> Ordering) -> bool {
        self.invoke(SeqOp::Sort, Vec::new(), Some(&mut compare)).is_some()
    }

    pub fn reverse(&self) -> bool {
        self.invoke(SeqOp::Reverse, Vec::new(), None).is_some()
    }

    pub fn copy_within(&self, target: i64, start: i64, end: Option<i64>) -> bool {
        let mut args = vec![Value::from(target), Value::from(start)];
        args.extend(end.map(Value::from));
        self.invoke(SeqOp::CopyWithin, args, None).is_some()
    }

    pub fn fill(&self, value: impl Into<Value>, start: i64, end: Option<i64>) -> bool {
        let mut args = vec![value.into(), Value::from(start)];
        args.extend(end.map(Value::from));
        self.invoke(SeqOp::Fill, args, None).is_some()
    }

    /// Truncates or pads. Returns `false` past
    /// [`ObserverOptions::max_sequence_len`].
    pub fn set_length(&self, len: usize) -> bool {
        self.invoke(SeqOp::Length, vec![Value::from(len)], None) == Some(CallResult::Assigned)
    }

    pub fn path(&self) -> String {
        format_path(&self.inner.shared.steps(&self.inner.node, None))
    }

    /// Path of member `key` of this node.
    pub fn path_to(&self, key: &str) -> String {
        format_path(&self.inner.shared.steps(&self.inner.node, Some(key)))
    }

    pub fn path_steps(&self) -> Vec<String> {
        self.inner.shared.steps(&self.inner.node, None)
    }

    /// The node this one was last seen under. `None` for the root.
    pub fn parent(&self) -> Option<Tracked> {
        let parent = self.inner.shared.bindings.borrow().parent(&self.inner.node)?;
        Some(self.inner.shared.wrap(&parent))
    }

    /// The underlying node as a value. Mutating it directly bypasses
    /// tracking.
    pub fn to_value(&self) -> Value {
        Value::Node(self.inner.node.clone())
    }

    pub fn to_json(&self) -> Json {
        self.inner.node.to_json()
    }
}

impl PartialEq for Tracked {
    fn eq(&self, other: &Self) -> bool {
        self.inner.node.ptr_eq(&other.inner.node) && Rc::ptr_eq(&self.inner.shared, &other.inner.shared)
    }
}

impl fmt::Debug for Tracked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("node", &self.inner.node)
            .field("path", &self.path())
            .finish()
    }
}
