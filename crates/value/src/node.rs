//! Identity-addressed composite nodes.
//!
//! A [`Node`] is a shared handle to either an ordered sequence or a keyed
//! map. Cloning a `Node` clones the handle, not the contents: two clones
//! observe the same storage and report the same [`NodeId`].
//!
//! The kind of a node is fixed when it is created. Mutable access is only
//! handed out as `&mut Vec<Value>` or `&mut Map`, so a sequence can never
//! turn into a keyed map behind an observer's back.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::Value;

/// Keyed map storage. Insertion order is preserved.
pub type Map = IndexMap<String, Value>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Node`].
///
/// Identifiers come from a monotonic counter and are never reused, so a
/// side table keyed by `NodeId` cannot confuse a dead node with a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shape of a value, decided once when the value is first seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Sequence,
    Keyed,
    Scalar,
}

/// Contents of a composite node.
#[derive(Debug, Clone)]
pub enum Composite {
    Sequence(Vec<Value>),
    Keyed(Map),
}

impl Composite {
    pub fn kind(&self) -> Kind {
        match self {
            Composite::Sequence(_) => Kind::Sequence,
            Composite::Keyed(_) => Kind::Keyed,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Composite::Sequence(items) => items.len(),
            Composite::Keyed(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a member by its string name. Sequence members are
    /// addressed by canonical decimal indices (`"0"`, `"12"`).
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Composite::Sequence(items) => parse_index(key).and_then(|i| items.get(i)),
            Composite::Keyed(map) => map.get(key),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        match self {
            Composite::Sequence(items) => (0..items.len()).map(|i| i.to_string()).collect(),
            Composite::Keyed(map) => map.keys().cloned().collect(),
        }
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        match self {
            Composite::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
            Composite::Keyed(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    pub fn as_sequence(&self) -> Option<&Vec<Value>> {
        match self {
            Composite::Sequence(items) => Some(items),
            Composite::Keyed(_) => None,
        }
    }
}

/// Parses a canonical non-negative array index.
///
/// Leading zeros, signs and non-digits are rejected, so `"01"` and `"-1"`
/// name keys, not indices.
pub fn parse_index(key: &str) -> Option<usize> {
    let bytes = key.as_bytes();
    if bytes.is_empty() || (bytes.len() > 1 && bytes[0] == b'0') {
        return None;
    }
    if !bytes.iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

struct NodeCell {
    id: NodeId,
    kind: Kind,
    body: RefCell<Composite>,
}

/// Shared handle to a composite value.
#[derive(Clone)]
pub struct Node(Rc<NodeCell>);

impl Node {
    pub fn new(body: Composite) -> Self {
        Node(Rc::new(NodeCell {
            id: NodeId::next(),
            kind: body.kind(),
            body: RefCell::new(body),
        }))
    }

    pub fn sequence(items: Vec<Value>) -> Self {
        Node::new(Composite::Sequence(items))
    }

    pub fn keyed(map: Map) -> Self {
        Node::new(Composite::Keyed(map))
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn kind(&self) -> Kind {
        self.0.kind
    }

    pub fn is_sequence(&self) -> bool {
        self.0.kind == Kind::Sequence
    }

    pub fn is_keyed(&self) -> bool {
        self.0.kind == Kind::Keyed
    }

    /// Returns `true` if both handles point at the same storage.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            id: self.0.id,
            cell: Rc::downgrade(&self.0),
        }
    }

    /// Read access to the node contents.
    ///
    /// # Panics
    ///
    /// Panics if the node is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, Composite> {
        self.0.body.borrow()
    }

    pub fn sequence_items(&self) -> Option<Ref<'_, Vec<Value>>> {
        Ref::filter_map(self.0.body.borrow(), |body| body.as_sequence()).ok()
    }

    pub fn sequence_mut(&self) -> Option<RefMut<'_, Vec<Value>>> {
        RefMut::filter_map(self.0.body.borrow_mut(), |body| match body {
            Composite::Sequence(items) => Some(items),
            Composite::Keyed(_) => None,
        })
        .ok()
    }

    pub fn keyed_mut(&self) -> Option<RefMut<'_, Map>> {
        RefMut::filter_map(self.0.body.borrow_mut(), |body| match body {
            Composite::Keyed(map) => Some(map),
            Composite::Sequence(_) => None,
        })
        .ok()
    }

    pub fn len(&self) -> usize {
        self.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.borrow().is_empty()
    }

    /// Returns a handle to the member stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.borrow().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.borrow().keys()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.borrow().entries()
    }

    /// Direct composite members, paired with their local names.
    pub fn child_nodes(&self) -> Vec<(String, Node)> {
        let body = self.borrow();
        match &*body {
            Composite::Sequence(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.as_node().map(|n| (i.to_string(), n.clone())))
                .collect(),
            Composite::Keyed(map) => map
                .iter()
                .filter_map(|(k, v)| v.as_node().map(|n| (k.clone(), n.clone())))
                .collect(),
        }
    }
}

impl fmt::Debug for Node {
    // Shallow on purpose: graphs may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind() {
            Kind::Sequence => "sequence",
            _ => "keyed",
        };
        match self.0.body.try_borrow() {
            Ok(body) => write!(f, "Node({} {} len={})", self.id(), kind, body.len()),
            Err(_) => write!(f, "Node({} {} <borrowed>)", self.id(), kind),
        }
    }
}

/// Non-owning handle to a [`Node`].
#[derive(Clone)]
pub struct WeakNode {
    id: NodeId,
    cell: Weak<NodeCell>,
}

impl WeakNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Node> {
        self.cell.upgrade().map(Node)
    }

    pub fn is_alive(&self) -> bool {
        self.cell.strong_count() > 0
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakNode({})", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_stable() {
        let a = Node::sequence(vec![]);
        let b = Node::sequence(vec![]);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
        assert!(a.clone().ptr_eq(&a));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn test_kind_is_fixed() {
        let seq = Node::sequence(vec![Value::from(1)]);
        assert_eq!(seq.kind(), Kind::Sequence);
        assert!(seq.keyed_mut().is_none());
        assert!(seq.sequence_mut().is_some());
        let map = Node::keyed(Map::new());
        assert_eq!(map.kind(), Kind::Keyed);
        assert!(map.sequence_items().is_none());
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("42"), Some(42));
        assert_eq!(parse_index("01"), None);
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index(""), None);
        assert_eq!(parse_index("length"), None);
    }

    #[test]
    fn test_sequence_keys_are_indices() {
        let seq = Node::sequence(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(seq.keys(), vec!["0", "1"]);
        assert_eq!(seq.get("1"), Some(Value::from("b")));
        assert_eq!(seq.get("2"), None);
    }

    #[test]
    fn test_weak_does_not_keep_alive() {
        let node = Node::sequence(vec![]);
        let weak = node.downgrade();
        assert!(weak.is_alive());
        assert_eq!(weak.id(), node.id());
        drop(node);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_child_nodes() {
        let inner = Node::sequence(vec![]);
        let mut map = Map::new();
        map.insert("a".into(), Value::from(1));
        map.insert("b".into(), Value::Node(inner.clone()));
        let outer = Node::keyed(map);
        let children = outer.child_nodes();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].0, "b");
        assert!(children[0].1.ptr_eq(&inner));
    }
}
