use std::collections::HashMap;

use crate::node::{Composite, Node, NodeId};
use crate::Value;

/// Creates a deep clone of a graph value.
///
/// Every reachable node is copied exactly once: shared members stay shared
/// and cycles are reproduced inside the copy instead of being unrolled.
///
/// # Examples
///
/// ```
/// use json_observer_value::{deep_clone, Value};
/// use serde_json::json;
///
/// let original = Value::from(json!({"foo": [1, 2, 3]}));
/// let cloned = deep_clone(&original);
///
/// assert_eq!(original, cloned);
/// assert!(!original.same(&cloned));
/// ```
pub fn deep_clone(value: &Value) -> Value {
    let mut memo = HashMap::new();
    clone_inner(value, &mut memo)
}

fn clone_inner(value: &Value, memo: &mut HashMap<NodeId, Node>) -> Value {
    match value {
        Value::Node(node) => Value::Node(clone_node(node, memo)),
        other => other.clone(),
    }
}

fn clone_node(node: &Node, memo: &mut HashMap<NodeId, Node>) -> Node {
    if let Some(copy) = memo.get(&node.id()) {
        return copy.clone();
    }
    let body = node.borrow().clone();
    match body {
        Composite::Sequence(items) => {
            let copy = Node::sequence(Vec::with_capacity(items.len()));
            memo.insert(node.id(), copy.clone());
            let cloned: Vec<Value> = items.iter().map(|v| clone_inner(v, memo)).collect();
            if let Some(mut slot) = copy.sequence_mut() {
                *slot = cloned;
            }
            copy
        }
        Composite::Keyed(map) => {
            let copy = Node::keyed(Default::default());
            memo.insert(node.id(), copy.clone());
            let cloned = map.iter().map(|(k, v)| (k.clone(), clone_inner(v, memo))).collect();
            if let Some(mut slot) = copy.keyed_mut() {
                *slot = cloned;
            }
            copy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clone_scalars() {
        assert_eq!(deep_clone(&Value::from(42)), Value::from(42));
        assert!(deep_clone(&Value::Undefined).is_undefined());
    }

    #[test]
    fn test_clone_is_independent() {
        let original = Value::from(json!({"a": [1, 2]}));
        let cloned = deep_clone(&original);
        let inner = cloned.as_node().unwrap().get("a").unwrap();
        inner.as_node().unwrap().sequence_mut().unwrap().push(Value::from(3));
        assert_eq!(original.to_json(), json!({"a": [1, 2]}));
        assert_eq!(cloned.to_json(), json!({"a": [1, 2, 3]}));
    }

    #[test]
    fn test_clone_preserves_sharing() {
        let shared = Value::from(json!({"x": 1}));
        let root = Value::sequence(vec![shared.clone(), shared]);
        let cloned = deep_clone(&root);
        let node = cloned.as_node().unwrap();
        let first = node.get("0").unwrap();
        let second = node.get("1").unwrap();
        assert!(first.same(&second));
    }

    #[test]
    fn test_clone_preserves_cycles() {
        let node = Node::sequence(vec![]);
        node.sequence_mut().unwrap().push(Value::Node(node.clone()));
        let cloned = deep_clone(&Value::Node(node.clone()));
        let copy = cloned.as_node().unwrap();
        assert!(!copy.ptr_eq(&node));
        let inner = copy.get("0").unwrap();
        assert!(inner.as_node().unwrap().ptr_eq(copy));
    }
}
