use std::collections::HashSet;

use serde_json::Number;

use crate::node::{Composite, NodeId};
use crate::Value;

/// Performs a deep equality check between two graph values.
///
/// This function compares values recursively, checking equality for:
/// - Scalars (numbers compare by numeric value, so `1` equals `1.0`)
/// - Sequences (element-by-element comparison)
/// - Keyed maps (key-by-key comparison, order-insensitive)
///
/// Cycles are tolerated: a pair of nodes that is already being compared
/// further up the recursion counts as equal.
///
/// # Examples
///
/// ```
/// use json_observer_value::{deep_equal, Value};
/// use serde_json::json;
///
/// let a = Value::from(json!({"foo": [1, 2, 3]}));
/// let b = Value::from(json!({"foo": [1, 2, 3]}));
/// let c = Value::from(json!({"foo": [1, 2, 4]}));
///
/// assert!(deep_equal(&a, &b));
/// assert!(!deep_equal(&a, &c));
/// ```
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    let mut visiting = HashSet::new();
    equal_inner(a, b, &mut visiting)
}

fn number_equal(a: &Number, b: &Number) -> bool {
    if a == b {
        return true;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn equal_inner(a: &Value, b: &Value, visiting: &mut HashSet<(NodeId, NodeId)>) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => number_equal(a, b),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Node(na), Value::Node(nb)) => {
            if na.ptr_eq(nb) {
                return true;
            }
            let pair = (na.id(), nb.id());
            if !visiting.insert(pair) {
                return true;
            }
            let result = {
                let ba = na.borrow();
                let bb = nb.borrow();
                match (&*ba, &*bb) {
                    (Composite::Sequence(xs), Composite::Sequence(ys)) => {
                        xs.len() == ys.len()
                            && xs.iter().zip(ys.iter()).all(|(x, y)| equal_inner(x, y, visiting))
                    }
                    (Composite::Keyed(xm), Composite::Keyed(ym)) => {
                        xm.len() == ym.len()
                            && xm.iter().all(|(key, x)| match ym.get(key) {
                                Some(y) => equal_inner(x, y, visiting),
                                None => false,
                            })
                    }
                    _ => false,
                }
            };
            visiting.remove(&pair);
            result
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Map, Node};
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert!(deep_equal(&Value::from(1), &Value::from(1.0)));
        assert!(!deep_equal(&Value::from(1), &Value::from("1")));
        assert!(!deep_equal(&Value::Null, &Value::Undefined));
        assert!(deep_equal(&Value::Undefined, &Value::Undefined));
    }

    #[test]
    fn test_key_order_is_ignored() {
        let a = Value::from(json!({"a": 1, "b": 2}));
        let b = Value::from(json!({"b": 2, "a": 1}));
        assert!(deep_equal(&a, &b));
    }

    #[test]
    fn test_sequence_vs_keyed() {
        let a = Value::from(json!([]));
        let b = Value::from(json!({}));
        assert!(!deep_equal(&a, &b));
    }

    #[test]
    fn test_cyclic_graphs_terminate() {
        let make = || {
            let a = Node::keyed(Map::new());
            let b = Node::keyed(Map::new());
            a.keyed_mut().unwrap().insert("b".into(), Value::Node(b.clone()));
            b.keyed_mut().unwrap().insert("a".into(), Value::Node(a.clone()));
            Value::Node(a)
        };
        assert!(deep_equal(&make(), &make()));
    }
}
