use std::cmp::Ordering;

use crate::Value;

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Node(_) => 4,
        Value::Undefined => 5,
    }
}

/// Default ordering used when a sequence is sorted without a comparator.
///
/// Values order by type first (`null < bool < number < string < node`),
/// then by content; nodes order by identity. `Undefined` always sorts
/// last.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Node(x), Value::Node(y)) => x.id().cmp(&y.id()),
        _ => rank(a).cmp(&rank(b)),
    }
}
