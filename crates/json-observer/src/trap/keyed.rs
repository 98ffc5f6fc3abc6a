//! Keyed mutation normalizer.
//!
//! Single-member writes and deletes on a node of either kind. Sequence
//! members are addressed by canonical decimal indices; a write past the end
//! pads the gap with `Undefined`, up to the caller's length cap.

use json_observer_value::{parse_index, Node, Value};

use super::sequence::MAX_LENGTH;
use super::{Validator, ValueBox};
use crate::change::{Change, KeyOp};

/// Result of a keyed mutation.
///
/// `approved` is what the mutating entry point reports. `change` is the
/// record describing what happened, if anything did.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyOutcome {
    pub approved: bool,
    pub change: Option<Change>,
}

impl KeyOutcome {
    fn rejected() -> Self {
        KeyOutcome {
            approved: false,
            change: None,
        }
    }
}

/// Current member under `key`, `Undefined` when absent.
pub fn read_member(target: &Node, key: &str) -> Value {
    target.get(key).unwrap_or_default()
}

/// Whether `key` can address a member of `target` without growing a
/// sequence past `max_len` elements.
pub fn is_storable(target: &Node, key: &str, max_len: usize) -> bool {
    target.is_keyed() || parse_index(key).is_some_and(|i| i < max_len.min(MAX_LENGTH))
}

/// Stores `value` under `key` without validation or recording.
///
/// Returns `false` if `key` is not a valid index of a sequence target.
pub fn write_member(target: &Node, key: &str, value: Value) -> bool {
    if let Some(mut map) = target.keyed_mut() {
        map.insert(key.to_string(), value);
        return true;
    }
    let Some(index) = parse_index(key).filter(|&i| i < MAX_LENGTH) else {
        return false;
    };
    let Some(mut items) = target.sequence_mut() else {
        return false;
    };
    if index >= items.len() {
        items.resize(index + 1, Value::Undefined);
    }
    items[index] = value;
    true
}

/// Removes `key` without validation or recording.
///
/// Keyed members are removed preserving the order of the rest. A sequence
/// slot is left in place and reset to `Undefined`. Returns whether a member
/// existed.
pub fn remove_member(target: &Node, key: &str) -> bool {
    if let Some(mut map) = target.keyed_mut() {
        return map.shift_remove(key).is_some();
    }
    match (parse_index(key), target.sequence_mut()) {
        (Some(index), Some(mut items)) if index < items.len() => {
            items[index] = Value::Undefined;
            true
        }
        _ => false,
    }
}

/// Validated write of `key`.
///
/// The validator sees the proposed value in a [`ValueBox`] and may replace
/// it; the final box content is stored and recorded as `value`. A sequence
/// index at or past `max_len` is rejected before the validator runs.
pub fn set_property(
    target: &Node,
    key: &str,
    value: Value,
    validator: &dyn Validator,
    max_len: usize,
) -> KeyOutcome {
    if !is_storable(target, key, max_len) {
        return KeyOutcome::rejected();
    }
    let prev = read_member(target, key);
    let mut boxed = ValueBox::new(value);
    if !validator.validate_key(target, KeyOp::Set, key, &mut boxed, &prev) {
        return KeyOutcome::rejected();
    }
    let value = boxed.value;
    write_member(target, key, value.clone());
    KeyOutcome {
        approved: true,
        change: Some(Change::Set {
            key: key.to_string(),
            value,
            prev,
        }),
    }
}

/// Validated delete of `key`.
///
/// The validator receives an `Undefined` box. On approval the member is
/// removed and a `Delete` is recorded with the box content as `value`. On
/// rejection nothing is removed, but a `Delete` is still recorded when the
/// validator put a defined value into the box that differs from the live
/// member.
pub fn delete_property(target: &Node, key: &str, validator: &dyn Validator) -> KeyOutcome {
    let prev = read_member(target, key);
    let mut boxed = ValueBox::default();
    let approved = validator.validate_key(target, KeyOp::Delete, key, &mut boxed, &prev);
    let changed = if approved {
        remove_member(target, key);
        true
    } else {
        !boxed.value.is_undefined() && !boxed.value.same(&prev)
    };
    KeyOutcome {
        approved,
        change: changed.then(|| Change::Delete {
            key: key.to_string(),
            value: boxed.value,
            prev,
        }),
    }
}
