//! Canonical change records.
//!
//! Every externally visible mutation of an observed graph is reduced to one
//! [`Change`]. A change carries everything needed to apply it again or to
//! revert it, so replay never has to read the live state it is undoing.
//!
//! Sequence mutations `push`, `pop`, `shift` and `unshift` never appear as
//! their own variants: they are reported as [`Change::Splice`].

pub mod codec;

use json_observer_value::Value;

pub use codec::{from_json, to_json, CodecError};

// ── Operation names ───────────────────────────────────────────────────────

/// Keyed operations seen by a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyOp {
    Set,
    Delete,
}

impl KeyOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyOp::Set => "set",
            KeyOp::Delete => "delete",
        }
    }
}

/// Sequence-mutating calls an observer intercepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeqOp {
    Splice,
    Sort,
    Reverse,
    CopyWithin,
    Pop,
    Push,
    Unshift,
    Shift,
    Length,
    Fill,
}

impl SeqOp {
    pub const ALL: [SeqOp; 10] = [
        SeqOp::Splice,
        SeqOp::Sort,
        SeqOp::Reverse,
        SeqOp::CopyWithin,
        SeqOp::Pop,
        SeqOp::Push,
        SeqOp::Unshift,
        SeqOp::Shift,
        SeqOp::Length,
        SeqOp::Fill,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeqOp::Splice => "splice",
            SeqOp::Sort => "sort",
            SeqOp::Reverse => "reverse",
            SeqOp::CopyWithin => "copyWithin",
            SeqOp::Pop => "pop",
            SeqOp::Push => "push",
            SeqOp::Unshift => "unshift",
            SeqOp::Shift => "shift",
            SeqOp::Length => "length",
            SeqOp::Fill => "fill",
        }
    }

    /// Resolves a method name such as `"copyWithin"`.
    pub fn from_name(name: &str) -> Option<SeqOp> {
        SeqOp::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

// ── Change ────────────────────────────────────────────────────────────────

/// What a `length` change replaced.
#[derive(Debug, Clone, PartialEq)]
pub enum LengthPrev {
    /// The sequence shrank; these are the removed trailing elements.
    Tail(Vec<Value>),
    /// The sequence grew; this was its old length.
    Len(usize),
}

/// One canonical, invertible mutation of a single node.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// A key (or sequence index) was written.
    Set { key: String, value: Value, prev: Value },
    /// A key was deleted. `value` is the validator's substitute, usually
    /// `Undefined`.
    Delete { key: String, value: Value, prev: Value },
    Splice {
        start: usize,
        deleted: Vec<Value>,
        inserted: Vec<Value>,
    },
    /// Pairs of `(new_index, old_index)` for every element that moved.
    Sort { map: Vec<(usize, usize)> },
    Reverse,
    CopyWithin {
        target: usize,
        start: usize,
        overwritten: Vec<Value>,
    },
    Fill {
        value: Value,
        start: usize,
        overwritten: Vec<Value>,
    },
    Length { len: usize, prev: LengthPrev },
}

impl Change {
    /// The operation name used in the tuple encoding.
    pub fn op_name(&self) -> &'static str {
        match self {
            Change::Set { .. } => "set",
            Change::Delete { .. } => "delete",
            Change::Splice { .. } => "splice",
            Change::Sort { .. } => "sort",
            Change::Reverse => "reverse",
            Change::CopyWithin { .. } => "copyWithin",
            Change::Fill { .. } => "fill",
            Change::Length { .. } => "length",
        }
    }

    /// `true` for `set`/`delete`, which address a single member of a node of
    /// either kind. Everything else only applies to sequences.
    pub fn is_keyed(&self) -> bool {
        matches!(self, Change::Set { .. } | Change::Delete { .. })
    }

    /// Copies the change so that no payload shares nodes with the graph it
    /// was taken from.
    pub fn deep_clone(&self) -> Change {
        let all = |items: &[Value]| items.iter().map(Value::deep_clone).collect::<Vec<_>>();
        match self {
            Change::Set { key, value, prev } => Change::Set {
                key: key.clone(),
                value: value.deep_clone(),
                prev: prev.deep_clone(),
            },
            Change::Delete { key, value, prev } => Change::Delete {
                key: key.clone(),
                value: value.deep_clone(),
                prev: prev.deep_clone(),
            },
            Change::Splice {
                start,
                deleted,
                inserted,
            } => Change::Splice {
                start: *start,
                deleted: all(deleted),
                inserted: all(inserted),
            },
            Change::Sort { map } => Change::Sort { map: map.clone() },
            Change::Reverse => Change::Reverse,
            Change::CopyWithin {
                target,
                start,
                overwritten,
            } => Change::CopyWithin {
                target: *target,
                start: *start,
                overwritten: all(overwritten),
            },
            Change::Fill {
                value,
                start,
                overwritten,
            } => Change::Fill {
                value: value.deep_clone(),
                start: *start,
                overwritten: all(overwritten),
            },
            Change::Length { len, prev } => Change::Length {
                len: *len,
                prev: match prev {
                    LengthPrev::Tail(tail) => LengthPrev::Tail(all(tail)),
                    LengthPrev::Len(n) => LengthPrev::Len(*n),
                },
            },
        }
    }
}

/// A change addressed by the slash-delimited path of the node it mutated.
///
/// For `set`/`delete` the path names the container, not the member: the
/// member's key travels inside the change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub path: String,
    pub change: Change,
}

impl ChangeRecord {
    pub fn new(path: impl Into<String>, change: Change) -> Self {
        Self {
            path: path.into(),
            change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_seq_op_names_round_trip() {
        for op in SeqOp::ALL {
            assert_eq!(SeqOp::from_name(op.as_str()), Some(op));
        }
        assert_eq!(SeqOp::from_name("map"), None);
    }

    #[test]
    fn test_deep_clone_detaches_payloads() {
        let inserted = Value::from(json!({"id": 1}));
        let change = Change::Splice {
            start: 0,
            deleted: vec![],
            inserted: vec![inserted.clone()],
        };
        let copy = change.deep_clone();
        assert_eq!(copy, change);
        let Change::Splice { inserted: copied, .. } = &copy else {
            unreachable!()
        };
        assert!(!copied[0].same(&inserted));
    }

    #[test]
    fn test_is_keyed() {
        assert!(Change::Set {
            key: "a".into(),
            value: Value::Null,
            prev: Value::Undefined
        }
        .is_keyed());
        assert!(!Change::Reverse.is_keyed());
    }
}
