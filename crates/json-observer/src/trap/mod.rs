//! Mutation normalizers.
//!
//! The normalizers perform one mutation and reduce it to at most one
//! canonical [`Change`](crate::change::Change):
//!
//! - [`sequence`] handles every ordered-sequence mutation on a plain
//!   `Vec<Value>`.
//! - [`keyed`] handles single-member writes and deletes on a node, running
//!   the [`Validator`] in between capturing the previous value and storing.
//!
//! Neither module knows about observers, paths or callbacks.

pub mod keyed;
pub mod sequence;

use json_observer_value::{Node, Value};

use crate::change::{KeyOp, SeqOp};

/// Single-field box a validator may rewrite to coerce a value before it is
/// stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueBox {
    pub value: Value,
}

impl ValueBox {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

/// Policy hook consulted before every tracked mutation.
///
/// Both methods approve by default. Validators run synchronously inside
/// the mutation and must not mutate the graph they are guarding.
pub trait Validator {
    /// Gate a keyed `set` or `delete`. `value` may be rewritten; the final
    /// content of the box is what gets stored and recorded.
    fn validate_key(
        &self,
        _target: &Node,
        _op: KeyOp,
        _key: &str,
        _value: &mut ValueBox,
        _prev: &Value,
    ) -> bool {
        true
    }

    /// Gate a sequence call. The argument list may be rewritten in place.
    fn validate_call(&self, _target: &Node, _op: SeqOp, _args: &mut Vec<Value>) -> bool {
        true
    }
}

/// Validator that approves everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Validator for AllowAll {}

/// Adapts a closure into a keyed-only [`Validator`].
pub struct ValidateKeys<F>(pub F);

impl<F> Validator for ValidateKeys<F>
where
    F: Fn(&Node, KeyOp, &str, &mut ValueBox, &Value) -> bool,
{
    fn validate_key(&self, target: &Node, op: KeyOp, key: &str, value: &mut ValueBox, prev: &Value) -> bool {
        (self.0)(target, op, key, value, prev)
    }
}

/// Adapts a closure into a call-only [`Validator`].
pub struct ValidateCalls<F>(pub F);

impl<F> Validator for ValidateCalls<F>
where
    F: Fn(&Node, SeqOp, &mut Vec<Value>) -> bool,
{
    fn validate_call(&self, target: &Node, op: SeqOp, args: &mut Vec<Value>) -> bool {
        (self.0)(target, op, args)
    }
}
