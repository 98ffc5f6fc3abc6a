//! Sequence mutation normalizer.
//!
//! Each function mutates a `Vec<Value>` the way the corresponding array
//! method would and returns the canonical [`Change`] describing it, or
//! `None` when nothing changed. Index arguments follow the usual relative
//! rules: negative values count from the end and everything is clamped to
//! `[0, len]`.
//!
//! Change payloads hold the live values that were removed or inserted.
//! Anything that keeps a change around must copy it first
//! ([`Change::deep_clone`]).

use std::cmp::Ordering;

use json_observer_value::{compare, Value};

use crate::change::{Change, LengthPrev, SeqOp};

/// Hard ceiling on sequence indices and lengths.
pub const MAX_LENGTH: usize = u32::MAX as usize;

/// Default cap on how far a sequence may grow by a single index write or
/// length assignment. Both pad eagerly.
pub const DEFAULT_MAX_LEN: usize = 1 << 20;

/// Resolves a relative index against `len`.
fn relative(index: i64, len: usize) -> usize {
    if index < 0 {
        let from_end = len as i64 + index;
        if from_end < 0 {
            0
        } else {
            from_end as usize
        }
    } else if index >= len as i64 {
        len
    } else {
        index as usize
    }
}

pub fn splice(
    items: &mut Vec<Value>,
    start: i64,
    delete_count: Option<i64>,
    inserted: Vec<Value>,
) -> (Vec<Value>, Option<Change>) {
    let len = items.len();
    let start = relative(start, len);
    let available = len - start;
    let delete = match delete_count {
        None => available,
        Some(n) if n <= 0 => 0,
        Some(n) => (n as u64).min(available as u64) as usize,
    };
    let removed: Vec<Value> = items
        .splice(start..start + delete, inserted.iter().cloned())
        .collect();
    if removed.is_empty() && inserted.is_empty() {
        return (removed, None);
    }
    let change = Change::Splice {
        start,
        deleted: removed.clone(),
        inserted,
    };
    (removed, Some(change))
}

pub fn push(items: &mut Vec<Value>, values: Vec<Value>) -> (usize, Option<Change>) {
    let end = items.len() as i64;
    let (_, change) = splice(items, end, Some(0), values);
    (items.len(), change)
}

pub fn pop(items: &mut Vec<Value>) -> (Value, Option<Change>) {
    let (mut removed, change) = splice(items, -1, Some(1), Vec::new());
    (removed.pop().unwrap_or_default(), change)
}

pub fn shift(items: &mut Vec<Value>) -> (Value, Option<Change>) {
    let (mut removed, change) = splice(items, 0, Some(1), Vec::new());
    (removed.pop().unwrap_or_default(), change)
}

pub fn unshift(items: &mut Vec<Value>, values: Vec<Value>) -> (usize, Option<Change>) {
    let (_, change) = splice(items, 0, Some(0), values);
    (items.len(), change)
}

/// Stable sort with the default value ordering.
pub fn sort(items: &mut Vec<Value>) -> Option<Change> {
    sort_by(items, compare)
}

/// Stable sort with a caller-supplied comparator.
///
/// The recorded map pairs each moved element's new index with the index at
/// which it was first found in the unsorted copy. Duplicates all point at
/// the first equal element, so replaying the map over duplicates is best
/// effort: undo fills every slot of a run from its first source and may not
/// restore the original order. Maps over distinct elements invert exactly.
pub fn sort_by<F>(items: &mut Vec<Value>, mut compare: F) -> Option<Change>
where
    F: FnMut(&Value, &Value) -> Ordering,
{
    let before = items.clone();
    items.sort_by(&mut compare);
    let map: Vec<(usize, usize)> = items
        .iter()
        .enumerate()
        .filter_map(|(index, elem)| {
            let prev = before.iter().position(|e| e.same(elem)).unwrap_or(index);
            (prev != index).then_some((index, prev))
        })
        .collect();
    if map.is_empty() {
        None
    } else {
        Some(Change::Sort { map })
    }
}

/// Reverses in place. Always reported, even for short sequences.
pub fn reverse(items: &mut Vec<Value>) -> Change {
    items.reverse();
    Change::Reverse
}

/// Copies `[start, end)` over the elements starting at `target`.
///
/// A missing `target` (not a number) makes the call a no-op; a missing
/// `start` is 0 and a missing `end` is the length.
pub fn copy_within(
    items: &mut [Value],
    target: Option<i64>,
    start: Option<i64>,
    end: Option<i64>,
) -> Option<Change> {
    let len = items.len();
    let target = relative(target?, len);
    let from = relative(start.unwrap_or(0), len);
    let to = end.map_or(len, |e| relative(e, len));
    let count = to.saturating_sub(from).min(len - target);
    if count == 0 {
        return None;
    }
    let overwritten = items[target..target + count].to_vec();
    let source = items[from..from + count].to_vec();
    items[target..target + count].clone_from_slice(&source);
    Some(Change::CopyWithin {
        target,
        start: from,
        overwritten,
    })
}

/// Overwrites `[start, end)` with `value`. A missing `end` is the length.
pub fn fill(items: &mut [Value], value: Value, start: i64, end: Option<i64>) -> Option<Change> {
    let len = items.len();
    let from = relative(start, len);
    let to = end.map_or(len, |e| relative(e, len));
    if to <= from {
        return None;
    }
    let overwritten = items[from..to].to_vec();
    for slot in &mut items[from..to] {
        *slot = value.clone();
    }
    Some(Change::Fill {
        value,
        start: from,
        overwritten,
    })
}

/// Truncates or pads (with `Undefined`) to `len`.
///
/// Shrinking records the removed tail; growing records the old length.
pub fn set_length(items: &mut Vec<Value>, len: usize) -> Option<Change> {
    let old = items.len();
    if len == old {
        return None;
    }
    let prev = if len < old {
        LengthPrev::Tail(items.split_off(len))
    } else {
        items.resize(len, Value::Undefined);
        LengthPrev::Len(old)
    };
    Some(Change::Length { len, prev })
}

/// Interprets a loosely typed length: a non-negative integer no larger
/// than `max_len` (itself capped at [`MAX_LENGTH`]).
pub fn parse_length(value: &Value, max_len: usize) -> Option<usize> {
    let n = value.to_number()?;
    if n < 0.0 || n.fract() != 0.0 || n > max_len.min(MAX_LENGTH) as f64 {
        return None;
    }
    Some(n as usize)
}

// ── Loosely typed calls ───────────────────────────────────────────────────

/// What a sequence call hands back to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    /// Malformed arguments; nothing happened.
    Nothing,
    /// Elements removed by `splice`.
    Removed(Vec<Value>),
    /// Element removed by `pop`/`shift` (`Undefined` if empty).
    Element(Value),
    /// New length after `push`/`unshift`.
    Length(usize),
    /// The sequence itself, after `sort`/`reverse`/`copyWithin`/`fill`.
    Itself,
    /// A length assignment was accepted.
    Assigned,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub result: CallResult,
    pub change: Option<Change>,
}

impl Outcome {
    fn nothing() -> Self {
        Outcome {
            result: CallResult::Nothing,
            change: None,
        }
    }
}

fn optional_integer(args: &[Value], i: usize, nan: Option<i64>) -> Option<i64> {
    match args.get(i) {
        None | Some(Value::Undefined) => None,
        Some(v) => v.to_integer().or(nan),
    }
}

/// Runs `op` with loosely typed arguments, the way a dynamic call site
/// would pass them.
///
/// Numeric arguments are coerced with [`Value::to_integer`]. A start or
/// target that is not a number turns the call into a no-op. `compare` is
/// only used by [`SeqOp::Sort`]; without it the default ordering applies.
/// A length above `max_len` is rejected like a malformed one.
pub fn call(
    items: &mut Vec<Value>,
    op: SeqOp,
    mut args: Vec<Value>,
    compare: Option<&mut dyn FnMut(&Value, &Value) -> Ordering>,
    max_len: usize,
) -> Outcome {
    match op {
        SeqOp::Splice => {
            let Some(start) = args.first().and_then(Value::to_integer) else {
                return Outcome::nothing();
            };
            let delete_count = match args.get(1) {
                None => None,
                Some(v) => Some(v.to_integer().unwrap_or(0)),
            };
            let inserted = if args.len() > 2 { args.split_off(2) } else { Vec::new() };
            let (removed, change) = splice(items, start, delete_count, inserted);
            Outcome {
                result: CallResult::Removed(removed),
                change,
            }
        }
        SeqOp::Push => {
            let (len, change) = push(items, args);
            Outcome {
                result: CallResult::Length(len),
                change,
            }
        }
        SeqOp::Unshift => {
            let (len, change) = unshift(items, args);
            Outcome {
                result: CallResult::Length(len),
                change,
            }
        }
        SeqOp::Pop => {
            let (elem, change) = pop(items);
            Outcome {
                result: CallResult::Element(elem),
                change,
            }
        }
        SeqOp::Shift => {
            let (elem, change) = shift(items);
            Outcome {
                result: CallResult::Element(elem),
                change,
            }
        }
        SeqOp::Sort => {
            let change = match compare {
                Some(cmp) => sort_by(items, cmp),
                None => sort(items),
            };
            Outcome {
                result: CallResult::Itself,
                change,
            }
        }
        SeqOp::Reverse => Outcome {
            result: CallResult::Itself,
            change: Some(reverse(items)),
        },
        SeqOp::CopyWithin => {
            let Some(target) = args.first().and_then(Value::to_integer) else {
                return Outcome::nothing();
            };
            let start = optional_integer(&args, 1, Some(0));
            let end = optional_integer(&args, 2, None);
            Outcome {
                result: CallResult::Itself,
                change: copy_within(items, Some(target), start, end),
            }
        }
        SeqOp::Fill => {
            let value = args.first().cloned().unwrap_or_default();
            let start = optional_integer(&args, 1, Some(0)).unwrap_or(0);
            let end = optional_integer(&args, 2, Some(0));
            Outcome {
                result: CallResult::Itself,
                change: fill(items, value, start, end),
            }
        }
        SeqOp::Length => match args.first().and_then(|v| parse_length(v, max_len)) {
            Some(len) => Outcome {
                result: CallResult::Assigned,
                change: set_length(items, len),
            },
            None => Outcome::nothing(),
        },
    }
}
