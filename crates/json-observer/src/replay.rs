//! Change replay.
//!
//! Applies recorded changes to raw nodes, forward ([`redo`]) or backward
//! ([`undo`]). Replay reads only the record, never what the live state was,
//! and clamps every index to the current bounds so that a record replayed
//! against a diverged graph degrades instead of panicking.
//!
//! Payloads are deep-cloned on the way in, so the graph never shares nodes
//! with the records it was rebuilt from.

use std::fmt;
use std::rc::Rc;

use json_observer_path::{find_node, PathError};
use json_observer_value::{Node, Value};
use thiserror::Error;
use tracing::warn;

use crate::change::{Change, ChangeRecord, LengthPrev};
use crate::trap::{keyed, sequence};

/// Which way a record is replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Undo,
    Redo,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Undo => "undo",
            Direction::Redo => "redo",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rehydrates a decoded payload element before it is put back into
/// `target`. Applied to splice payloads, a restored length tail and
/// restored `copyWithin` elements.
pub type Reconstruct = Rc<dyn Fn(&Node, Value) -> Value>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("NOT_SEQUENCE: {0}")]
    NotSequence(&'static str),
}

fn rehydrate(target: &Node, items: &[Value], reconstruct: Option<&Reconstruct>) -> Vec<Value> {
    items
        .iter()
        .map(|item| {
            let item = item.deep_clone();
            match reconstruct {
                Some(f) => f(target, item),
                None => item,
            }
        })
        .collect()
}

fn restore_member(target: &Node, key: &str, prev: &Value) {
    if prev.is_undefined() && target.is_keyed() {
        keyed::remove_member(target, key);
    } else {
        keyed::write_member(target, key, prev.deep_clone());
    }
}

/// Reverts `change` on `target`.
///
/// # Errors
///
/// `ReplayError::NotSequence` if a sequence change meets a keyed node.
pub fn undo(target: &Node, change: &Change, reconstruct: Option<&Reconstruct>) -> Result<(), ReplayError> {
    match change {
        Change::Set { key, prev, .. } | Change::Delete { key, prev, .. } => {
            restore_member(target, key, prev);
            return Ok(());
        }
        _ => {}
    }
    if !target.is_sequence() {
        return Err(ReplayError::NotSequence(change.op_name()));
    }
    // The hook may read the target, so payloads are rebuilt before borrowing it.
    let restored = match change {
        Change::Splice { deleted, .. } => rehydrate(target, deleted, reconstruct),
        Change::CopyWithin { overwritten, .. } => rehydrate(target, overwritten, reconstruct),
        Change::Length {
            prev: LengthPrev::Tail(tail),
            ..
        } => rehydrate(target, tail, reconstruct),
        _ => Vec::new(),
    };
    let mut items = target
        .sequence_mut()
        .ok_or(ReplayError::NotSequence(change.op_name()))?;
    let len = items.len();
    match change {
        Change::Splice { start, inserted, .. } => {
            let start = (*start).min(len);
            let end = (start + inserted.len()).min(len);
            drop(items.splice(start..end, restored));
        }
        Change::Sort { map } => {
            let copy = items.clone();
            for &(new, old) in map {
                if new < len && old < len {
                    items[old] = copy[new].clone();
                }
            }
        }
        Change::Reverse => items.reverse(),
        Change::CopyWithin { target: at, .. } => {
            for (i, value) in restored.into_iter().enumerate() {
                if let Some(slot) = items.get_mut(at + i) {
                    *slot = value;
                }
            }
        }
        Change::Fill {
            start, overwritten, ..
        } => {
            for (i, value) in overwritten.iter().enumerate() {
                if let Some(slot) = items.get_mut(start + i) {
                    *slot = value.deep_clone();
                }
            }
        }
        Change::Length { len: new_len, prev } => match prev {
            LengthPrev::Tail(_) => {
                let at = (*new_len).min(len);
                drop(items.splice(at..at, restored));
            }
            LengthPrev::Len(old) => {
                sequence::set_length(&mut items, *old);
            }
        },
        Change::Set { .. } | Change::Delete { .. } => {}
    }
    Ok(())
}

/// Applies `change` to `target` again.
///
/// # Errors
///
/// `ReplayError::NotSequence` if a sequence change meets a keyed node.
pub fn redo(target: &Node, change: &Change, reconstruct: Option<&Reconstruct>) -> Result<(), ReplayError> {
    match change {
        Change::Set { key, value, .. } => {
            keyed::write_member(target, key, value.deep_clone());
            return Ok(());
        }
        Change::Delete { key, .. } => {
            keyed::remove_member(target, key);
            return Ok(());
        }
        _ => {}
    }
    let restored = match change {
        Change::Splice { inserted, .. } if target.is_sequence() => rehydrate(target, inserted, reconstruct),
        _ => Vec::new(),
    };
    let mut items = target
        .sequence_mut()
        .ok_or(ReplayError::NotSequence(change.op_name()))?;
    let len = items.len();
    match change {
        Change::Splice { start, deleted, .. } => {
            let start = (*start).min(len);
            let end = (start + deleted.len()).min(len);
            drop(items.splice(start..end, restored));
        }
        Change::Sort { map } => {
            let mut sorted = items.clone();
            for &(new, old) in map {
                if new < len && old < len {
                    sorted[new] = items[old].clone();
                }
            }
            *items = sorted;
        }
        Change::Reverse => items.reverse(),
        Change::CopyWithin {
            target: at,
            start,
            overwritten,
        } => {
            let end = start + overwritten.len();
            sequence::copy_within(&mut items, Some(*at as i64), Some(*start as i64), Some(end as i64));
        }
        Change::Fill {
            value,
            start,
            overwritten,
        } => {
            let end = start + overwritten.len();
            sequence::fill(&mut items, value.deep_clone(), *start as i64, Some(end as i64));
        }
        Change::Length { len: new_len, .. } => {
            sequence::set_length(&mut items, *new_len);
        }
        Change::Set { .. } | Change::Delete { .. } => {}
    }
    Ok(())
}

pub fn apply(
    target: &Node,
    direction: Direction,
    change: &Change,
    reconstruct: Option<&Reconstruct>,
) -> Result<(), ReplayError> {
    match direction {
        Direction::Undo => undo(target, change, reconstruct),
        Direction::Redo => redo(target, change, reconstruct),
    }
}

/// Replays a batch of records against `root`.
///
/// Undo walks the batch last to first, redo first to last, so edits at
/// different depths unwind in the order they were made.
///
/// # Errors
///
/// Stops at the first record whose path does not resolve to a node or
/// whose operation does not fit the node.
pub fn apply_changes(
    root: &Node,
    direction: Direction,
    records: &[ChangeRecord],
    reconstruct: Option<&Reconstruct>,
) -> Result<(), ReplayError> {
    apply_changes_visiting(root, direction, records, reconstruct, |_| {})
}

/// [`apply_changes`], calling `visit` with each target after its record
/// was applied.
pub fn apply_changes_visiting<F>(
    root: &Node,
    direction: Direction,
    records: &[ChangeRecord],
    reconstruct: Option<&Reconstruct>,
    mut visit: F,
) -> Result<(), ReplayError>
where
    F: FnMut(&Node),
{
    let mut step = |record: &ChangeRecord| -> Result<(), ReplayError> {
        let result = find_node(root, &record.path)
            .map_err(ReplayError::from)
            .and_then(|target| {
                apply(&target, direction, &record.change, reconstruct)?;
                visit(&target);
                Ok(())
            });
        if let Err(err) = &result {
            warn!(
                path = %record.path,
                op = record.change.op_name(),
                direction = %direction,
                error = %err,
                "cannot replay record"
            );
        }
        result
    };
    match direction {
        Direction::Undo => records.iter().rev().try_for_each(&mut step),
        Direction::Redo => records.iter().try_for_each(&mut step),
    }
}
