use std::cell::RefCell;
use std::rc::Rc;

use json_observer::{Change, ChangeRecord, Direction, LengthPrev, Observer, ObserverOptions, Tracked};
use json_observer_value::Value;
use proptest::prelude::*;
use serde_json::json;

#[derive(Debug, Clone)]
enum Op {
    Push(Vec<i64>),
    Unshift(Vec<i64>),
    Pop,
    Shift,
    Splice(i64, usize, Vec<i64>),
    Reverse,
    CopyWithin(i64, i64, Option<i64>),
    Fill(i64, i64, Option<i64>),
    Length(usize),
    Set(usize, i64),
    Delete(usize),
}

fn arb_items() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..20, 0..4)
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        arb_items().prop_map(Op::Push),
        arb_items().prop_map(Op::Unshift),
        Just(Op::Pop),
        Just(Op::Shift),
        (-8i64..8, 0usize..4, arb_items()).prop_map(|(s, d, i)| Op::Splice(s, d, i)),
        Just(Op::Reverse),
        (-8i64..8, -8i64..8, prop::option::of(-8i64..8)).prop_map(|(t, s, e)| Op::CopyWithin(t, s, e)),
        (0i64..20, -8i64..8, prop::option::of(-8i64..8)).prop_map(|(v, s, e)| Op::Fill(v, s, e)),
        (0usize..10).prop_map(Op::Length),
        (0usize..10, 0i64..20).prop_map(|(i, v)| Op::Set(i, v)),
        (0usize..10).prop_map(Op::Delete),
    ]
}

fn values(items: &[i64]) -> Vec<Value> {
    items.iter().copied().map(Value::from).collect()
}

fn recording(items: Vec<Value>) -> (Observer, Rc<RefCell<Vec<ChangeRecord>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let options = ObserverOptions::default().with_on_change(move |event| {
        sink.borrow_mut()
            .push(ChangeRecord::new(event.path(), event.change.deep_clone()));
    });
    let root = Value::sequence(items).into_node().unwrap();
    (Observer::new(root, options), log)
}

fn run(seq: &Tracked, op: &Op) {
    let len = seq.len();
    match op {
        Op::Push(items) => {
            seq.push(values(items));
        }
        Op::Unshift(items) => {
            seq.unshift(values(items));
        }
        Op::Pop => {
            seq.pop();
        }
        Op::Shift => {
            seq.shift();
        }
        Op::Splice(start, count, items) => {
            seq.splice(*start, *count, values(items));
        }
        Op::Reverse => {
            seq.reverse();
        }
        Op::CopyWithin(target, start, end) => {
            seq.copy_within(*target, *start, *end);
        }
        Op::Fill(value, start, end) => {
            seq.fill(*value, *start, *end);
        }
        Op::Length(n) => {
            seq.set_length(*n);
        }
        // single-member ops stay in range: a write past the end is padded
        // and its undo leaves the padding behind
        Op::Set(i, value) if len > 0 => {
            seq.set(&(i % len).to_string(), *value);
        }
        Op::Delete(i) if len > 0 => {
            seq.delete(&(i % len).to_string());
        }
        Op::Set(..) | Op::Delete(_) => {}
    }
}

fn snapshot(seq: &Tracked) -> Vec<Value> {
    seq.node().sequence_items().map(|items| items.clone()).unwrap_or_default()
}

proptest! {
    #[test]
    fn sequence_edits_undo_and_redo(start in arb_items(), ops in prop::collection::vec(arb_op(), 1..12)) {
        let (observer, log) = recording(values(&start));
        let seq = observer.root();
        let before = snapshot(&seq);
        for op in &ops {
            run(&seq, op);
        }
        let after = snapshot(&seq);
        let records = log.borrow().clone();

        observer.replay(Direction::Undo, &records, None).unwrap();
        prop_assert_eq!(snapshot(&seq), before.clone());

        observer.replay(Direction::Redo, &records, None).unwrap();
        prop_assert_eq!(snapshot(&seq), after);
    }

    #[test]
    fn each_edit_undoes_alone(start in arb_items(), op in arb_op()) {
        let (observer, log) = recording(values(&start));
        let seq = observer.root();
        let before = snapshot(&seq);
        run(&seq, &op);
        let records = log.borrow().clone();
        prop_assert!(records.len() <= 1);

        observer.replay(Direction::Undo, &records, None).unwrap();
        prop_assert_eq!(snapshot(&seq), before);
    }

    #[test]
    fn element_paths_follow_moves(count in 0usize..6, ops in prop::collection::vec(arb_op(), 1..12)) {
        let items: Vec<Value> = (0..count).map(|id| Value::from(json!({"id": id}))).collect();
        let (observer, _) = recording(items);
        let seq = observer.root();
        let elements: Vec<Tracked> = (0..count)
            .filter_map(|i| seq.get(&i.to_string()).into_tracked())
            .collect();
        for op in &ops {
            run(&seq, op);
        }
        seq.sort();

        let live = snapshot(&seq);
        for element in &elements {
            let node = element.to_value();
            if !live.iter().any(|v| v.same(&node)) {
                continue;
            }
            let path = element.path();
            let found = observer.retrieve(&path);
            prop_assert!(found.is_some_and(|v| v.same(&node)), "{} does not resolve to its element", path);
        }
    }

    #[test]
    fn sorting_distinct_elements_is_invertible(set in prop::collection::hash_set(0i64..1000, 0..12)) {
        let start: Vec<i64> = set.into_iter().collect();
        let (observer, log) = recording(values(&start));
        let seq = observer.root();
        seq.sort();
        let mut sorted = start.clone();
        sorted.sort_unstable();
        prop_assert_eq!(snapshot(&seq), values(&sorted));

        let records = log.borrow().clone();
        observer.replay(Direction::Undo, &records, None).unwrap();
        prop_assert_eq!(snapshot(&seq), values(&start));
        observer.replay(Direction::Redo, &records, None).unwrap();
        prop_assert_eq!(snapshot(&seq), values(&sorted));
    }
}

fn round_trip(start: &[i64], edit: impl FnOnce(&Tracked), expected: &[i64]) -> Vec<ChangeRecord> {
    let (observer, log) = recording(values(start));
    let seq = observer.root();
    edit(&seq);
    assert_eq!(snapshot(&seq), values(expected));
    let records = log.borrow().clone();
    observer.replay(Direction::Undo, &records, None).unwrap();
    assert_eq!(snapshot(&seq), values(start));
    observer.replay(Direction::Redo, &records, None).unwrap();
    assert_eq!(snapshot(&seq), values(expected));
    records
}

#[test]
fn splice_insert_at_front() {
    round_trip(
        &[1, 2, 3, 4, 5, 6, 7],
        |s| {
            s.splice(0, 0, values(&[8, 9]));
        },
        &[8, 9, 1, 2, 3, 4, 5, 6, 7],
    );
}

#[test]
fn sort_round_trip() {
    round_trip(
        &[1, 7, 6, 5, 4, 3, 2],
        |s| {
            s.sort();
        },
        &[1, 2, 3, 4, 5, 6, 7],
    );
}

#[test]
fn copy_within_window() {
    round_trip(
        &[1, 2, 3, 4, 5, 6, 7],
        |s| {
            s.copy_within(0, 3, Some(4));
        },
        &[4, 2, 3, 4, 5, 6, 7],
    );
}

#[test]
fn shrinking_length_keeps_the_tail() {
    let records = round_trip(
        &[1, 2, 3, 4, 5, 6, 7],
        |s| {
            s.set_length(3);
        },
        &[1, 2, 3],
    );
    assert_eq!(
        records[0].change,
        Change::Length {
            len: 3,
            prev: LengthPrev::Tail(values(&[4, 5, 6, 7])),
        }
    );
}
