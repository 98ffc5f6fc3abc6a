use json_observer::{HistoryConfig, HistoryFilter, HistoryObserver, ManualClock, ObserverOptions, SerializedHistory};
use json_observer_value::Value;
use serde_json::{json, Value as Json};

fn source() -> Json {
    json!({
        "boolean": true,
        "string": "data",
        "number": 231321,
        "object": {"string": "data", "number": 32434},
        "array": [1, 2, 3, 4]
    })
}

fn with_history(doc: Json, config: HistoryConfig) -> HistoryObserver {
    let doc = Value::from(doc).into_node().unwrap();
    HistoryObserver::new(doc, ObserverOptions::default(), config)
}

#[test]
fn change_undo_redo() {
    let o = with_history(source(), HistoryConfig::default().with_coalesce_window_ms(100));
    let initial = o.root().to_json();

    let root = o.root();
    root.set("string", "ello");
    let array = root.get("array").into_tracked().unwrap();
    array.push([Value::from(json!({"id": "baz", "foo": "blaah"}))]);
    array.get("4").into_tracked().unwrap().set("foo", "ello!");
    let changed = o.root().to_json();

    let commit = o.commit_changes("test").unwrap();
    assert_eq!(commit.changes.len(), 3);

    o.undo();
    assert_eq!(o.root().to_json(), initial);
    o.redo();
    assert_eq!(o.root().to_json(), changed);
}

#[test]
fn repeated_commits_coalesce_within_window() {
    let clock = ManualClock::new(0);
    let config = HistoryConfig::default()
        .with_coalesce_window_ms(100)
        .with_clock(clock.clone());
    let o = with_history(source(), config);
    let root = o.root();

    root.set("string", "hello");
    o.commit_changes("test");
    root.set("string", "hello1");
    o.commit_changes("test");
    let status = o.history_status();
    assert_eq!(status.stack.len(), 1);
    assert_eq!(status.stack[0].changes.len(), 1);

    clock.advance(150);
    root.set("string", "hello2");
    o.commit_changes("test");
    assert_eq!(o.history_status().stack.len(), 2);

    assert!(o.commit_changes("test").is_none());
    assert_eq!(o.history_status().stack.len(), 2);
}

#[test]
fn coalesced_commit_replaces_the_top() {
    let clock = ManualClock::new(0);
    let config = HistoryConfig::default()
        .with_coalesce_window_ms(100)
        .with_clock(clock.clone());
    let o = with_history(json!({"s": "a"}), config);
    let root = o.root();

    root.set("s", "b");
    o.commit_changes("drag");
    clock.advance(50);
    root.set("s", "c");
    o.commit_changes("drag");

    let status = o.history_status();
    assert_eq!(status.stack.len(), 1);
    assert_eq!(status.stack[0].changes.len(), 1);
    assert_eq!(status.pos, 0);

    o.undo();
    assert_eq!(o.root().to_json(), json!({"s": "b"}));
    assert!(o.undo().is_none());
    o.redo();
    assert_eq!(o.root().to_json(), json!({"s": "c"}));
}

#[test]
fn different_descriptions_do_not_coalesce() {
    let o = with_history(source(), HistoryConfig::default().with_clock(ManualClock::new(0)));
    let root = o.root();
    root.set("number", 1);
    o.commit_changes("first");
    root.set("number", 2);
    o.commit_changes("second");

    let status = o.history_status();
    assert_eq!(status.stack.len(), 2);
    assert_eq!(status.undo.as_deref(), Some("second"));
    assert_eq!(status.redo, None);
}

#[test]
fn depth_bound_evicts_oldest() {
    let max = 3;
    let o = with_history(json!({"n": 0}), HistoryConfig::default().with_max_depth(max).with_coalesce_window_ms(0));
    let root = o.root();
    for n in 1..=max + 1 {
        root.set("n", n);
        o.commit_changes(&format!("set {n}"));
    }
    let status = o.history_status();
    assert_eq!(status.stack.len(), max);
    assert_eq!(status.pos, max as i64 - 1);
    assert_eq!(status.stack[0].description, "set 2");

    while o.undo().is_some() {}
    assert_eq!(root.get("n").to_value(), Value::from(1));
}

#[test]
fn redo_waits_for_pending_changes() {
    let o = with_history(source(), HistoryConfig::default());
    let root = o.root();
    root.set("boolean", false);
    o.commit_changes("flip");
    o.undo();

    root.set("number", 0);
    assert!(o.redo().is_none());
    assert_eq!(root.get("boolean").to_value(), Value::from(true));

    o.commit_changes("number");
    assert_eq!(o.history_status().stack.len(), 1);
    assert!(o.redo().is_none());
}

#[test]
fn paused_history_records_nothing() {
    let o = with_history(source(), HistoryConfig::default());
    o.pause();
    o.root().set("string", "quiet");
    assert!(o.commit_changes("quiet").is_none());

    o.endure();
    o.root().set("string", "loud");
    assert!(o.commit_changes("loud").is_some());
}

#[test]
fn predicate_filter_skips_rejected_paths() {
    let config = HistoryConfig::default().with_filter(HistoryFilter::predicate(|path: &str| !path.starts_with("object")));
    let o = with_history(source(), config);
    let root = o.root();
    root.get("object").into_tracked().unwrap().set("string", "hidden");
    root.set("string", "seen");
    root.get("array").into_tracked().unwrap().pop();

    let commit = o.commit_changes("mixed").unwrap();
    let paths: Vec<&str> = commit.changes.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["", "array"]);

    o.undo();
    assert_eq!(root.get("string").to_value(), Value::from("data"));
    assert_eq!(root.get("object").into_tracked().unwrap().get("string").to_value(), Value::from("hidden"));
}

#[test]
fn serialized_history_survives_json() {
    let o = with_history(source(), HistoryConfig::default());
    let array = o.root().get("array").into_tracked().unwrap();
    array.splice(1, 2, vec![Value::from("x")]);
    array.reverse();
    o.commit_changes_with("edit", json!({"user": 7}));
    let edited = o.root().to_json();

    let stored = serde_json::to_value(o.serialize_history()).unwrap();
    assert_eq!(stored["pos"], json!(0));
    assert_eq!(stored["stack"][0]["meta"], json!({"user": 7}));

    let restored: SerializedHistory = serde_json::from_value(stored).unwrap();
    let copy = with_history(edited, HistoryConfig::default());
    copy.set_history(restored);
    copy.undo();
    assert_eq!(copy.root().to_json(), source());
}

#[test]
fn user_callback_sees_changes_too() {
    use std::cell::Cell;
    use std::rc::Rc;

    let seen = Rc::new(Cell::new(0));
    let counter = Rc::clone(&seen);
    let options = ObserverOptions::default().with_on_change(move |_| counter.set(counter.get() + 1));
    let doc = Value::from(source()).into_node().unwrap();
    let o = HistoryObserver::new(doc, options, HistoryConfig::default());

    o.root().set("string", "x");
    o.root().delete("boolean");
    assert_eq!(seen.get(), 2);
    assert_eq!(o.commit_changes("two").unwrap().changes.len(), 2);
}

#[test]
fn changes_while_the_history_is_borrowed_are_not_recorded() {
    let o = with_history(source(), HistoryConfig::default());
    let root = o.root();
    o.with_history(|_| root.set("string", "busy"));
    assert_eq!(root.get("string").to_value(), Value::from("busy"));
    assert!(o.commit_changes("busy").is_none());

    root.set("string", "free");
    assert!(o.commit_changes("free").is_some());
}
