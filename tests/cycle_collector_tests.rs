use std::sync::Arc;

use naab::runtime::{
    environment::Environment,
    gc::{CycleCollector, ValueTracker},
    value::Value,
};

#[test]
fn test_unreachable_cycle_is_reclaimed_in_one_pass() {
    let tracker = ValueTracker::new();
    let collector = CycleCollector::new();

    let array = tracker.array(vec![]);
    let dict = tracker.dict(Default::default());
    if let Value::Array(elements) = &*array {
        elements.write().push(dict.clone());
    }
    if let Value::Dict(entries) = &*dict {
        entries.write().insert("back".to_string(), array.clone());
    }
    drop(array);
    drop(dict);

    assert_eq!(tracker.live_count(), 2);
    let collected = collector.collect(&tracker, None, &[], &[]);
    assert_eq!(collected, 2);
    assert_eq!(tracker.live_count(), 0);
    assert_eq!(collector.last_collected(), 2);
}

#[test]
fn test_rooted_cycle_survives_collection() {
    let tracker = ValueTracker::new();
    let collector = CycleCollector::new();
    let globals = Environment::root();

    let array = tracker.array(vec![]);
    if let Value::Array(elements) = &*array {
        elements.write().push(array.clone());
    }
    globals.define("ring", array.clone());
    drop(array);

    assert_eq!(collector.collect(&tracker, Some(&globals), &[], &[]), 0);
    assert_eq!(tracker.live_count(), 1);

    // Once the binding goes away the same cycle is reclaimable.
    let empty = Environment::root();
    assert_eq!(collector.collect(&tracker, Some(&empty), &[], &[]), 1);
}

#[test]
fn test_deep_copy_isolates_and_preserves_aliasing() {
    let tracker = ValueTracker::new();

    let shared = tracker.array(vec![Arc::new(Value::Int(1))]);
    let outer = tracker.array(vec![shared.clone(), shared.clone()]);

    let copy = tracker.deep_copy(&outer);
    let (copy_a, copy_b) = match &*copy {
        Value::Array(elements) => {
            let elements = elements.read();
            (elements[0].clone(), elements[1].clone())
        }
        other => panic!("expected array, got {other:?}"),
    };

    // Internal aliasing survives the copy, but nothing is shared with the
    // original graph.
    assert!(Arc::ptr_eq(&copy_a, &copy_b));
    assert!(!Arc::ptr_eq(&copy_a, &shared));

    if let Value::Array(elements) = &*copy_a {
        elements.write().push(Arc::new(Value::Int(2)));
    }
    if let Value::Array(elements) = &*shared {
        assert_eq!(elements.read().len(), 1);
    }
}

#[test]
fn test_copied_cycle_is_tracked_and_collectable() {
    let tracker = ValueTracker::new();
    let collector = CycleCollector::new();

    let original = tracker.array(vec![]);
    if let Value::Array(elements) = &*original {
        elements.write().push(original.clone());
    }

    let copy = tracker.deep_copy(&original);
    drop(copy);

    // Only the copy is unreachable; the original is rooted explicitly.
    let roots = vec![original.clone()];
    assert_eq!(collector.collect(&tracker, None, &[], &roots), 1);
    assert_eq!(tracker.live_count(), 1);
}
