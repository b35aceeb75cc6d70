use std::{
    collections::HashMap,
    collections::HashSet,
    sync::atomic::{AtomicUsize, Ordering},
    sync::{Arc, Weak},
};

use parking_lot::{Mutex, MutexGuard};

use crate::runtime::{
    record::{RecordValue, RecordDef},
    value::{self, Value, ValueRef},
};

/// Side table of weak references to every compound value the runtime has
/// allocated through the tracking constructors.
///
/// Only arrays, dicts, and records are tracked; scalars cannot participate
/// in cycles. The table holds weak references so tracking never keeps a
/// value alive, and expired entries are pruned on every walk. The mutex also
/// serializes the table against a concurrent mark/sweep pass.
#[derive(Default)]
pub struct ValueTracker {
    tracked: Mutex<Vec<Weak<Value>>>,
    total_tracked: AtomicUsize,
}

impl ValueTracker {
    pub fn new() -> Self {
        ValueTracker::default()
    }

    /// Registers a compound value with the tracker. Scalar and handle kinds
    /// are ignored; they cannot form cycles.
    pub fn track(&self, value: &ValueRef) {
        if matches!(
            &**value,
            Value::Array(_) | Value::Dict(_) | Value::Record(_)
        ) {
            self.tracked.lock().push(Arc::downgrade(value));
            self.total_tracked.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Allocates a tracked array.
    pub fn array(&self, elements: Vec<ValueRef>) -> ValueRef {
        let value = Value::array(elements);
        self.track(&value);
        value
    }

    /// Allocates a tracked dict.
    pub fn dict(&self, entries: HashMap<String, ValueRef>) -> ValueRef {
        let value = Value::dict(entries);
        self.track(&value);
        value
    }

    /// Allocates a tracked record instance with null fields.
    pub fn record(&self, def: Arc<RecordDef>) -> ValueRef {
        let value = Value::record(RecordValue::new(def));
        self.track(&value);
        value
    }

    /// Deep-copies a value, registering every compound value the copy
    /// creates. This is the assignment path for arrays/dicts/records.
    pub fn deep_copy(&self, value: &ValueRef) -> ValueRef {
        let mut created = Vec::new();
        let copy = value::deep_copy_collect(value, &mut created);
        for v in &created {
            self.track(v);
        }
        copy
    }

    /// Walks a value graph and tracks every compound node in it, e.g. after
    /// unmarshalling a backend result from JSON.
    pub fn track_graph(&self, value: &ValueRef) {
        let mut seen = HashSet::new();
        let mut worklist = vec![value.clone()];
        while let Some(v) = worklist.pop() {
            let key = Arc::as_ptr(&v) as *const () as usize;
            if !seen.insert(key) {
                continue;
            }
            match &*v {
                Value::Array(elements) => {
                    self.track(&v);
                    worklist.extend(elements.read().iter().cloned());
                }
                Value::Dict(entries) => {
                    self.track(&v);
                    worklist.extend(entries.read().values().cloned());
                }
                Value::Record(record) => {
                    self.track(&v);
                    worklist.extend(record.fields_snapshot());
                }
                _ => {}
            }
        }
    }

    /// Number of tracked values still alive. Prunes expired entries.
    pub fn live_count(&self) -> usize {
        let mut tracked = self.tracked.lock();
        tracked.retain(|w| w.strong_count() > 0);
        tracked.len()
    }

    /// Cumulative count of values ever tracked.
    pub fn total_tracked(&self) -> usize {
        self.total_tracked.load(Ordering::Relaxed)
    }

    pub(crate) fn lock_tracked(&self) -> MutexGuard<'_, Vec<Weak<Value>>> {
        self.tracked.lock()
    }
}
