use std::{
    collections::HashSet,
    sync::atomic::{AtomicUsize, Ordering},
    sync::Arc,
};

use tracing::debug;

use crate::runtime::{
    environment::EnvRef,
    gc::ValueTracker,
    value::{Value, ValueRef},
};

enum WorkItem {
    Value(ValueRef),
    Env(EnvRef),
}

/// Mark-and-sweep pass over the value graph that reclaims reference cycles.
///
/// Plain reference counting frees everything else; this collector exists
/// only for values that keep each other alive after becoming unreachable
/// from every root. It is a bounded, on-demand sweep intended to run
/// between statements or block boundaries, never concurrently with
/// mutation of the graph it walks.
#[derive(Default)]
pub struct CycleCollector {
    total_collected: AtomicUsize,
    last_collected: AtomicUsize,
}

impl CycleCollector {
    pub fn new() -> Self {
        CycleCollector::default()
    }

    /// Runs one full mark/sweep pass and returns the number of cyclic
    /// values collected.
    ///
    /// Roots are the current environment chain, any extra environments
    /// (e.g. the global environment when `root_env` is a nested scope), and
    /// extra values not yet bound to a name (e.g. an in-flight return
    /// value).
    pub fn collect(
        &self,
        tracker: &ValueTracker,
        root_env: Option<&EnvRef>,
        extra_envs: &[EnvRef],
        extra_roots: &[ValueRef],
    ) -> usize {
        // Phase 1: mark everything reachable from the roots.
        let mut reachable: HashSet<usize> = HashSet::new();
        let mut visited_envs: HashSet<usize> = HashSet::new();
        let mut worklist: Vec<WorkItem> = Vec::with_capacity(16);

        if let Some(env) = root_env {
            worklist.push(WorkItem::Env(env.clone()));
        }
        for env in extra_envs {
            worklist.push(WorkItem::Env(env.clone()));
        }
        for value in extra_roots {
            worklist.push(WorkItem::Value(value.clone()));
        }

        while let Some(item) = worklist.pop() {
            match item {
                WorkItem::Env(env) => {
                    let key = Arc::as_ptr(&env) as usize;
                    if !visited_envs.insert(key) {
                        continue;
                    }
                    for value in env.bindings_snapshot() {
                        worklist.push(WorkItem::Value(value));
                    }
                    if let Some(parent) = env.parent() {
                        worklist.push(WorkItem::Env(parent));
                    }
                }
                WorkItem::Value(value) => {
                    let key = Arc::as_ptr(&value) as *const () as usize;
                    if !reachable.insert(key) {
                        continue;
                    }
                    match &*value {
                        Value::Array(elements) => {
                            for element in elements.read().iter() {
                                worklist.push(WorkItem::Value(element.clone()));
                            }
                        }
                        Value::Dict(entries) => {
                            for entry in entries.read().values() {
                                worklist.push(WorkItem::Value(entry.clone()));
                            }
                        }
                        Value::Record(record) => {
                            for field in record.fields_snapshot() {
                                worklist.push(WorkItem::Value(field));
                            }
                        }
                        Value::Closure(closure) => {
                            worklist.push(WorkItem::Env(closure.env.clone()));
                        }
                        // Leaf kinds hold no references into the value graph.
                        Value::Null
                        | Value::Int(_)
                        | Value::Float(_)
                        | Value::Bool(_)
                        | Value::Str(_)
                        | Value::Foreign(_)
                        | Value::Block(_) => {}
                    }
                }
            }
        }

        // Phase 2: upgrade the tracked table, pruning expired entries. Every
        // live tracked value not marked reachable is a sweep candidate.
        let mut candidates: Vec<ValueRef> = Vec::new();
        let mut live_tracked = 0usize;
        {
            let mut tracked = tracker.lock_tracked();
            tracked.retain(|weak| match weak.upgrade() {
                Some(value) => {
                    live_tracked += 1;
                    let key = Arc::as_ptr(&value) as *const () as usize;
                    if !reachable.contains(&key) {
                        candidates.push(value);
                    }
                    true
                }
                None => false,
            });
        }

        debug!(
            reachable = reachable.len(),
            tracked = live_tracked,
            candidates = candidates.len(),
            "gc mark phase complete"
        );

        // Phase 3: a candidate is cyclic iff something besides our candidate
        // list still points at it. Nothing reachable does, so the extra
        // reference must come from another unreachable value. The test runs
        // over all candidates before any breaking so that clearing one
        // member does not hide the rest of its cycle.
        let in_cycle: Vec<bool> = candidates
            .iter()
            .map(|value| Arc::strong_count(value) > 1)
            .collect();

        // Phase 4: break the cycles by dropping internal references. After
        // this, plain reference counting frees every member.
        let mut collected = 0usize;
        for (value, cyclic) in candidates.iter().zip(in_cycle) {
            if !cyclic {
                continue;
            }
            match &**value {
                Value::Array(elements) => elements.write().clear(),
                Value::Dict(entries) => entries.write().clear(),
                Value::Record(record) => record.clear_fields(),
                _ => {}
            }
            collected += 1;
        }

        if collected > 0 {
            debug!(collected, "gc collected cyclic values");
        }

        self.last_collected.store(collected, Ordering::Relaxed);
        self.total_collected.fetch_add(collected, Ordering::Relaxed);
        collected
    }

    /// Cumulative number of values collected over the process lifetime.
    pub fn total_collected(&self) -> usize {
        self.total_collected.load(Ordering::Relaxed)
    }

    /// Number of values collected by the most recent pass.
    pub fn last_collected(&self) -> usize {
        self.last_collected.load(Ordering::Relaxed)
    }
}
