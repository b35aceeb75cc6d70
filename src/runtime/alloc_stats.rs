use std::sync::atomic::{AtomicUsize, Ordering};

/// Cumulative allocation counters for the compound value kinds, for
/// diagnostics. These never reset and are process-wide.
#[derive(Debug, Clone, Copy)]
pub struct AllocStats {
    pub arrays: usize,
    pub dicts: usize,
    pub closures: usize,
    pub records: usize,
}

static ARRAYS: AtomicUsize = AtomicUsize::new(0);
static DICTS: AtomicUsize = AtomicUsize::new(0);
static CLOSURES: AtomicUsize = AtomicUsize::new(0);
static RECORDS: AtomicUsize = AtomicUsize::new(0);

pub fn record_array() {
    ARRAYS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_dict() {
    DICTS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_closure() {
    CLOSURES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_record() {
    RECORDS.fetch_add(1, Ordering::Relaxed);
}

pub fn snapshot() -> AllocStats {
    AllocStats {
        arrays: ARRAYS.load(Ordering::Relaxed),
        dicts: DICTS.load(Ordering::Relaxed),
        closures: CLOSURES.load(Ordering::Relaxed),
        records: RECORDS.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::value::Value;
    use std::collections::HashMap;

    #[test]
    fn test_counters_advance_per_kind() {
        // Counters are process-wide and other tests allocate too, so only
        // deltas are meaningful.
        let before = snapshot();

        let _a = Value::array(vec![]);
        let _b = Value::array(vec![]);
        let _d = Value::dict(HashMap::new());

        let after = snapshot();
        assert!(after.arrays >= before.arrays + 2);
        assert!(after.dicts >= before.dicts + 1);
        assert!(after.closures >= before.closures);
        assert!(after.records >= before.records);
    }
}
