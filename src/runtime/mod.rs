//! Runtime core: the universal value model, lexical environments, record
//! definitions, the cycle collector, and the error taxonomy.
//!
//! # Memory model
//! Values are shared via `Arc` wherever an environment slot, array cell,
//! dict entry, or record field references them. Array/dict contents and
//! record fields are the only state mutated in place; a value's tag never
//! changes after construction. Reference cycles are legal in the value
//! graph and are reclaimed by the collector in [`gc`]; cycles in the record
//! *type* graph are rejected at registration.

pub mod alloc_stats;
pub mod environment;
pub mod error;
pub mod gc;
pub mod record;
pub mod value;
