//! Batch scheduling: read/write dependency analysis into sequential groups
//! of mutually independent blocks, and the worker pool that drains them.

pub mod deps;
pub mod pool;

pub use deps::{build_groups, has_dependency, BlockSpec, DependencyGroup};
pub use pool::Scheduler;
