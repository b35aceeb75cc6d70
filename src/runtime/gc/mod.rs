//! Cycle collection for the shared value graph.
//!
//! Values are reference counted through `Arc`; cycles (self-referential
//! arrays, dicts, records) would never drop to zero on their own. The
//! [`ValueTracker`] keeps a weak-reference side table of every compound
//! allocation, and the [`CycleCollector`] runs an on-demand mark/sweep pass
//! over it at block boundaries, clearing the internal references of
//! unreachable cyclic values so that ordinary reference counting can finish
//! the job.

mod collector;
mod tracker;

pub use collector::CycleCollector;
pub use tracker::ValueTracker;
