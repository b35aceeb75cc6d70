//! Language backends: the [`Executor`] contract, the name-keyed registry,
//! the guarded invocation pipeline, and the inline-evaluation memo.

pub mod cache;
pub mod executor;
pub mod invoke;
pub mod registry;

pub use cache::InlineCodeCache;
pub use executor::Executor;
pub use invoke::{call_block_function, evaluate_block, run_block, BlockOutcome};
pub use registry::{ExecutorHandle, ExecutorRegistry};
