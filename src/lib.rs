pub mod context;
pub mod exec;
pub mod limits;
pub mod runtime;
pub mod sandbox;
pub mod sched;
