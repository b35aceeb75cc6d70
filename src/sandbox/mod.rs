//! Capability sandbox: permission presets, per-invocation enforcement, and
//! the audit trail.
//!
//! A [`SandboxConfig`] is resolved per block (override or default) by the
//! [`SandboxManager`], activated on the executing thread via
//! [`ScopedSandbox`], and consulted through [`Sandbox::current()`]. With no
//! active sandbox every check fails closed.

pub mod audit;
pub mod capability;
pub mod config;
pub mod enforce;
pub mod manager;

pub use audit::{AuditEventKind, AuditLog, AuditRecord, AuditSink};
pub use capability::{Capability, PermissionLevel};
pub use config::SandboxConfig;
pub use enforce::{deny_no_sandbox, Sandbox, ScopedSandbox};
pub use manager::SandboxManager;
