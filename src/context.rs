use std::sync::Arc;

use crate::{
    exec::{cache::InlineCodeCache, invoke, registry::ExecutorRegistry, BlockOutcome},
    limits::ResourceLimiter,
    runtime::{
        environment::{EnvRef, Environment},
        error::RuntimeError,
        gc::{CycleCollector, ValueTracker},
        record::RecordRegistry,
        value::ValueRef,
    },
    sandbox::{audit::AuditLog, manager::SandboxManager},
};

/// Owns everything with process lifetime: the executor and record
/// registries, the value tracker and collector, the sandbox manager, the
/// resource limiter, the audit log, and the global environment.
///
/// Explicit rather than ambient: two contexts in one process are fully
/// isolated (except for `setrlimit` ceilings, which stay process-wide).
pub struct RuntimeContext {
    executors: ExecutorRegistry,
    records: RecordRegistry,
    values: ValueTracker,
    collector: CycleCollector,
    sandboxes: SandboxManager,
    limits: ResourceLimiter,
    audit: Arc<AuditLog>,
    cache: InlineCodeCache,
    globals: EnvRef,
}

impl RuntimeContext {
    pub fn new() -> Self {
        RuntimeContext {
            executors: ExecutorRegistry::new(),
            records: RecordRegistry::new(),
            values: ValueTracker::new(),
            collector: CycleCollector::new(),
            sandboxes: SandboxManager::new(),
            limits: ResourceLimiter::new(),
            audit: Arc::new(AuditLog::new()),
            cache: InlineCodeCache::new(),
            globals: Environment::root(),
        }
    }

    pub fn executors(&self) -> &ExecutorRegistry {
        &self.executors
    }

    pub fn records(&self) -> &RecordRegistry {
        &self.records
    }

    pub fn values(&self) -> &ValueTracker {
        &self.values
    }

    pub fn collector(&self) -> &CycleCollector {
        &self.collector
    }

    pub fn sandboxes(&self) -> &SandboxManager {
        &self.sandboxes
    }

    pub fn limits(&self) -> &ResourceLimiter {
        &self.limits
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn cache(&self) -> &InlineCodeCache {
        &self.cache
    }

    pub fn globals(&self) -> &EnvRef {
        &self.globals
    }

    /// Runs one block through the guard pipeline with this context's
    /// limiter armed.
    pub fn run_block(
        &self,
        block_id: &str,
        language: &str,
        code: &str,
    ) -> Result<BlockOutcome, RuntimeError> {
        invoke::run_block(
            &self.executors,
            &self.sandboxes,
            Some(&self.limits),
            &self.audit,
            block_id,
            language,
            code,
        )
    }

    /// Calls a function in a block's backend session.
    pub fn call_block_function(
        &self,
        block_id: &str,
        language: &str,
        function: &str,
        args: &[ValueRef],
    ) -> Result<BlockOutcome, RuntimeError> {
        invoke::call_block_function(
            &self.executors,
            &self.sandboxes,
            Some(&self.limits),
            &self.audit,
            block_id,
            language,
            function,
            args,
        )
    }

    /// Memoized pure evaluation.
    pub fn evaluate_block(
        &self,
        block_id: &str,
        language: &str,
        code: &str,
    ) -> Result<BlockOutcome, RuntimeError> {
        invoke::evaluate_block(
            &self.executors,
            &self.sandboxes,
            Some(&self.limits),
            &self.audit,
            &self.cache,
            block_id,
            language,
            code,
        )
    }

    /// One collection pass rooted at the global environment plus any extra
    /// live environments and values the caller still holds.
    pub fn collect_cycles(&self, extra_envs: &[EnvRef], extra_roots: &[ValueRef]) -> usize {
        self.collector
            .collect(&self.values, Some(&self.globals), extra_envs, extra_roots)
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        RuntimeContext::new()
    }
}
