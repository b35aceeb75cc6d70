use std::{sync::Arc, time::Duration};

use crate::{
    exec::{cache::InlineCodeCache, registry::ExecutorRegistry},
    limits::ResourceLimiter,
    runtime::{
        error::{executor_failure, RuntimeError},
        value::ValueRef,
    },
    sandbox::{
        audit::{AuditEventKind, AuditLog},
        enforce::{deny_no_sandbox, Sandbox, ScopedSandbox},
        manager::SandboxManager,
    },
};

/// Result of one guarded block invocation.
#[derive(Debug, Clone)]
pub struct BlockOutcome {
    pub value: ValueRef,
    /// Stdout/stderr the backend captured during the run.
    pub output: String,
}

/// Runs a block through the full guard pipeline: resolve its sandbox
/// config, activate it on this thread, check `BLOCK_CALL`, arm the
/// wall-clock timeout from the config's CPU ceiling, then resolve and run
/// the backend under the per-language lock.
///
/// Deadlines are per thread, so concurrent invocations through one limiter
/// do not interfere. `None` skips timeout enforcement entirely.
pub fn run_block(
    registry: &ExecutorRegistry,
    sandboxes: &SandboxManager,
    limits: Option<&ResourceLimiter>,
    audit: &Arc<AuditLog>,
    block_id: &str,
    language: &str,
    code: &str,
) -> Result<BlockOutcome, RuntimeError> {
    invoke(
        registry, sandboxes, limits, audit, block_id, language, "<eval>",
        |executor| executor.evaluate_with_return(code),
    )
}

/// Calls a named function in a block's backend session under the same guard
/// pipeline as [`run_block`].
pub fn call_block_function(
    registry: &ExecutorRegistry,
    sandboxes: &SandboxManager,
    limits: Option<&ResourceLimiter>,
    audit: &Arc<AuditLog>,
    block_id: &str,
    language: &str,
    function: &str,
    args: &[ValueRef],
) -> Result<BlockOutcome, RuntimeError> {
    invoke(
        registry, sandboxes, limits, audit, block_id, language, function,
        |executor| executor.call_function(function, args),
    )
}

/// [`run_block`] with the inline-code result memo. Only sound for pure
/// evaluations; a cache hit skips the backend entirely and reports no
/// captured output.
pub fn evaluate_block(
    registry: &ExecutorRegistry,
    sandboxes: &SandboxManager,
    limits: Option<&ResourceLimiter>,
    audit: &Arc<AuditLog>,
    cache: &InlineCodeCache,
    block_id: &str,
    language: &str,
    code: &str,
) -> Result<BlockOutcome, RuntimeError> {
    if let Some(value) = cache.lookup(language, code) {
        return Ok(BlockOutcome {
            value,
            output: String::new(),
        });
    }
    let outcome = run_block(registry, sandboxes, limits, audit, block_id, language, code)?;
    cache.store(language, code, outcome.value.clone());
    Ok(outcome)
}

fn invoke<F>(
    registry: &ExecutorRegistry,
    sandboxes: &SandboxManager,
    limits: Option<&ResourceLimiter>,
    audit: &Arc<AuditLog>,
    block_id: &str,
    language: &str,
    function: &str,
    run: F,
) -> Result<BlockOutcome, RuntimeError>
where
    F: FnOnce(&mut dyn crate::exec::executor::Executor) -> Result<ValueRef, RuntimeError>,
{
    let config = sandboxes.config_for_block(block_id);
    let cpu_seconds = config.max_cpu_seconds;
    let _sandbox_scope = ScopedSandbox::new(Sandbox::new(config, audit.clone()));

    match Sandbox::current() {
        Some(sandbox) => sandbox.check_call_block(block_id)?,
        None => return Err(deny_no_sandbox("block_call", block_id)),
    }

    let timeout_guard = match limits {
        Some(limiter) if cpu_seconds > 0 => {
            Some(limiter.scoped_timeout(Duration::from_secs(cpu_seconds)))
        }
        _ => None,
    };

    let handle = registry.resolve(language)?;
    let mut executor = handle.lock();

    let value = run(&mut *executor)
        .map_err(|err| wrap_backend_error(language, block_id, function, err))?;

    if let Some(guard) = &timeout_guard {
        if let Err(err) = guard.checkpoint() {
            audit.record(
                AuditEventKind::Timeout,
                "block_execute",
                block_id,
                err.to_string(),
            );
            return Err(err);
        }
    }

    let output = executor.captured_output();
    audit.record(
        AuditEventKind::BlockExecute,
        "block_execute",
        block_id,
        "completed",
    );
    Ok(BlockOutcome { value, output })
}

/// Guard errors pass through untouched; anything else the backend returned
/// gets the invocation context attached.
fn wrap_backend_error(
    language: &str,
    block_id: &str,
    function: &str,
    err: RuntimeError,
) -> RuntimeError {
    match err {
        RuntimeError::SandboxViolation { .. }
        | RuntimeError::ResourceLimitExceeded { .. }
        | RuntimeError::ExecutorFailure { .. } => err,
        other => executor_failure(language, block_id, function, other.to_string()),
    }
}
