use thiserror::Error;

/// Error taxonomy of the runtime core.
///
/// Every variant's `Display` string is directly presentable to the script
/// author; sandbox and limit errors carry the operation, the resource, and
/// the reason in the message itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("Cannot convert {from} to {to}: {reason}")]
    TypeConversion {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Undefined variable: {name}")]
    UnboundName { name: String },

    #[error("Sandbox violation: {operation} on '{resource}' - {reason}")]
    SandboxViolation {
        operation: String,
        resource: String,
        reason: String,
    },

    #[error("Resource limit exceeded: {resource} (limit {limit}) - {reason}")]
    ResourceLimitExceeded {
        resource: String,
        limit: String,
        reason: String,
    },

    #[error("No executor registered for language '{language}'")]
    ExecutorNotFound { language: String },

    #[error("Executor failure [{language}] in block '{block_id}' ({function}): {message}")]
    ExecutorFailure {
        language: String,
        block_id: String,
        function: String,
        message: String,
    },

    #[error("Record type '{name}' is already defined with a different shape")]
    RecordDefinitionConflict { name: String },

    #[error("Record type '{name}' contains a reference cycle: {path}")]
    RecordTypeCycle { name: String, path: String },
}

/// Wraps a backend error message with its invocation context.
pub fn executor_failure(
    language: impl Into<String>,
    block_id: impl Into<String>,
    function: impl Into<String>,
    message: impl Into<String>,
) -> RuntimeError {
    RuntimeError::ExecutorFailure {
        language: language.into(),
        block_id: block_id.into(),
        function: function.into(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_violation_message_format() {
        let err = RuntimeError::SandboxViolation {
            operation: "file_write".to_string(),
            resource: "/etc/passwd".to_string(),
            reason: "FS_WRITE capability not granted".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Sandbox violation: file_write on '/etc/passwd' - FS_WRITE capability not granted"
        );
    }

    #[test]
    fn test_executor_failure_carries_invocation_context() {
        let err = executor_failure("python", "blk-3", "transform", "NameError: x");
        assert_eq!(
            err.to_string(),
            "Executor failure [python] in block 'blk-3' (transform): NameError: x"
        );
    }

    #[test]
    fn test_unbound_name_display() {
        let err = RuntimeError::UnboundName {
            name: "total".to_string(),
        };
        assert_eq!(err.to_string(), "Undefined variable: total");
    }

    #[test]
    fn test_errors_are_comparable() {
        let a = RuntimeError::ExecutorNotFound {
            language: "lua".to_string(),
        };
        let b = RuntimeError::ExecutorNotFound {
            language: "lua".to_string(),
        };
        assert_eq!(a, b);
    }
}
