use crate::runtime::{error::RuntimeError, value::ValueRef};

/// Language backend interface.
///
/// One executor owns one backend session (an embedded interpreter or a
/// subprocess bridge). Methods take `&mut self`; callers serialize access
/// through the registry's per-language mutex, which is what makes
/// non-reentrant backends safe to share.
pub trait Executor: Send {
    /// Runs a code fragment for its side effects.
    fn execute(&mut self, code: &str) -> Result<(), RuntimeError>;

    /// Runs a code fragment and marshals its result back as a value.
    fn evaluate_with_return(&mut self, code: &str) -> Result<ValueRef, RuntimeError>;

    /// Calls a previously defined function in the backend session.
    fn call_function(&mut self, name: &str, args: &[ValueRef]) -> Result<ValueRef, RuntimeError>;

    /// False once the backend session is unusable (crashed subprocess,
    /// failed interpreter init).
    fn is_initialized(&self) -> bool;

    /// Canonical language name, e.g. "python".
    fn language(&self) -> &str;

    /// Drains stdout/stderr captured since the last call.
    fn captured_output(&mut self) -> String;
}
