use std::{
    cell::RefCell,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, error};

use crate::{
    runtime::error::RuntimeError,
    sandbox::{
        audit::{AuditEventKind, AuditLog},
        capability::Capability,
        config::SandboxConfig,
    },
};

thread_local! {
    /// Stack of active sandboxes for this thread; the top is consulted by
    /// every capability check. Managed exclusively by [`ScopedSandbox`].
    static ACTIVE: RefCell<Vec<Arc<Sandbox>>> = const { RefCell::new(Vec::new()) };
}

/// Enforcement engine for one invocation's [`SandboxConfig`].
///
/// All checks are read-only against the config. Denials produce a
/// `SandboxViolation` carrying the operation, the resource, and the reason,
/// and append a structured record to the audit log.
pub struct Sandbox {
    config: SandboxConfig,
    audit: Arc<AuditLog>,
}

impl Sandbox {
    pub fn new(config: SandboxConfig, audit: Arc<AuditLog>) -> Self {
        debug!(capabilities = ?config.capabilities, "sandbox initialized");
        Sandbox { config, audit }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// The sandbox active on this thread, if any.
    pub fn current() -> Option<Arc<Sandbox>> {
        ACTIVE.with(|stack| stack.borrow().last().cloned())
    }

    // -- filesystem ---------------------------------------------------------

    pub fn can_read(&self, path: &Path) -> bool {
        self.read_denial(path).is_none()
    }

    pub fn check_read(&self, path: &Path) -> Result<(), RuntimeError> {
        self.deny_or_ok("file_read", &path.display().to_string(), self.read_denial(path))
    }

    pub fn can_write(&self, path: &Path) -> bool {
        self.write_denial(path).is_none()
    }

    pub fn check_write(&self, path: &Path) -> Result<(), RuntimeError> {
        self.deny_or_ok("file_write", &path.display().to_string(), self.write_denial(path))
    }

    pub fn can_execute(&self, path: &Path) -> bool {
        self.exec_denial(path).is_none()
    }

    pub fn check_execute(&self, path: &Path) -> Result<(), RuntimeError> {
        self.deny_or_ok("file_execute", &path.display().to_string(), self.exec_denial(path))
    }

    pub fn can_delete(&self, path: &Path) -> bool {
        self.delete_denial(path).is_none()
    }

    pub fn check_delete(&self, path: &Path) -> Result<(), RuntimeError> {
        self.deny_or_ok("file_delete", &path.display().to_string(), self.delete_denial(path))
    }

    fn read_denial(&self, path: &Path) -> Option<String> {
        if !self.config.has_capability(Capability::FS_READ) {
            return Some("FS_READ capability not granted".to_string());
        }
        self.path_denial(path, &self.config.allowed_read_paths, "read")
    }

    fn write_denial(&self, path: &Path) -> Option<String> {
        if !self.config.has_capability(Capability::FS_WRITE) {
            return Some("FS_WRITE capability not granted".to_string());
        }
        self.path_denial(path, &self.config.allowed_write_paths, "write")
    }

    fn exec_denial(&self, path: &Path) -> Option<String> {
        if !self.config.has_capability(Capability::FS_EXECUTE) {
            return Some("FS_EXECUTE capability not granted".to_string());
        }
        self.path_denial(path, &self.config.allowed_exec_paths, "execute")
    }

    pub fn can_create_dir(&self, path: &Path) -> bool {
        self.create_dir_denial(path).is_none()
    }

    pub fn check_create_dir(&self, path: &Path) -> Result<(), RuntimeError> {
        self.deny_or_ok(
            "dir_create",
            &path.display().to_string(),
            self.create_dir_denial(path),
        )
    }

    fn create_dir_denial(&self, path: &Path) -> Option<String> {
        if !self.config.has_capability(Capability::FS_CREATE_DIR) {
            return Some("FS_CREATE_DIR capability not granted".to_string());
        }
        self.path_denial(path, &self.config.allowed_write_paths, "write")
    }

    fn delete_denial(&self, path: &Path) -> Option<String> {
        if !self.config.has_capability(Capability::FS_DELETE) {
            return Some("FS_DELETE capability not granted".to_string());
        }
        // Deletion is a write; the write allow-list applies too.
        self.write_denial(path)
    }

    fn path_denial(&self, path: &Path, allowed: &[PathBuf], kind: &str) -> Option<String> {
        if allowed.is_empty() {
            return None;
        }
        if is_path_allowed(path, allowed) {
            None
        } else {
            Some(format!("path is outside the allowed {} paths", kind))
        }
    }

    // -- network ------------------------------------------------------------

    pub fn can_connect(&self, host: &str, port: u16) -> bool {
        self.connect_denial(host, port).is_none()
    }

    pub fn check_connect(&self, host: &str, port: u16) -> Result<(), RuntimeError> {
        self.deny_or_ok(
            "net_connect",
            &format!("{}:{}", host, port),
            self.connect_denial(host, port),
        )
    }

    pub fn can_listen(&self, port: u16) -> bool {
        self.listen_denial(port).is_none()
    }

    pub fn check_listen(&self, port: u16) -> Result<(), RuntimeError> {
        self.deny_or_ok("net_listen", &port.to_string(), self.listen_denial(port))
    }

    fn connect_denial(&self, host: &str, port: u16) -> Option<String> {
        if !self.config.network_enabled {
            return Some("network access is disabled".to_string());
        }
        if !self.config.has_capability(Capability::NET_CONNECT) {
            return Some("NET_CONNECT capability not granted".to_string());
        }
        if !self.config.allowed_hosts.is_empty()
            && !self
                .config
                .allowed_hosts
                .iter()
                .any(|allowed| host == allowed || host.contains(allowed.as_str()))
        {
            return Some(format!("host '{}' is not in the allow-list", host));
        }
        if !self.config.allowed_ports.is_empty() && !self.config.allowed_ports.contains(&port) {
            return Some(format!("port {} is not in the allow-list", port));
        }
        None
    }

    fn listen_denial(&self, port: u16) -> Option<String> {
        if !self.config.network_enabled {
            return Some("network access is disabled".to_string());
        }
        if !self.config.has_capability(Capability::NET_LISTEN) {
            return Some("NET_LISTEN capability not granted".to_string());
        }
        if !self.config.allowed_ports.is_empty() && !self.config.allowed_ports.contains(&port) {
            return Some(format!("port {} is not in the allow-list", port));
        }
        None
    }

    // -- system -------------------------------------------------------------

    pub fn can_exec_command(&self, command: &str) -> bool {
        self.command_denial(command).is_none()
    }

    pub fn check_exec_command(&self, command: &str) -> Result<(), RuntimeError> {
        self.deny_or_ok("process_exec", command, self.command_denial(command))
    }

    fn command_denial(&self, command: &str) -> Option<String> {
        if !self.config.allow_exec {
            return Some("process execution is disabled".to_string());
        }
        if !self.config.has_capability(Capability::SYS_EXEC) {
            return Some("SYS_EXEC capability not granted".to_string());
        }
        let name = command.split_whitespace().next().unwrap_or(command);
        if !self.config.allowed_commands.is_empty()
            && !self.config.allowed_commands.iter().any(|c| c == name)
        {
            return Some(format!("command '{}' is not in the allow-list", name));
        }
        None
    }

    pub fn can_access_env(&self, _var: &str) -> bool {
        self.config.has_capability(Capability::SYS_ENV)
    }

    pub fn check_access_env(&self, var: &str) -> Result<(), RuntimeError> {
        let denial = (!self.can_access_env(var))
            .then(|| "SYS_ENV capability not granted".to_string());
        self.deny_or_ok("env_access", var, denial)
    }

    // -- inter-block --------------------------------------------------------

    pub fn can_load_block(&self, _block_id: &str) -> bool {
        self.config.has_capability(Capability::BLOCK_LOAD)
    }

    pub fn check_load_block(&self, block_id: &str) -> Result<(), RuntimeError> {
        let denial = (!self.can_load_block(block_id))
            .then(|| "BLOCK_LOAD capability not granted".to_string());
        self.deny_or_ok("block_load", block_id, denial)
    }

    pub fn can_call_block(&self, _block_id: &str) -> bool {
        self.config.has_capability(Capability::BLOCK_CALL)
    }

    pub fn check_call_block(&self, block_id: &str) -> Result<(), RuntimeError> {
        let denial = (!self.can_call_block(block_id))
            .then(|| "BLOCK_CALL capability not granted".to_string());
        self.deny_or_ok("block_call", block_id, denial)
    }

    // -- plumbing -----------------------------------------------------------

    fn deny_or_ok(
        &self,
        operation: &str,
        resource: &str,
        denial: Option<String>,
    ) -> Result<(), RuntimeError> {
        match denial {
            None => Ok(()),
            Some(reason) => {
                self.audit.record(
                    AuditEventKind::SecurityViolation,
                    operation,
                    resource,
                    reason.clone(),
                );
                Err(RuntimeError::SandboxViolation {
                    operation: operation.to_string(),
                    resource: resource.to_string(),
                    reason,
                })
            }
        }
    }
}

/// Fail-closed denial used when no sandbox is active on the thread.
pub fn deny_no_sandbox(operation: &str, resource: &str) -> RuntimeError {
    error!(operation, resource, "capability check with no active sandbox");
    RuntimeError::SandboxViolation {
        operation: operation.to_string(),
        resource: resource.to_string(),
        reason: "no active sandbox".to_string(),
    }
}

/// RAII activation: pushes a sandbox onto the thread's stack and pops it on
/// drop, restoring whatever was active before.
pub struct ScopedSandbox {
    sandbox: Arc<Sandbox>,
}

impl ScopedSandbox {
    pub fn new(sandbox: Sandbox) -> Self {
        Self::activate(Arc::new(sandbox))
    }

    pub fn activate(sandbox: Arc<Sandbox>) -> Self {
        ACTIVE.with(|stack| stack.borrow_mut().push(sandbox.clone()));
        ScopedSandbox { sandbox }
    }

    pub fn sandbox(&self) -> &Arc<Sandbox> {
        &self.sandbox
    }
}

impl Drop for ScopedSandbox {
    fn drop(&mut self) {
        ACTIVE.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Resolves symlinks when the path exists; falls back to a lexical cleanup
/// (dropping `.` and folding `..`) when it does not.
fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Component-wise prefix match, so `/a/b` allows `/a/b/c` but not `/a/bc`.
fn is_path_allowed(path: &Path, allowed: &[PathBuf]) -> bool {
    let normalized = normalize_path(path);
    allowed
        .iter()
        .any(|prefix| normalized.starts_with(normalize_path(prefix)))
}
