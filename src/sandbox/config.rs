use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::sandbox::capability::{Capability, PermissionLevel};

/// Resolved sandbox configuration for one invocation context.
///
/// Built once from a permission-level preset (plus explicit grants), then
/// consulted read-only by every capability check. Empty allow-lists mean
/// "no restriction beyond the capability itself".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    pub capabilities: Capability,

    pub allowed_read_paths: Vec<PathBuf>,
    pub allowed_write_paths: Vec<PathBuf>,
    pub allowed_exec_paths: Vec<PathBuf>,

    /// Empty = all hosts allowed (when NET_CONNECT is granted).
    pub allowed_hosts: Vec<String>,
    /// Empty = all ports allowed.
    pub allowed_ports: Vec<u16>,
    pub network_enabled: bool,

    /// Resource ceilings; 0 means unlimited.
    pub max_memory_mb: u64,
    pub max_cpu_seconds: u64,
    pub max_file_size_mb: u64,

    pub allow_fork: bool,
    pub allow_exec: bool,
    /// Allow-list of executable names; empty = any (when SYS_EXEC is granted).
    pub allowed_commands: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig::from_level(PermissionLevel::Standard)
    }
}

impl SandboxConfig {
    fn empty() -> Self {
        SandboxConfig {
            capabilities: Capability::empty(),
            allowed_read_paths: Vec::new(),
            allowed_write_paths: Vec::new(),
            allowed_exec_paths: Vec::new(),
            allowed_hosts: Vec::new(),
            allowed_ports: Vec::new(),
            network_enabled: false,
            max_memory_mb: 0,
            max_cpu_seconds: 0,
            max_file_size_mb: 0,
            allow_fork: false,
            allow_exec: false,
            allowed_commands: Vec::new(),
        }
    }

    /// Builds the documented default configuration for a preset.
    pub fn from_level(level: PermissionLevel) -> Self {
        let mut config = SandboxConfig::empty();
        match level {
            PermissionLevel::Restricted => {
                config.capabilities = Capability::FS_READ;
                config.max_memory_mb = 128;
                config.max_cpu_seconds = 10;
                config.max_file_size_mb = 10;
            }
            PermissionLevel::Standard => {
                config.capabilities = Capability::FS_READ
                    | Capability::FS_WRITE
                    | Capability::FS_CREATE_DIR
                    | Capability::BLOCK_LOAD
                    | Capability::BLOCK_CALL
                    | Capability::SYS_ENV
                    | Capability::SYS_TIME;
                config.max_memory_mb = 512;
                config.max_cpu_seconds = 30;
                config.max_file_size_mb = 100;

                let tmp = std::env::temp_dir();
                config.allowed_read_paths.push(tmp.clone());
                if let Some(home) = home_dir() {
                    config.allowed_read_paths.push(home);
                }
                config.allowed_write_paths.push(tmp);
            }
            PermissionLevel::Elevated => {
                config.capabilities = Capability::FS_READ
                    | Capability::FS_WRITE
                    | Capability::FS_CREATE_DIR
                    | Capability::NET_CONNECT
                    | Capability::BLOCK_LOAD
                    | Capability::BLOCK_CALL
                    | Capability::SYS_ENV
                    | Capability::SYS_TIME
                    | Capability::SYS_EXEC;
                config.network_enabled = true;
                config.allow_fork = true;
                config.allow_exec = true;
                config.max_memory_mb = 1024;
                config.max_cpu_seconds = 60;
                config.max_file_size_mb = 1000;
            }
            PermissionLevel::Unrestricted => {
                config.capabilities = Capability::UNSAFE;
                config.network_enabled = true;
                config.allow_fork = true;
                config.allow_exec = true;
                // Zero ceilings mean unlimited.
            }
        }
        config
    }

    /// True when `cap` is granted. `UNSAFE` grants everything.
    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(Capability::UNSAFE) || self.capabilities.contains(cap)
    }

    /// Adds an explicit capability grant on top of the preset.
    pub fn grant(&mut self, cap: Capability) -> &mut Self {
        self.capabilities |= cap;
        self
    }

    pub fn allow_read_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.allowed_read_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn allow_write_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.allowed_write_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn allow_exec_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.allowed_exec_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn allow_host(&mut self, host: impl Into<String>) -> &mut Self {
        self.allowed_hosts.push(host.into());
        self
    }

    pub fn allow_port(&mut self, port: u16) -> &mut Self {
        self.allowed_ports.push(port);
        self
    }

    pub fn allow_command(&mut self, command: impl Into<String>) -> &mut Self {
        self.allowed_commands.push(command.into());
        self
    }
}

pub(crate) fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
