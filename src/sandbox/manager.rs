use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::sandbox::{
    capability::PermissionLevel,
    config::{home_dir, SandboxConfig},
};

/// Holds the process-wide default sandbox configuration plus per-block
/// overrides registered ahead of execution.
#[derive(Default)]
pub struct SandboxManager {
    default_config: RwLock<SandboxConfig>,
    block_configs: Mutex<HashMap<String, SandboxConfig>>,
}

impl SandboxManager {
    pub fn new() -> Self {
        SandboxManager::default()
    }

    pub fn with_default(config: SandboxConfig) -> Self {
        SandboxManager {
            default_config: RwLock::new(config),
            block_configs: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_default_config(&self, config: SandboxConfig) {
        *self.default_config.write() = config;
    }

    pub fn default_config(&self) -> SandboxConfig {
        self.default_config.read().clone()
    }

    /// Registers an override for one block, replacing any previous one.
    pub fn register_block_permissions(&self, block_id: impl Into<String>, config: SandboxConfig) {
        let block_id = block_id.into();
        debug!(block_id = %block_id, "registered per-block sandbox override");
        self.block_configs.lock().insert(block_id, config);
    }

    pub fn remove_block_permissions(&self, block_id: &str) {
        self.block_configs.lock().remove(block_id);
    }

    /// The configuration a block will run under: its override if one was
    /// registered, the default otherwise.
    pub fn config_for_block(&self, block_id: &str) -> SandboxConfig {
        if let Some(config) = self.block_configs.lock().get(block_id) {
            return config.clone();
        }
        self.default_config.read().clone()
    }

    /// Builds a preset configuration for a block and seeds its private
    /// working directory under `~/.naab/sandbox/<block_id>`.
    pub fn config_for_block_at_level(
        &self,
        block_id: &str,
        level: PermissionLevel,
    ) -> SandboxConfig {
        let mut config = SandboxConfig::from_level(level);
        if let Some(home) = home_dir() {
            let workdir = home.join(".naab").join("sandbox").join(block_id);
            config.allow_read_path(&workdir);
            config.allow_write_path(&workdir);
        }
        config
    }
}
