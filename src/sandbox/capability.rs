use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// One named permission gating an action under the sandbox.
    ///
    /// `UNSAFE` grants every other capability and is only present in the
    /// `Unrestricted` preset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Capability: u32 {
        // Filesystem
        const FS_READ       = 1 << 0;
        const FS_WRITE      = 1 << 1;
        const FS_EXECUTE    = 1 << 2;
        const FS_DELETE     = 1 << 3;
        const FS_CREATE_DIR = 1 << 4;

        // Network
        const NET_CONNECT   = 1 << 5;
        const NET_LISTEN    = 1 << 6;
        const NET_RAW       = 1 << 7;

        // System
        const SYS_EXEC      = 1 << 8;
        const SYS_ENV       = 1 << 9;
        const SYS_TIME      = 1 << 10;

        // Inter-block
        const BLOCK_LOAD    = 1 << 11;
        const BLOCK_CALL    = 1 << 12;

        // Resource-limit bypass
        const RES_UNLIMITED_MEM = 1 << 13;
        const RES_UNLIMITED_CPU = 1 << 14;

        // Unrestricted access
        const UNSAFE        = 1 << 15;
    }
}

impl Capability {
    /// Stable name used in violation messages and the audit log.
    pub fn label(self) -> &'static str {
        match self {
            Capability::FS_READ => "FS_READ",
            Capability::FS_WRITE => "FS_WRITE",
            Capability::FS_EXECUTE => "FS_EXECUTE",
            Capability::FS_DELETE => "FS_DELETE",
            Capability::FS_CREATE_DIR => "FS_CREATE_DIR",
            Capability::NET_CONNECT => "NET_CONNECT",
            Capability::NET_LISTEN => "NET_LISTEN",
            Capability::NET_RAW => "NET_RAW",
            Capability::SYS_EXEC => "SYS_EXEC",
            Capability::SYS_ENV => "SYS_ENV",
            Capability::SYS_TIME => "SYS_TIME",
            Capability::BLOCK_LOAD => "BLOCK_LOAD",
            Capability::BLOCK_CALL => "BLOCK_CALL",
            Capability::RES_UNLIMITED_MEM => "RES_UNLIMITED_MEM",
            Capability::RES_UNLIMITED_CPU => "RES_UNLIMITED_CPU",
            Capability::UNSAFE => "UNSAFE",
            _ => "CAPABILITY_SET",
        }
    }
}

/// Permission-level presets mapping to documented default capability sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionLevel {
    /// Read-only, no network, no execution.
    Restricted,
    /// Read/write inside the sandbox directories, no network.
    Standard,
    /// Network and controlled process execution.
    Elevated,
    /// Full access; bypasses all restrictions.
    Unrestricted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(Capability::FS_WRITE.label(), "FS_WRITE");
        assert_eq!(Capability::BLOCK_CALL.label(), "BLOCK_CALL");
        assert_eq!(Capability::UNSAFE.label(), "UNSAFE");
    }

    #[test]
    fn test_capability_set_operations() {
        let caps = Capability::FS_READ | Capability::FS_WRITE;
        assert!(caps.contains(Capability::FS_READ));
        assert!(!caps.contains(Capability::NET_CONNECT));
    }
}
