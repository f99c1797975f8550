//! Permission profile attached to every execution request

use serde::{Deserialize, Serialize};

/// Default wall-clock budget in milliseconds
pub const DEFAULT_MAX_EXECUTION_TIME_MS: u64 = 30_000;
/// Default memory ceiling in bytes (128 MiB)
pub const DEFAULT_MAX_MEMORY_BYTES: u64 = 128 * 1024 * 1024;

const PERMISSIVE_MAX_EXECUTION_TIME_MS: u64 = 60_000;
const PERMISSIVE_MAX_MEMORY_BYTES: u64 = 512 * 1024 * 1024;

/// Declarative capability flags and resource ceilings for one script.
///
/// Missing JSON keys fall back to the sandbox defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionProfile {
    #[serde(rename = "allowIO")]
    pub allow_io: bool,
    #[serde(rename = "allowNetwork")]
    pub allow_network: bool,
    #[serde(rename = "allowHostAccess")]
    pub allow_host_access: bool,
    #[serde(rename = "allowFileAccess")]
    pub allow_file_access: bool,
    #[serde(rename = "allowCreateThread")]
    pub allow_create_thread: bool,
    #[serde(rename = "allowEnvironmentAccess")]
    pub allow_environment_access: bool,
    /// Milliseconds (advisory)
    #[serde(rename = "maxExecutionTime")]
    pub max_execution_time: u64,
    /// Bytes (advisory)
    #[serde(rename = "maxMemoryUsage")]
    pub max_memory_usage: u64,
}

impl PermissionProfile {
    /// Everything denied, 30s / 128 MiB
    pub fn sandbox() -> Self {
        Self {
            allow_io: false,
            allow_network: false,
            allow_host_access: false,
            allow_file_access: false,
            allow_create_thread: false,
            allow_environment_access: false,
            max_execution_time: DEFAULT_MAX_EXECUTION_TIME_MS,
            max_memory_usage: DEFAULT_MAX_MEMORY_BYTES,
        }
    }

    /// Everything allowed, 60s / 512 MiB
    pub fn permissive() -> Self {
        Self {
            allow_io: true,
            allow_network: true,
            allow_host_access: true,
            allow_file_access: true,
            allow_create_thread: true,
            allow_environment_access: true,
            max_execution_time: PERMISSIVE_MAX_EXECUTION_TIME_MS,
            max_memory_usage: PERMISSIVE_MAX_MEMORY_BYTES,
        }
    }
}

impl Default for PermissionProfile {
    fn default() -> Self {
        Self::sandbox()
    }
}
