//! Server configuration
//!
//! Loaded once from the environment (after `.env`) and kept in a global.

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::Context;
use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_CONCURRENT_EXECUTIONS: usize = 8;

/// Server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:8080)
    pub bind_addr: String,
    /// Executions allowed to run at once on the blocking pool (default: 8)
    pub max_concurrent_executions: usize,
    /// Languages TOML overriding the embedded catalog
    pub languages_config: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_concurrent_executions: DEFAULT_MAX_CONCURRENT_EXECUTIONS,
            languages_config: None,
        }
    }
}

impl ServerConfig {
    /// Read `SCRIPT_RUNNER_ADDR`, `MAX_CONCURRENT_EXECUTIONS` and
    /// `LANGUAGES_CONFIG`
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = lookup("SCRIPT_RUNNER_ADDR").filter(|a| !a.trim().is_empty()) {
            config.bind_addr = addr.trim().to_string();
        }

        if let Some(raw) = lookup("MAX_CONCURRENT_EXECUTIONS") {
            let max = raw.trim().parse::<usize>().with_context(|| {
                format!("Invalid MAX_CONCURRENT_EXECUTIONS: {}", raw)
            })?;
            if max == 0 {
                anyhow::bail!("MAX_CONCURRENT_EXECUTIONS must be at least 1");
            }
            config.max_concurrent_executions = max;
        }

        config.languages_config = lookup("LANGUAGES_CONFIG")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(config)
    }
}

/// Global server configuration
static SERVER_CONFIG: OnceLock<ServerConfig> = OnceLock::new();

/// Initialize server configuration from the environment
pub fn init_config() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;

    SERVER_CONFIG
        .set(config)
        .map_err(|_| anyhow::anyhow!("Server configuration already initialized"))?;

    Ok(())
}

/// Get server configuration
pub fn get_config() -> &'static ServerConfig {
    SERVER_CONFIG.get().unwrap_or_else(|| {
        static DEFAULT: OnceLock<ServerConfig> = OnceLock::new();

        warn!("Server configuration not initialized, using default");
        DEFAULT.get_or_init(ServerConfig::default)
    })
}
