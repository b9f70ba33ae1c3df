use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WeftError};

/// Top-level Weft configuration, loaded from `weft.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WeftError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| WeftError::Config(e.to_string()))
    }
}

/// Node-loop tuning for the execution coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Throttle between node executions, in milliseconds. Zero disables it.
    #[serde(default = "default_inter_node_delay_ms")]
    pub inter_node_delay_ms: u64,
    /// Duration a delay node sleeps when its data carries none.
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u64,
    /// Upper bound on node-loop iterations; a cyclic graph that keeps
    /// satisfying its conditions fails the run here instead of spinning.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// How often a paused run re-checks its status.
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,
}

fn default_inter_node_delay_ms() -> u64 {
    1000
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_max_steps() -> u32 {
    1000
}

fn default_pause_poll_ms() -> u64 {
    250
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inter_node_delay_ms: default_inter_node_delay_ms(),
            default_delay_ms: default_delay_ms(),
            max_steps: default_max_steps(),
            pause_poll_ms: default_pause_poll_ms(),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String {
    "weft.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// HTTP control-API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
}

fn default_bind() -> String {
    "127.0.0.1:8320".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_keys: vec![],
        }
    }
}

/// A named API key. The key name doubles as the owner id all of the
/// caller's executions are scoped to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub role: ApiKeyRole,
}

/// Access level attached to an API key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyRole {
    /// Read-only: status and listing.
    Viewer,
    /// Viewer plus execute/pause/resume/stop.
    #[default]
    Operator,
    Admin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.engine.inter_node_delay_ms, 1000);
        assert_eq!(config.engine.default_delay_ms, 1000);
        assert_eq!(config.engine.max_steps, 1000);
        assert_eq!(config.store.path, "weft.db");
        assert!(config.gateway.is_none());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [engine]
            inter_node_delay_ms = 0

            [gateway]
            bind = "0.0.0.0:9000"

            [[gateway.api_keys]]
            name = "ci"
            key = "wk_ci_key"
            role = "viewer"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.inter_node_delay_ms, 0);
        assert_eq!(config.engine.max_steps, 1000);

        let gateway = config.gateway.unwrap();
        assert_eq!(gateway.bind, "0.0.0.0:9000");
        assert_eq!(gateway.api_keys.len(), 1);
        assert_eq!(gateway.api_keys[0].role, ApiKeyRole::Viewer);
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/weft.toml")).unwrap_err();
        assert!(matches!(err, WeftError::ConfigNotFound(_)));
    }
}
