//! nodesync configuration types and loading

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// Roster entry holding defaults for every node
pub const DEFAULT_NODE: &str = "*";

/// Main nodesync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Where the controller listens and how nodes reach it
    pub controller: ControllerConfig,

    /// Node-side callback host
    pub node: NodeConfig,

    /// Node roster: id to entry, with `*` holding defaults
    pub nodes: BTreeMap<String, NodeEntry>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .nodesync.yml
        let local_config = PathBuf::from(".nodesync.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/nodesync/nodesync.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("nodesync").join("nodesync.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Log level from the config file, read before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Resolve every named node to an address
    ///
    /// A node without its own address takes the `*` entry's address; a node
    /// with neither is an error.
    pub fn roster(&self) -> Result<BTreeMap<String, String>> {
        let default_address = self.nodes.get(DEFAULT_NODE).and_then(|entry| entry.address.as_deref());

        self.nodes
            .iter()
            .filter(|(id, _)| id.as_str() != DEFAULT_NODE)
            .map(|(id, entry)| {
                entry
                    .address
                    .as_deref()
                    .or(default_address)
                    .map(|address| (id.clone(), address.to_string()))
                    .ok_or_else(|| eyre::eyre!("Node '{}' has no address and no '{}' default", id, DEFAULT_NODE))
            })
            .collect()
    }

    /// Like [`roster`](Self::roster), but at least one named node is required
    pub fn require_roster(&self) -> Result<BTreeMap<String, String>> {
        let roster = self.roster()?;
        if roster.is_empty() {
            return Err(eyre::eyre!("No nodes configured; '{}' alone does not name a node", DEFAULT_NODE));
        }
        Ok(roster)
    }

    /// Address of a single node
    pub fn node_address(&self, id: &str) -> Option<String> {
        self.roster().ok()?.remove(id)
    }
}

/// Controller endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Address nodes connect to
    pub address: String,

    pub port: u16,

    /// Address the controller listens on
    pub bind: String,

    /// Connect timeout in milliseconds
    #[serde(rename = "connect-timeout-ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 1099,
            bind: "0.0.0.0".to_string(),
            connect_timeout_ms: 5000,
        }
    }
}

impl ControllerConfig {
    /// `address:port` nodes connect to
    pub fn address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// `bind:port` the controller listens on
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Node-side configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address the callback host binds to
    #[serde(rename = "callback-bind")]
    pub callback_bind: String,

    /// Host name sent to the controller instead of the bound address
    #[serde(rename = "advertise-host")]
    pub advertise_host: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            callback_bind: "127.0.0.1:0".to_string(),
            advertise_host: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeEntry {
    pub address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.controller.address(), "127.0.0.1:1099");
        assert_eq!(config.controller.bind_address(), "0.0.0.0:1099");
        assert_eq!(config.controller.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.node.callback_bind, "127.0.0.1:0");
        assert!(config.nodes.is_empty());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: DEBUG
controller:
  address: 10.0.0.1
  port: 2000
  bind: 10.0.0.1
  connect-timeout-ms: 250
node:
  callback-bind: 0.0.0.0:4000
  advertise-host: node-a.example
nodes:
  "*":
    address: 10.0.0.99
  node-1:
    address: 10.0.0.11
  node-2: {}
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("DEBUG"));
        assert_eq!(config.controller.address(), "10.0.0.1:2000");
        assert_eq!(config.controller.connect_timeout(), Duration::from_millis(250));
        assert_eq!(config.node.advertise_host.as_deref(), Some("node-a.example"));

        let roster = config.roster().unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster["node-1"], "10.0.0.11");
        assert_eq!(roster["node-2"], "10.0.0.99");
        assert_eq!(config.node_address("node-2").as_deref(), Some("10.0.0.99"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
controller:
  port: 3000
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.controller.port, 3000);
        assert_eq!(config.controller.address, "127.0.0.1");
        assert_eq!(config.controller.connect_timeout_ms, 5000);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_node_without_address_is_rejected() {
        let yaml = r#"
nodes:
  node-1: {}
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let err = config.roster().unwrap_err();
        assert!(err.to_string().contains("node-1"));
        assert!(config.node_address("node-1").is_none());
    }

    #[test]
    fn test_default_entry_alone_is_not_a_roster() {
        let yaml = r#"
nodes:
  "*":
    address: 10.0.0.1
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.roster().unwrap().is_empty());
        assert!(config.require_roster().is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.yml");
        fs::write(&path, "controller:\n  port: 4321\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.controller.port, 4321);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.yml");
        assert!(Config::load(Some(&path)).is_err());
        assert!(Config::load_log_level(Some(&path)).is_none());
    }

    #[test]
    #[serial]
    fn test_load_prefers_project_local_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".nodesync.yml"), "log-level: WARN\n").unwrap();

        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp.path()).unwrap();
        let level = Config::load_log_level(None);
        std::env::set_current_dir(previous).unwrap();

        assert_eq!(level.as_deref(), Some("WARN"));
    }
}
