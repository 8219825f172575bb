//! Fabric configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Well-known paths and settings shared by every fabric service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Directory where named namespaces are bind-mounted
    pub netns_dir: PathBuf,

    /// Namespace used to create and look up veth pairs before they are moved
    pub reference_netns: PathBuf,

    /// Root of the metadata record store
    pub state_dir: PathBuf,

    /// Interactive shell started by attach
    pub shell: PathBuf,

    /// Prompt prefix shown inside attached shells
    pub prompt_prefix: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            netns_dir: PathBuf::from(Self::DEFAULT_NETNS_DIR),
            reference_netns: PathBuf::from(Self::DEFAULT_REFERENCE_NETNS),
            state_dir: PathBuf::from(Self::DEFAULT_STATE_DIR),
            shell: PathBuf::from("/bin/bash"),
            prompt_prefix: "netweave".to_string(),
        }
    }
}

impl NetConfig {
    /// Default directory for named namespaces (shared with iproute2)
    pub const DEFAULT_NETNS_DIR: &'static str = "/var/run/netns";

    /// Network namespace of PID 1, i.e. the host's root namespace
    pub const DEFAULT_REFERENCE_NETNS: &'static str = "/proc/1/ns/net";

    /// Default metadata directory
    pub const DEFAULT_STATE_DIR: &'static str = "/var/lib/netweave";

    /// Create a configuration with default paths
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with `NETWEAVE_*` environment overrides applied
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dir) = std::env::var_os("NETWEAVE_NETNS_DIR") {
            config.netns_dir = dir.into();
        }
        if let Some(path) = std::env::var_os("NETWEAVE_REFERENCE_NETNS") {
            config.reference_netns = path.into();
        }
        if let Some(dir) = std::env::var_os("NETWEAVE_STATE_DIR") {
            config.state_dir = dir.into();
        }
        if let Some(shell) = std::env::var_os("NETWEAVE_SHELL") {
            config.shell = shell.into();
        }

        config
    }

    /// Set the namespace mount directory
    #[must_use]
    pub fn with_netns_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.netns_dir = dir.into();
        self
    }

    /// Set the reference namespace path
    #[must_use]
    pub fn with_reference_netns(mut self, path: impl Into<PathBuf>) -> Self {
        self.reference_netns = path.into();
        self
    }

    /// Set the metadata directory
    #[must_use]
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    /// Set the attach shell
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Set the attach prompt prefix
    #[must_use]
    pub fn with_prompt_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prompt_prefix = prefix.into();
        self
    }

    /// Mount path for the namespace called `name`
    #[must_use]
    pub fn netns_path(&self, name: &str) -> PathBuf {
        self.netns_dir.join(name)
    }

    /// Reference namespace path
    #[must_use]
    pub fn reference(&self) -> &Path {
        &self.reference_netns
    }

    /// Prompt shown in a shell attached to `name`
    #[must_use]
    pub fn prompt_for(&self, name: &str) -> String {
        format!("{}@{name}:\\w $ ", self.prompt_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NetConfig::default();
        assert_eq!(config.netns_dir, PathBuf::from("/var/run/netns"));
        assert_eq!(config.reference(), Path::new("/proc/1/ns/net"));
        assert_eq!(config.netns_path("h1"), PathBuf::from("/var/run/netns/h1"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = NetConfig::new()
            .with_netns_dir("/tmp/ns")
            .with_state_dir("/tmp/state")
            .with_prompt_prefix("lab");

        assert_eq!(config.netns_path("s1"), PathBuf::from("/tmp/ns/s1"));
        assert_eq!(config.state_dir, PathBuf::from("/tmp/state"));
        assert_eq!(config.prompt_for("h1"), "lab@h1:\\w $ ");
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: NetConfig = serde_json::from_str(r#"{"state_dir": "/srv/netweave"}"#).unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/srv/netweave"));
        assert_eq!(config.netns_dir, PathBuf::from(NetConfig::DEFAULT_NETNS_DIR));
    }
}
