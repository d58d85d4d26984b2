//! Configuration for the tickwatch watchdog.
//!
//! Settings come from an optional TOML file and are overridden by command
//! line flags. The resolved configuration is validated once at startup;
//! everything downstream assumes a valid configuration.
//!
//! # Example tickwatch.toml
//!
//! ```toml
//! poll-interval-minutes = 1
//! ticks-per-epoch = 676
//! seed = "..."
//! toggle-roles = ["MAIN", "AUX"]
//!
//! [[endpoints]]
//! address = "10.0.0.1"
//! port = 31841
//!
//! [[endpoints]]
//! address = "10.0.0.2"
//! ```

use crate::error::{Result, WatchdogError};
use crate::snapshot::END_TICK_MARGIN;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port the node tool listens on unless told otherwise.
pub const DEFAULT_NODE_PORT: u16 = 31841;

/// Default file name looked up in the working directory.
pub const CONFIG_FILENAME: &str = "tickwatch.toml";

/// One node, identified by address and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeEndpoint {
    /// Host name or IP address
    pub address: String,
    /// Node tool port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl NodeEndpoint {
    /// Create an endpoint.
    #[must_use]
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl std::fmt::Display for NodeEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

fn default_port() -> u16 {
    DEFAULT_NODE_PORT
}

fn default_poll_interval() -> u64 {
    1
}

fn default_cli_path() -> PathBuf {
    PathBuf::from("./qubic-cli")
}

fn default_broadcaster_path() -> PathBuf {
    PathBuf::from("./broadcastComputorTestnet")
}

fn default_toggle_roles() -> Vec<String> {
    vec!["MAIN".to_string(), "MAIN".to_string()]
}

fn default_command_timeout() -> u64 {
    60
}

/// Pair node addresses with ports.
///
/// An empty port list assigns [`DEFAULT_NODE_PORT`] to every address.
///
/// # Errors
///
/// Returns [`WatchdogError::EndpointMismatch`] when both lists are given
/// with different lengths.
pub fn endpoints_from_lists(addresses: &[String], ports: &[u16]) -> Result<Vec<NodeEndpoint>> {
    if ports.is_empty() {
        return Ok(addresses
            .iter()
            .map(|address| NodeEndpoint::new(address.trim(), DEFAULT_NODE_PORT))
            .collect());
    }

    if addresses.len() != ports.len() {
        return Err(WatchdogError::EndpointMismatch {
            addresses: addresses.len(),
            ports: ports.len(),
        });
    }

    Ok(addresses
        .iter()
        .zip(ports)
        .map(|(address, port)| NodeEndpoint::new(address.trim(), *port))
        .collect())
}

/// Resolved watchdog configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WatchdogConfig {
    /// Poll interval while the node is progressing, in minutes
    #[serde(default = "default_poll_interval")]
    pub poll_interval_minutes: u64,

    /// Nodes to manage; the first one is polled and broadcasts epochs
    #[serde(default)]
    pub endpoints: Vec<NodeEndpoint>,

    /// Ticks in one epoch
    #[serde(default)]
    pub ticks_per_epoch: u64,

    /// Path to the node administration tool
    #[serde(default = "default_cli_path")]
    pub cli_path: PathBuf,

    /// Path to the epoch broadcast tool
    #[serde(default = "default_broadcaster_path")]
    pub broadcaster_path: PathBuf,

    /// Operator seed passed to administrative commands
    #[serde(default)]
    pub seed: String,

    /// Role tokens passed to the main/aux toggle
    #[serde(default = "default_toggle_roles")]
    pub toggle_roles: Vec<String>,

    /// Upper bound for a single external command, in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            poll_interval_minutes: default_poll_interval(),
            endpoints: Vec::new(),
            ticks_per_epoch: 0,
            cli_path: default_cli_path(),
            broadcaster_path: default_broadcaster_path(),
            seed: String::new(),
            toggle_roles: default_toggle_roles(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl WatchdogConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WatchdogError::config_with_path(format!("failed to read config: {e}"), path.to_path_buf())
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), endpoints = config.endpoints.len(), "Loaded configuration");
        Ok(config)
    }

    /// Load `tickwatch.toml` from a directory, or defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILENAME);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this schema.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check that the configuration can drive the watchdog.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(WatchdogError::invalid("endpoints", "at least one node is required"));
        }
        if let Some(index) = self.endpoints.iter().position(|e| e.address.trim().is_empty()) {
            return Err(WatchdogError::invalid(
                "endpoints",
                format!("node {index} has an empty address"),
            ));
        }
        if self.poll_interval_minutes == 0 {
            return Err(WatchdogError::invalid(
                "poll-interval-minutes",
                "must be at least 1",
            ));
        }
        if self.ticks_per_epoch <= END_TICK_MARGIN {
            return Err(WatchdogError::invalid(
                "ticks-per-epoch",
                format!("must be greater than {END_TICK_MARGIN}"),
            ));
        }
        if self.command_timeout_secs == 0 {
            return Err(WatchdogError::invalid(
                "command-timeout-secs",
                "must be at least 1",
            ));
        }
        self.role_pair()?;
        Ok(())
    }

    /// The toggle role tokens as a pair.
    ///
    /// # Errors
    ///
    /// Returns an error unless exactly two non-empty tokens are configured.
    pub fn role_pair(&self) -> Result<[String; 2]> {
        match self.toggle_roles.as_slice() {
            [first, second] if !first.trim().is_empty() && !second.trim().is_empty() => {
                Ok([first.trim().to_string(), second.trim().to_string()])
            }
            _ => Err(WatchdogError::invalid(
                "toggle-roles",
                format!("expected two role tokens, got {:?}", self.toggle_roles),
            )),
        }
    }

    /// The node that is polled and broadcasts epochs.
    #[must_use]
    pub fn primary(&self) -> Option<&NodeEndpoint> {
        self.endpoints.first()
    }

    /// Poll interval as a duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes.saturating_mul(60))
    }

    /// Per-command timeout as a duration.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// A copy safe to print, with the seed masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.seed.is_empty() {
            copy.seed = "********".to_string();
        }
        copy
    }

    /// External tools that cannot be found.
    ///
    /// Bare names are looked up on `PATH`; anything with a directory
    /// component must exist as given.
    #[must_use]
    pub fn missing_tools(&self) -> Vec<PathBuf> {
        [&self.cli_path, &self.broadcaster_path]
            .into_iter()
            .filter(|tool| !tool_available(tool))
            .cloned()
            .collect()
    }
}

fn tool_available(tool: &Path) -> bool {
    if tool.components().count() > 1 {
        tool.exists()
    } else {
        which::which(tool).is_ok()
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub poll_interval_minutes: Option<u64>,
    pub node_addresses: Vec<String>,
    pub node_ports: Vec<u16>,
    pub ticks_per_epoch: Option<u64>,
    pub cli_path: Option<PathBuf>,
    pub broadcaster_path: Option<PathBuf>,
    pub seed: Option<String>,
    pub toggle_roles: Vec<String>,
    pub command_timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Apply the overrides on top of `config`.
    ///
    /// Node addresses replace the configured endpoints as a whole.
    ///
    /// # Errors
    ///
    /// Returns an error if the address and port lists cannot be paired.
    pub fn apply(self, mut config: WatchdogConfig) -> Result<WatchdogConfig> {
        if !self.node_addresses.is_empty() {
            config.endpoints = endpoints_from_lists(&self.node_addresses, &self.node_ports)?;
        } else if !self.node_ports.is_empty() {
            return Err(WatchdogError::invalid(
                "node-ports",
                "ports given without node IPs",
            ));
        }
        if let Some(minutes) = self.poll_interval_minutes {
            config.poll_interval_minutes = minutes;
        }
        if let Some(ticks) = self.ticks_per_epoch {
            config.ticks_per_epoch = ticks;
        }
        if let Some(path) = self.cli_path {
            config.cli_path = path;
        }
        if let Some(path) = self.broadcaster_path {
            config.broadcaster_path = path;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if !self.toggle_roles.is_empty() {
            config.toggle_roles = self.toggle_roles;
        }
        if let Some(secs) = self.command_timeout_secs {
            config.command_timeout_secs = secs;
        }
        Ok(config)
    }
}
