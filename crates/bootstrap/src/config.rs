//! Bootstrap configuration.
//!
//! Every identity the reconciliation pass depends on (ticket title, tracker
//! repository, approval keyword, cluster addresses, provisioning commands)
//! lives in [`BootstrapConfig`] and is passed explicitly into each component.
//! The file format is TOML; every field has a default so a partial file (or
//! no file at all) is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::command::CommandSpec;
use crate::error::{BootstrapError, Result};

/// Environment variable that overrides the token file.
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Top-level configuration for one reconciliation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Tracker identity and credentials.
    pub tracker: TrackerConfig,
    /// Cluster topology and addresses.
    pub cluster: ClusterConfig,
    /// External commands driven by the checker.
    pub commands: CommandsConfig,
    /// Credential install paths.
    pub credentials: CredentialsConfig,
}

/// Issue tracker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Title that identifies the single rebuild ticket (exact, case-sensitive).
    pub rebuild_title: String,
    /// Label that authorizes remediation (case-insensitive).
    pub approval_label: String,
    /// API base URL.
    pub api_url: String,
    /// File holding the access token.
    pub token_path: PathBuf,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            owner: "brotherlogic".to_string(),
            repo: "cluster2".to_string(),
            rebuild_title: "Request Cluster Rebuild".to_string(),
            approval_label: "proceed".to_string(),
            api_url: "https://api.github.com".to_string(),
            token_path: PathBuf::from("/home/simon/.pat"),
        }
    }
}

impl TrackerConfig {
    /// Full repository path (owner/repo).
    #[must_use]
    pub fn repo_path(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Cluster topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Ansible inventory listing the expected nodes.
    pub inventory_path: PathBuf,
    /// Control-plane host the credential file is copied from.
    pub control_plane_address: String,
    /// Address clients should use to reach the API server.
    pub lan_address: String,
    /// Address the generated credential file points at.
    pub loopback_address: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            inventory_path: PathBuf::from("/home/simon/cluster/inventory/my-cluster/hosts.ini"),
            control_plane_address: "192.168.68.51".to_string(),
            lan_address: "192.168.68.222".to_string(),
            loopback_address: "127.0.0.1".to_string(),
        }
    }
}

/// External command table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Lists cluster nodes as a table (header row, node name first column).
    pub list_nodes: CommandSpec,
    /// Installs provisioning dependencies.
    pub install_dependencies: CommandSpec,
    /// Builds the cluster.
    pub build_cluster: CommandSpec,
    /// Directory the provisioning commands run in.
    pub working_dir: Option<PathBuf>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            list_nodes: CommandSpec::new("kubectl", ["get", "nodes"]),
            install_dependencies: CommandSpec::new(
                "ansible-galaxy",
                ["install", "-r", "./collections/requirements.yml"],
            ),
            build_cluster: CommandSpec::new(
                "/home/simon/p3/bin/ansible-playbook",
                ["site.yml", "-i", "inventory/my-cluster/hosts.ini"],
            ),
            working_dir: None,
        }
    }
}

/// Credential install paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Credential file on the control-plane host.
    pub remote_path: String,
    /// Local directory receiving the credential file.
    pub local_dir: PathBuf,
    /// Local credential file.
    pub local_path: PathBuf,
    /// Directory holding the credential install cursor.
    pub state_dir: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            remote_path: "/etc/rancher/k3s/k3s.yaml".to_string(),
            local_dir: PathBuf::from("/home/simon/.kube"),
            local_path: PathBuf::from("/home/simon/.kube/config"),
            state_dir: PathBuf::from("/home/simon/.bootstrap"),
        }
    }
}

impl BootstrapConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| BootstrapError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, falling back to defaults when it is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.tracker.rebuild_title.trim().is_empty() {
            return Err(BootstrapError::Config("tracker.rebuild_title is empty".into()));
        }
        if self.tracker.approval_label.trim().is_empty() {
            return Err(BootstrapError::Config("tracker.approval_label is empty".into()));
        }
        if self.tracker.owner.is_empty() || self.tracker.repo.is_empty() {
            return Err(BootstrapError::Config(
                "tracker.owner and tracker.repo are required".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the tracker access token.
    ///
    /// The environment variable wins over the token file. An empty token is
    /// treated as missing.
    pub fn load_token(&self) -> Result<String> {
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            let token = token.trim().to_string();
            if !token.is_empty() {
                debug!("Using tracker token from {TOKEN_ENV_VAR}");
                return Ok(token);
            }
        }

        let token = std::fs::read_to_string(&self.tracker.token_path).map_err(|e| {
            BootstrapError::Config(format!(
                "unable to read token file {}: {e}",
                self.tracker.token_path.display()
            ))
        })?;
        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(BootstrapError::Config(format!(
                "token file {} is empty",
                self.tracker.token_path.display()
            )));
        }
        Ok(token)
    }
}
