//! Typed connection infos derived from a stack's output bag.
//!
//! Each service kind reads one named output. Values are immutable once
//! built and owned by exactly one service client.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Output names ─────────────────────────────────────────────────────────────

/// Output holding a [`HostConnection`].
pub const HOST_OUTPUT: &str = "host";
/// Output holding an [`AgentConnection`].
pub const AGENT_OUTPUT: &str = "agent";
/// Output holding a [`DockerConnection`].
pub const DOCKER_OUTPUT: &str = "docker";

const DEFAULT_SSH_PORT: u16 = 22;

// ── Host ─────────────────────────────────────────────────────────────────────

/// Operating system family of a provisioned host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    #[default]
    Linux,
    Windows,
    #[serde(alias = "darwin")]
    MacOs,
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::MacOs => "macos",
        })
    }
}

/// SSH reachability of a provisioned host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConnection {
    pub address: String,
    pub username: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub os_family: OsFamily,
}

impl HostConnection {
    /// `user@address` destination string.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.address)
    }
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

// ── Agent ────────────────────────────────────────────────────────────────────

/// Ports exposed by the agent components on a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentPorts {
    pub cmd: u16,
    pub ipc: u16,
    pub dogstatsd: u16,
    pub trace: u16,
    pub process: u16,
}

impl Default for AgentPorts {
    fn default() -> Self {
        Self {
            cmd: 5001,
            ipc: 5009,
            dogstatsd: 8125,
            trace: 8126,
            process: 6062,
        }
    }
}

/// An agent installed directly on a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConnection {
    pub host: HostConnection,
    #[serde(default)]
    pub ports: AgentPorts,
}

// ── Docker ───────────────────────────────────────────────────────────────────

/// A docker daemon on a host, optionally running an agent container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerConnection {
    pub host: HostConnection,
    #[serde(default)]
    pub agent_container: Option<String>,
    #[serde(default)]
    pub ports: AgentPorts,
}
