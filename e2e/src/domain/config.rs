//! Configuration schema for the e2e environment layer.
//!
//! Pure types only; loading from disk and env lives in `crate::infra::config`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.test_infra_config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct E2eConfig {
    pub stack: StackTimeouts,
    pub ssh: SshSettings,
    pub agent: ReadinessPolicy,
}

/// Independent deadlines for each provisioning stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackTimeouts {
    pub up_timeout_secs: u64,
    pub destroy_timeout_secs: u64,
    pub remove_timeout_secs: u64,
}

impl Default for StackTimeouts {
    fn default() -> Self {
        Self {
            up_timeout_secs: 20 * 60,
            destroy_timeout_secs: 60 * 60,
            remove_timeout_secs: 20 * 60,
        }
    }
}

impl StackTimeouts {
    #[must_use]
    pub fn up(&self) -> Duration {
        Duration::from_secs(self.up_timeout_secs)
    }

    #[must_use]
    pub fn destroy(&self) -> Duration {
        Duration::from_secs(self.destroy_timeout_secs)
    }

    #[must_use]
    pub fn remove(&self) -> Duration {
        Duration::from_secs(self.remove_timeout_secs)
    }
}

/// SSH transport settings shared by every host client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    /// Overrides the user reported by the stack outputs.
    pub user: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub dial_attempts: u32,
    pub backoff_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: None,
            private_key_path: None,
            dial_attempts: 5,
            backoff_secs: 2,
            connect_timeout_secs: 10,
        }
    }
}

impl SshSettings {
    #[must_use]
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

/// Bounded-retry budget of the agent readiness gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessPolicy {
    pub ready_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            ready_timeout_secs: 60,
            poll_interval_ms: 1000,
        }
    }
}

impl ReadinessPolicy {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

// ── Env overrides ────────────────────────────────────────────────────────────

/// Flat view of the `E2E_*` variables that override file values.
#[derive(Debug, Default, Deserialize)]
pub struct EnvOverrides {
    pub stack_up_timeout_secs: Option<u64>,
    pub stack_destroy_timeout_secs: Option<u64>,
    pub stack_remove_timeout_secs: Option<u64>,
    pub ssh_user: Option<String>,
    pub ssh_private_key_path: Option<PathBuf>,
    pub ssh_dial_attempts: Option<u32>,
    pub ssh_backoff_secs: Option<u64>,
    pub agent_ready_timeout_secs: Option<u64>,
    pub agent_poll_interval_ms: Option<u64>,
}

impl E2eConfig {
    /// Apply env overrides on top of file values.
    #[must_use]
    pub fn with_overrides(mut self, env: EnvOverrides) -> Self {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *slot = v;
            }
        }
        set(&mut self.stack.up_timeout_secs, env.stack_up_timeout_secs);
        set(&mut self.stack.destroy_timeout_secs, env.stack_destroy_timeout_secs);
        set(&mut self.stack.remove_timeout_secs, env.stack_remove_timeout_secs);
        if env.ssh_user.is_some() {
            self.ssh.user = env.ssh_user;
        }
        if env.ssh_private_key_path.is_some() {
            self.ssh.private_key_path = env.ssh_private_key_path;
        }
        set(&mut self.ssh.dial_attempts, env.ssh_dial_attempts);
        set(&mut self.ssh.backoff_secs, env.ssh_backoff_secs);
        set(&mut self.agent.ready_timeout_secs, env.agent_ready_timeout_secs);
        set(&mut self.agent.poll_interval_ms, env.agent_poll_interval_ms);
        self
    }
}
