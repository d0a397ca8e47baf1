//! Typed domain error enums.
//!
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator. Each enum maps to one failure family: provisioning,
//! remote command execution, agent readiness, and output deserialization.

use std::time::Duration;

use thiserror::Error;

use crate::domain::stack::StackStage;

// ── Stack errors ──────────────────────────────────────────────────────────────

/// Errors surfaced by the stack cache and the provisioning stages it drives.
#[derive(Debug, Error)]
pub enum StackError {
    /// No cached stack exists for the key. No engine call was made.
    #[error("stack '{name}' not found in environment '{environment}'")]
    NotFound { environment: String, name: String },

    /// The provisioning engine failed. `source` is the engine error, untouched.
    #[error("{stage} failed for stack '{stack}'")]
    Engine {
        stage: StackStage,
        stack: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stage} of stack '{stack}' did not finish within {}s", .after.as_secs())]
    Timeout {
        stage: StackStage,
        stack: String,
        after: Duration,
    },

    #[error("{stage} of stack '{stack}' was cancelled")]
    Cancelled { stage: StackStage, stack: String },
}

impl StackError {
    /// Returns `true` for the cache-consistency condition (key not cached).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ── Remote command errors ─────────────────────────────────────────────────────

/// Errors from running a command against a remote host.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command never reached the remote side (spawn failure, dial failure,
    /// local timeout).
    #[error("transport to {target} failed: {reason}")]
    Transport { target: String, reason: String },

    /// The command ran and exited with a non-zero code.
    #[error("command `{command}` exited with {}: {}", .code.map_or_else(|| "signal".to_string(), |c| format!("code {c}")), .stderr.trim())]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

impl CommandError {
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

// ── Readiness errors ──────────────────────────────────────────────────────────

/// Errors from waiting on the agent readiness gate.
#[derive(Debug, Error)]
pub enum ReadinessError {
    /// Every probe failed for the whole budget.
    #[error(
        "agent not ready after {}s ({attempts} probes); last error: {}",
        .after.as_secs(),
        .last_error.as_deref().unwrap_or("none")
    )]
    Timeout {
        after: Duration,
        attempts: u32,
        last_error: Option<String>,
    },

    /// A probe succeeded but its payload does not look like a version banner.
    #[error("agent status probe returned an unrecognised payload: {output:?}")]
    Malformed { output: String },
}

/// Errors from running an agent command behind the readiness gate.
#[derive(Debug, Error)]
pub enum AgentCommandError {
    #[error(transparent)]
    Readiness(#[from] ReadinessError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

impl AgentCommandError {
    #[must_use]
    pub fn is_readiness_timeout(&self) -> bool {
        matches!(self, Self::Readiness(ReadinessError::Timeout { .. }))
    }
}

// ── Deserialization errors ────────────────────────────────────────────────────

/// Errors turning a stack output bag into a typed connection info.
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("stack output '{name}' is missing")]
    MissingOutput { name: String },

    #[error("stack output '{name}' is malformed: {source}")]
    Malformed {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors bootstrapping a service client from an up-result.
#[derive(Debug, Error)]
pub enum ClientInitError {
    #[error(transparent)]
    Deserialize(#[from] DeserializeError),

    #[error("client initialisation failed")]
    Init(#[source] anyhow::Error),
}
