//! Readiness gate in front of raw agent command execution.
//!
//! The gate starts closed. The first `status` probe that succeeds and carries
//! a version banner opens it for the lifetime of the runner; it never closes
//! again. While closed, every command waits behind a bounded poll loop.
//! Only one caller polls at a time; concurrent callers wait for its outcome.

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tokio::time::Instant;

use crate::application::ports::AgentExecutor;
use crate::domain::agent::parse_version_banner;
use crate::domain::config::ReadinessPolicy;
use crate::domain::{AgentCommandError, ReadinessError};

const PROBE_ARGS: &[&str] = &["status"];

/// Snapshot taken when the gate opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessState {
    pub ready_since: DateTime<Utc>,
    /// Version reported by the probe that opened the gate.
    pub version: String,
}

/// Gates an [`AgentExecutor`] behind the readiness probe.
pub struct AgentCommandRunner<E: AgentExecutor> {
    executor: E,
    policy: ReadinessPolicy,
    ready: OnceCell<ReadinessState>,
}

impl<E: AgentExecutor> AgentCommandRunner<E> {
    pub fn new(executor: E, policy: ReadinessPolicy) -> Self {
        Self {
            executor,
            policy,
            ready: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    #[must_use]
    pub fn readiness(&self) -> Option<&ReadinessState> {
        self.ready.get()
    }

    /// Block until the gate is open.
    ///
    /// # Errors
    ///
    /// [`ReadinessError::Timeout`] once the budget is spent,
    /// [`ReadinessError::Malformed`] as soon as a probe returns a payload
    /// without a version banner.
    pub async fn wait_ready(&self) -> Result<&ReadinessState, ReadinessError> {
        self.ready.get_or_try_init(|| self.poll_until_ready()).await
    }

    /// Run the agent with `args` once the gate is open.
    ///
    /// # Errors
    ///
    /// [`AgentCommandError::Readiness`] when the gate cannot be opened,
    /// [`AgentCommandError::Command`] when the command itself fails.
    pub async fn execute_command(&self, args: &[&str]) -> Result<String, AgentCommandError> {
        self.wait_ready().await?;
        Ok(self.executor.execute(args).await?)
    }

    async fn poll_until_ready(&self) -> Result<ReadinessState, ReadinessError> {
        let budget = self.policy.timeout();
        let interval = self.policy.interval();
        let deadline = Instant::now() + budget;
        let mut attempts = 0u32;
        let mut last_error = None;

        loop {
            attempts += 1;
            match tokio::time::timeout_at(deadline, self.executor.execute(PROBE_ARGS)).await {
                Ok(Ok(output)) => {
                    let Some(version) = parse_version_banner(&output) else {
                        return Err(ReadinessError::Malformed { output });
                    };
                    tracing::info!(version, attempts, "agent ready");
                    return Ok(ReadinessState {
                        ready_since: Utc::now(),
                        version: version.to_string(),
                    });
                }
                Ok(Err(e)) => {
                    tracing::debug!(attempt = attempts, error = %e, "agent not ready yet");
                    last_error = Some(e.to_string());
                }
                Err(_) => {
                    last_error = Some("status probe did not return before the deadline".into());
                    break;
                }
            }
            if Instant::now() + interval > deadline {
                break;
            }
            tokio::time::sleep(interval).await;
        }

        tracing::warn!(attempts, "agent readiness budget exhausted");
        Err(ReadinessError::Timeout {
            after: budget,
            attempts,
            last_error,
        })
    }
}
