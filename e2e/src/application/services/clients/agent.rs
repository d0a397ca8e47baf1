//! Client for an agent, gated on readiness.
//!
//! Domain operations fail the calling test on error. [`AgentClient::try_run`]
//! is the error-returning escape hatch.

use crate::application::ports::{AgentExecutor, RemoteExecutor, TransportFactory};
use crate::application::services::agent_runner::{AgentCommandRunner, ReadinessState};
use crate::application::services::deserializer::{ClientContext, StackClient};
use crate::application::services::remote::RemoteCommandClient;
use crate::domain::agent::{AgentTarget, agent_command, parse_version_banner};
use crate::domain::config::ReadinessPolicy;
use crate::domain::connection::AGENT_OUTPUT;
use crate::domain::{AgentCommandError, AgentConnection, AgentPorts, CommandError};

/// Runs the agent installed on the host a transport connects to.
pub struct HostAgentExecutor<T: RemoteExecutor> {
    remote: RemoteCommandClient<T>,
    target: AgentTarget,
}

impl<T: RemoteExecutor> HostAgentExecutor<T> {
    pub fn new(remote: RemoteCommandClient<T>, target: AgentTarget) -> Self {
        Self { remote, target }
    }
}

impl<T: RemoteExecutor> AgentExecutor for HostAgentExecutor<T> {
    async fn execute(&self, args: &[&str]) -> Result<String, CommandError> {
        self.remote
            .try_execute(&agent_command(&self.target, args))
            .await
    }
}

pub struct AgentClient<E: AgentExecutor> {
    runner: AgentCommandRunner<E>,
    ports: AgentPorts,
}

impl<E: AgentExecutor> AgentClient<E> {
    pub fn new(executor: E, ports: AgentPorts, readiness: ReadinessPolicy) -> Self {
        Self {
            runner: AgentCommandRunner::new(executor, readiness),
            ports,
        }
    }

    #[must_use]
    pub fn ports(&self) -> &AgentPorts {
        &self.ports
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.runner.is_ready()
    }

    #[must_use]
    pub fn readiness(&self) -> Option<&ReadinessState> {
        self.runner.readiness()
    }

    /// Run the agent with `args` behind the readiness gate.
    ///
    /// # Errors
    ///
    /// See [`AgentCommandRunner::execute_command`].
    pub async fn try_run(&self, args: &[&str]) -> Result<String, AgentCommandError> {
        self.runner.execute_command(args).await
    }

    /// # Panics
    ///
    /// Panics when the agent never becomes ready or the command fails.
    pub async fn run(&self, args: &[&str]) -> String {
        match self.try_run(args).await {
            Ok(out) => out,
            Err(e) => panic!("agent {}: {e}", args.join(" ")),
        }
    }

    /// Raw `version` banner.
    ///
    /// # Panics
    ///
    /// See [`AgentClient::run`].
    pub async fn version(&self) -> String {
        self.run(&["version"]).await.trim().to_string()
    }

    /// `version` parsed as semver, `None` when the banner has no valid version.
    ///
    /// # Panics
    ///
    /// See [`AgentClient::run`].
    pub async fn parsed_version(&self) -> Option<semver::Version> {
        let banner = self.version().await;
        parse_version_banner(&banner).and_then(|v| semver::Version::parse(v).ok())
    }

    /// # Panics
    ///
    /// See [`AgentClient::run`].
    pub async fn status(&self) -> String {
        self.run(&["status"]).await
    }

    /// # Panics
    ///
    /// See [`AgentClient::run`].
    pub async fn hostname(&self) -> String {
        self.run(&["hostname"]).await.trim().to_string()
    }

    /// Runtime configuration as reported by `agent config`.
    ///
    /// # Panics
    ///
    /// Panics when the command fails or its output is not YAML.
    pub async fn config(&self) -> serde_yaml::Value {
        let raw = self.run(&["config"]).await;
        match serde_yaml::from_str(&raw) {
            Ok(value) => value,
            Err(e) => panic!("agent config is not valid YAML: {e}"),
        }
    }

    /// `Ok` when `agent health` reports every component healthy.
    ///
    /// # Errors
    ///
    /// The gate or command error; an unhealthy agent exits non-zero.
    pub async fn health(&self) -> Result<(), AgentCommandError> {
        self.try_run(&["health"]).await.map(|_| ())
    }
}

impl<F: TransportFactory> StackClient<F> for AgentClient<HostAgentExecutor<F::Transport>> {
    type Connection = AgentConnection;
    const OUTPUT: &'static str = AGENT_OUTPUT;

    fn init(ctx: &ClientContext<F>, connection: AgentConnection) -> anyhow::Result<Self> {
        let transport = ctx.connector.connect(&connection.host)?;
        let executor = HostAgentExecutor::new(
            RemoteCommandClient::new(transport),
            AgentTarget::Host(connection.host.os_family),
        );
        Ok(Self::new(executor, connection.ports, ctx.readiness))
    }
}
