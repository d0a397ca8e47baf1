//! Clients for a docker host and for an agent running in one of its containers.

use std::sync::Arc;

use crate::application::ports::{AgentExecutor, RemoteExecutor, TransportFactory};
use crate::application::services::clients::agent::AgentClient;
use crate::application::services::deserializer::{ClientContext, StackClient};
use crate::application::services::remote::RemoteCommandClient;
use crate::domain::agent::{AgentTarget, agent_command, container_exec_command, quote_arg};
use crate::domain::config::ReadinessPolicy;
use crate::domain::connection::DOCKER_OUTPUT;
use crate::domain::{CommandError, DockerConnection, OsFamily};

/// Docker daemon operations, issued through the host's transport.
pub struct DockerClient<T: RemoteExecutor> {
    connection: DockerConnection,
    remote: Arc<RemoteCommandClient<T>>,
}

impl<T: RemoteExecutor> DockerClient<T> {
    pub fn new(connection: DockerConnection, transport: T) -> Self {
        Self {
            connection,
            remote: Arc::new(RemoteCommandClient::new(transport)),
        }
    }

    #[must_use]
    pub fn connection(&self) -> &DockerConnection {
        &self.connection
    }

    /// Names of the running containers.
    ///
    /// # Panics
    ///
    /// Panics if `docker ps` fails.
    pub async fn container_names(&self) -> Vec<String> {
        self.remote
            .execute("docker ps --format '{{.Names}}'")
            .await
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()
    }

    /// # Errors
    ///
    /// See [`RemoteCommandClient::try_execute`].
    pub async fn try_exec_in_container(
        &self,
        container: &str,
        command: &str,
    ) -> Result<String, CommandError> {
        self.remote
            .try_execute(&container_exec_command(container, command))
            .await
    }

    /// # Panics
    ///
    /// Panics if the command fails.
    pub async fn exec_in_container(&self, container: &str, command: &str) -> String {
        self.remote
            .execute(&container_exec_command(container, command))
            .await
    }

    /// Combined stdout and stderr of `container`.
    ///
    /// # Panics
    ///
    /// Panics if `docker logs` fails.
    pub async fn logs(&self, container: &str) -> String {
        self.remote
            .execute(&format!("docker logs {} 2>&1", quote_arg(container, OsFamily::Linux)))
            .await
    }

    /// An agent executor bound to `container`, sharing this client's transport.
    #[must_use]
    pub fn agent_executor(&self, container: &str) -> ContainerAgentExecutor<T> {
        ContainerAgentExecutor {
            remote: Arc::clone(&self.remote),
            target: AgentTarget::Container(container.to_string()),
        }
    }
}

/// Runs the agent inside a container via `docker exec`.
pub struct ContainerAgentExecutor<T: RemoteExecutor> {
    remote: Arc<RemoteCommandClient<T>>,
    target: AgentTarget,
}

impl<T: RemoteExecutor> AgentExecutor for ContainerAgentExecutor<T> {
    async fn execute(&self, args: &[&str]) -> Result<String, CommandError> {
        self.remote
            .try_execute(&agent_command(&self.target, args))
            .await
    }
}

/// A docker host whose agent runs in a container.
pub struct DockerAgentClient<T: RemoteExecutor> {
    docker: DockerClient<T>,
    agent: AgentClient<ContainerAgentExecutor<T>>,
}

impl<T: RemoteExecutor> DockerAgentClient<T> {
    /// # Errors
    ///
    /// Returns an error when the connection names no agent container.
    pub fn new(
        connection: DockerConnection,
        transport: T,
        readiness: ReadinessPolicy,
    ) -> anyhow::Result<Self> {
        let container = connection
            .agent_container
            .clone()
            .ok_or_else(|| anyhow::anyhow!("docker output has no agent container"))?;
        let ports = connection.ports;
        let docker = DockerClient::new(connection, transport);
        let agent = AgentClient::new(docker.agent_executor(&container), ports, readiness);
        Ok(Self { docker, agent })
    }

    #[must_use]
    pub fn docker(&self) -> &DockerClient<T> {
        &self.docker
    }

    #[must_use]
    pub fn agent(&self) -> &AgentClient<ContainerAgentExecutor<T>> {
        &self.agent
    }
}

impl<F: TransportFactory> StackClient<F> for DockerClient<F::Transport> {
    type Connection = DockerConnection;
    const OUTPUT: &'static str = DOCKER_OUTPUT;

    fn init(ctx: &ClientContext<F>, connection: DockerConnection) -> anyhow::Result<Self> {
        let transport = ctx.connector.connect(&connection.host)?;
        Ok(Self::new(connection, transport))
    }
}

impl<F: TransportFactory> StackClient<F> for DockerAgentClient<F::Transport> {
    type Connection = DockerConnection;
    const OUTPUT: &'static str = DOCKER_OUTPUT;

    fn init(ctx: &ClientContext<F>, connection: DockerConnection) -> anyhow::Result<Self> {
        let transport = ctx.connector.connect(&connection.host)?;
        Self::new(connection, transport, ctx.readiness)
    }
}
