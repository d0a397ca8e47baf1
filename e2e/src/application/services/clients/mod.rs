//! Typed service clients built on [`RemoteCommandClient`](super::remote::RemoteCommandClient).
//!
//! Side effects stay on the remote host; a client only keeps its connection
//! info and, for agents, the readiness gate.

pub mod agent;
pub mod docker;
pub mod vm;

pub use agent::{AgentClient, HostAgentExecutor};
pub use docker::{ContainerAgentExecutor, DockerAgentClient, DockerClient};
pub use vm::VmClient;
