//! Application services built on the ports.
//!
//! Services import only from `crate::domain` and `crate::application::ports`
//! and never from `crate::infra`.

pub mod agent_runner;
pub mod clients;
pub mod deserializer;
pub mod remote;
pub mod stack_manager;

#[cfg(test)]
pub(crate) mod test_support;

pub use agent_runner::{AgentCommandRunner, ReadinessState};
pub use deserializer::{ClientContext, ConnectionDeserializer, StackClient};
pub use remote::RemoteCommandClient;
pub use stack_manager::{StackManager, teardown};
