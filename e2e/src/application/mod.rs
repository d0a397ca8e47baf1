//! Application layer: port traits and the services built on them.
//!
//! This module depends only on `crate::domain`, never on `crate::infra`.

pub mod ports;
pub mod services;

pub use ports::{
    AgentExecutor, CommandRunner, EngineStack, ProgressReporter, ProvisioningEngine,
    RemoteExecutor, TransportFactory,
};
