//! Domain layer: pure types and functions with no I/O.
//!
//! Nothing in here spawns processes, touches the filesystem, or awaits.
//! Infrastructure and application code import from here, never the reverse.

pub mod agent;
pub mod config;
pub mod connection;
pub mod error;
pub mod stack;

pub use connection::{AgentConnection, AgentPorts, DockerConnection, HostConnection, OsFamily};
pub use error::{
    AgentCommandError, ClientInitError, CommandError, DeserializeError, ReadinessError,
    StackError,
};
pub use stack::{ConfigValue, OutputValue, StackConfig, StackKey, StackStage, StackState, UpResult};
