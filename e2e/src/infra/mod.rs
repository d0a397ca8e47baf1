//! Infrastructure adapters: process execution, ssh, the Pulumi CLI,
//! config loading and progress reporting.

pub mod command_runner;
pub mod config;
pub mod identity;
pub mod pulumi;
pub mod reporter;
pub mod ssh;

pub use command_runner::TokioCommandRunner;
pub use config::YamlConfigStore;
pub use identity::current_identity;
pub use pulumi::{PulumiEngine, PulumiProgram, PulumiStack};
pub use reporter::TracingReporter;
pub use ssh::{SshConnector, SshTransport};
