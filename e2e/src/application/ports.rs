//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`.
//!
//! Async methods are declared as `-> impl Future + Send` so services built on
//! top of them can be driven from any worker thread.

use std::future::Future;
use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::domain::{CommandError, HostConnection, StackConfig, UpResult};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts local process execution so infrastructure can be swapped or mocked.
pub trait CommandRunner: Send + Sync {
    /// Run a program and capture its output, using the runner's default timeout.
    fn run(&self, program: &str, args: &[&str]) -> impl Future<Output = Result<Output>> + Send;

    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> impl Future<Output = Result<Output>> + Send;
}

// ── Remote Transport Port ─────────────────────────────────────────────────────

/// A transport that runs a shell command on a remote host.
///
/// Dial retries belong to the transport; callers see a single outcome.
pub trait RemoteExecutor: Send + Sync {
    /// Human-readable target (`user@host:port`) for logs and errors.
    fn target(&self) -> String;

    /// Run `command` and return its raw stdout.
    ///
    /// # Errors
    ///
    /// [`CommandError::Transport`] when the command never reached the host,
    /// [`CommandError::NonZeroExit`] when it ran and failed.
    fn execute(&self, command: &str)
    -> impl Future<Output = Result<String, CommandError>> + Send;
}

/// Opens transports to provisioned hosts. Holds whatever credentials the
/// transport needs (SSH keys, user overrides).
pub trait TransportFactory: Send + Sync {
    type Transport: RemoteExecutor;

    /// # Errors
    ///
    /// Returns an error if the credentials for `host` cannot be resolved.
    fn connect(&self, host: &HostConnection) -> Result<Self::Transport>;
}

/// Runs the agent binary with `args`, wherever that binary lives.
pub trait AgentExecutor: Send + Sync {
    /// # Errors
    ///
    /// Same contract as [`RemoteExecutor::execute`].
    fn execute(&self, args: &[&str]) -> impl Future<Output = Result<String, CommandError>> + Send;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Receives progress from long-running engine operations.
pub trait ProgressReporter: Send + Sync {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Provisioning Engine Port ──────────────────────────────────────────────────

/// The declarative infrastructure engine, treated as an opaque dependency.
pub trait ProvisioningEngine: Send + Sync {
    /// The declarative body a stack is built from.
    type Program: Send + Sync;
    /// Engine-side handle of one stack.
    type Stack: EngineStack;

    /// Create the stack `stack_name` from `program`, or select it if the
    /// engine already knows it.
    fn create_or_select(
        &self,
        stack_name: &str,
        program: &Self::Program,
    ) -> impl Future<Output = Result<Self::Stack>> + Send;
}

/// Operations on a single engine stack.
pub trait EngineStack: Send + Sync {
    fn name(&self) -> &str;

    /// Set every key of `config` on the stack.
    fn set_all_config(&self, config: &StackConfig) -> impl Future<Output = Result<()>> + Send;

    /// Create or update resources and return the output bag.
    fn up(&self, progress: &dyn ProgressReporter) -> impl Future<Output = Result<UpResult>> + Send;

    /// Reconcile the engine's state with the real resources.
    fn refresh(&self) -> impl Future<Output = Result<()>> + Send;

    /// Destroy every resource of the stack.
    fn destroy(&self, progress: &dyn ProgressReporter) -> impl Future<Output = Result<()>> + Send;

    /// Remove the stack's registration from its workspace.
    fn remove(&self) -> impl Future<Output = Result<()>> + Send;
}
