//! Command execution against a remote host.
//!
//! Two entry points with different failure handling: [`RemoteCommandClient::try_execute`]
//! hands the error back, [`RemoteCommandClient::execute`] fails the calling
//! test on the spot. Most call sites want the latter.

use crate::application::ports::RemoteExecutor;
use crate::domain::CommandError;

/// Thin wrapper around a [`RemoteExecutor`] transport.
pub struct RemoteCommandClient<T: RemoteExecutor> {
    transport: T,
}

impl<T: RemoteExecutor> RemoteCommandClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Where commands are sent, for diagnostics.
    #[must_use]
    pub fn target(&self) -> String {
        self.transport.target()
    }

    /// Run `command` and return raw stdout.
    ///
    /// # Errors
    ///
    /// The transport's [`CommandError`], unwrapped.
    pub async fn try_execute(&self, command: &str) -> Result<String, CommandError> {
        tracing::debug!(target_host = %self.transport.target(), command, "executing");
        self.transport.execute(command).await
    }

    /// Run `command` and return stdout, failing the current test on error.
    ///
    /// # Panics
    ///
    /// Panics when the command cannot be delivered or exits non-zero.
    pub async fn execute(&self, command: &str) -> String {
        match self.try_execute(command).await {
            Ok(stdout) => stdout,
            Err(e) => panic!("{}: {e}", self.transport.target()),
        }
    }
}
