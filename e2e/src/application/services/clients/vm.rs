//! Client for a bare provisioned host.

use crate::application::ports::{RemoteExecutor, TransportFactory};
use crate::application::services::deserializer::{ClientContext, StackClient};
use crate::application::services::remote::RemoteCommandClient;
use crate::domain::agent::quote_arg;
use crate::domain::connection::HOST_OUTPUT;
use crate::domain::{CommandError, HostConnection, OsFamily};

pub struct VmClient<T: RemoteExecutor> {
    connection: HostConnection,
    remote: RemoteCommandClient<T>,
}

impl<T: RemoteExecutor> VmClient<T> {
    pub fn new(connection: HostConnection, transport: T) -> Self {
        Self {
            connection,
            remote: RemoteCommandClient::new(transport),
        }
    }

    #[must_use]
    pub fn connection(&self) -> &HostConnection {
        &self.connection
    }

    #[must_use]
    pub fn os_family(&self) -> OsFamily {
        self.connection.os_family
    }

    /// # Errors
    ///
    /// See [`RemoteCommandClient::try_execute`].
    pub async fn try_execute(&self, command: &str) -> Result<String, CommandError> {
        self.remote.try_execute(command).await
    }

    /// # Panics
    ///
    /// See [`RemoteCommandClient::execute`].
    pub async fn execute(&self, command: &str) -> String {
        self.remote.execute(command).await
    }

    /// # Panics
    ///
    /// Panics if the command fails.
    pub async fn hostname(&self) -> String {
        self.execute("hostname").await.trim().to_string()
    }

    /// # Panics
    ///
    /// Panics if the check cannot be run.
    pub async fn file_exists(&self, path: &str) -> bool {
        let path = quote_arg(path, self.os_family());
        let cmd = match self.os_family() {
            OsFamily::Windows => format!("Test-Path -Path {path}"),
            OsFamily::Linux | OsFamily::MacOs => {
                format!("test -e {path} && echo true || echo false")
            }
        };
        self.execute(&cmd).await.trim().eq_ignore_ascii_case("true")
    }

    /// # Panics
    ///
    /// Panics if the file cannot be read.
    pub async fn read_file(&self, path: &str) -> String {
        let path = quote_arg(path, self.os_family());
        let cmd = match self.os_family() {
            OsFamily::Windows => format!("Get-Content -Raw -Path {path}"),
            OsFamily::Linux | OsFamily::MacOs => format!("cat {path}"),
        };
        self.execute(&cmd).await
    }
}

impl<F: TransportFactory> StackClient<F> for VmClient<F::Transport> {
    type Connection = HostConnection;
    const OUTPUT: &'static str = HOST_OUTPUT;

    fn init(ctx: &ClientContext<F>, connection: HostConnection) -> anyhow::Result<Self> {
        let transport = ctx.connector.connect(&connection)?;
        Ok(Self::new(connection, transport))
    }
}
