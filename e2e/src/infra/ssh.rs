//! SSH transport over the system `ssh` client.
//!
//! `SshTransport` implements the `RemoteExecutor` port. Connection failures
//! (ssh exit code 255) are retried with exponential backoff up to the
//! configured number of dial attempts; every other outcome is final.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{CommandRunner, RemoteExecutor, TransportFactory};
use crate::domain::config::SshSettings;
use crate::domain::{CommandError, HostConnection};

/// Exit code reserved by `ssh` for its own connection errors.
const SSH_CONNECTION_ERROR: i32 = 255;

pub struct SshTransport<R: CommandRunner> {
    runner: Arc<R>,
    address: String,
    port: u16,
    user: String,
    private_key: Option<PathBuf>,
    dial_attempts: u32,
    backoff: Duration,
    connect_timeout_secs: u64,
}

impl<R: CommandRunner> SshTransport<R> {
    fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            "-p".to_string(),
            self.port.to_string(),
        ];
        if let Some(key) = &self.private_key {
            args.push("-i".to_string());
            args.push(key.to_string_lossy().into_owned());
        }
        args.push(format!("{}@{}", self.user, self.address));
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl<R: CommandRunner> RemoteExecutor for SshTransport<R> {
    fn target(&self) -> String {
        format!("{}@{}:{}", self.user, self.address, self.port)
    }

    async fn execute(&self, command: &str) -> Result<String, CommandError> {
        let args = self.ssh_args(command);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let attempts = self.dial_attempts.max(1);

        let mut attempt = 1;
        loop {
            let output = self
                .runner
                .run("ssh", &args)
                .await
                .map_err(|e| CommandError::Transport {
                    target: self.target(),
                    reason: format!("{e:#}"),
                })?;

            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            match output.status.code() {
                Some(0) => return Ok(stdout),
                Some(SSH_CONNECTION_ERROR) if attempt < attempts => {
                    let delay = self.backoff_for(attempt);
                    tracing::warn!(
                        target_host = %self.target(),
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %stderr.trim(),
                        "ssh connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Some(SSH_CONNECTION_ERROR) => {
                    return Err(CommandError::Transport {
                        target: self.target(),
                        reason: format!(
                            "ssh failed after {attempts} attempts: {}",
                            stderr.trim()
                        ),
                    });
                }
                code => {
                    return Err(CommandError::NonZeroExit {
                        command: command.to_string(),
                        code,
                        stdout,
                        stderr,
                    });
                }
            }
        }
    }
}

/// Opens [`SshTransport`]s with shared credentials and retry settings.
pub struct SshConnector<R: CommandRunner> {
    runner: Arc<R>,
    settings: SshSettings,
}

impl<R: CommandRunner> SshConnector<R> {
    pub fn new(runner: R, settings: SshSettings) -> Self {
        Self {
            runner: Arc::new(runner),
            settings,
        }
    }
}

impl<R: CommandRunner> TransportFactory for SshConnector<R> {
    type Transport = SshTransport<R>;

    fn connect(&self, host: &HostConnection) -> Result<SshTransport<R>> {
        let private_key = self
            .settings
            .private_key_path
            .as_deref()
            .map(expand_home)
            .transpose()?;
        if let Some(key) = &private_key {
            anyhow::ensure!(
                key.exists(),
                "ssh private key {} does not exist",
                key.display()
            );
        }
        Ok(SshTransport {
            runner: Arc::clone(&self.runner),
            address: host.address.clone(),
            port: host.port,
            user: self
                .settings
                .user
                .clone()
                .unwrap_or_else(|| host.username.clone()),
            private_key,
            dial_attempts: self.settings.dial_attempts,
            backoff: self.settings.backoff(),
            connect_timeout_secs: self.settings.connect_timeout_secs,
        })
    }
}

fn expand_home(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}
