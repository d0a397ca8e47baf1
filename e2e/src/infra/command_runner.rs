//! Infrastructure implementation of the `CommandRunner` port.
//!
//! Every external program this crate drives goes through here.

use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::application::ports::CommandRunner;

/// Default timeout for a single remote command (ssh round-trip included).
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Upper bound for one engine CLI call; stage deadlines are usually shorter.
pub const ENGINE_CMD_TIMEOUT: Duration = Duration::from_secs(3 * 60 * 60);

/// Runs local processes (`ssh`, `pulumi`) with a per-call timeout.
///
/// The child is killed when the timeout fires and, through `kill_on_drop`,
/// when a stage deadline or cancellation drops the future.
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CMD_TIMEOUT)
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.run_with_timeout(program, args, self.timeout).await
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output> {
        tracing::debug!(program, ?args, timeout_secs = timeout.as_secs(), "spawning");
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, stdout, stderr) = tokio::select! {
            collected = async {
                tokio::join!(child.wait(), drain(stdout), drain(stderr))
            } => collected,
            () = tokio::time::sleep(timeout) => {
                child.start_kill().ok();
                anyhow::bail!("{program} timed out after {}s", timeout.as_secs());
            }
        };
        Ok(Output {
            status: status.with_context(|| format!("waiting for {program}"))?,
            stdout,
            stderr,
        })
    }
}

/// Read a child pipe to the end; a missing or broken pipe yields what was read.
async fn drain(pipe: Option<impl AsyncRead + Unpin>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}
