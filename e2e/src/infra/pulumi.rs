//! Infrastructure implementation of the provisioning engine ports.
//!
//! `PulumiEngine<R>` drives the `pulumi` CLI through a `CommandRunner`, one
//! project directory per program. Engine-side state (backend, secrets
//! provider) comes from the usual `PULUMI_*` environment variables.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Output;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, EngineStack, ProgressReporter, ProvisioningEngine};
use crate::domain::{OutputValue, StackConfig, UpResult};
use crate::infra::command_runner::ENGINE_CMD_TIMEOUT;

/// A Pulumi project on disk (the directory holding `Pulumi.yaml`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulumiProgram {
    pub project_dir: PathBuf,
}

impl PulumiProgram {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
        }
    }
}

pub struct PulumiEngine<R: CommandRunner> {
    runner: Arc<R>,
}

impl<R: CommandRunner> PulumiEngine<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner: Arc::new(runner),
        }
    }

    /// Select an existing stack without creating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine does not know `stack_name`.
    pub async fn select(&self, stack_name: &str, program: &PulumiProgram) -> Result<PulumiStack<R>> {
        let stack = self.handle(stack_name, program);
        stack.pulumi(&["stack", "select"], &[]).await?;
        Ok(stack)
    }

    fn handle(&self, stack_name: &str, program: &PulumiProgram) -> PulumiStack<R> {
        PulumiStack {
            runner: Arc::clone(&self.runner),
            name: stack_name.to_string(),
            project_dir: program.project_dir.clone(),
        }
    }
}

impl<R: CommandRunner> ProvisioningEngine for PulumiEngine<R> {
    type Program = PulumiProgram;
    type Stack = PulumiStack<R>;

    async fn create_or_select(
        &self,
        stack_name: &str,
        program: &PulumiProgram,
    ) -> Result<PulumiStack<R>> {
        let stack = self.handle(stack_name, program);
        stack.pulumi(&["stack", "select", "--create"], &[]).await?;
        Ok(stack)
    }
}

pub struct PulumiStack<R: CommandRunner> {
    runner: Arc<R>,
    name: String,
    project_dir: PathBuf,
}

impl<R: CommandRunner> PulumiStack<R> {
    /// Run `pulumi <subcommand> <extra> --stack <name> --cwd <dir> --non-interactive`.
    async fn pulumi(&self, subcommand: &[&str], extra: &[String]) -> Result<Output> {
        let cwd = self.project_dir.to_string_lossy();
        let mut args: Vec<&str> = subcommand.to_vec();
        args.extend(extra.iter().map(String::as_str));
        args.extend(["--stack", self.name.as_str(), "--cwd", &*cwd, "--non-interactive"]);

        let what = format!("pulumi {}", subcommand.join(" "));
        let output = self
            .runner
            .run_with_timeout("pulumi", &args, ENGINE_CMD_TIMEOUT)
            .await
            .context(what.clone())?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{what} failed for stack {}: {}", self.name, stderr.trim());
        }
        Ok(output)
    }
}

impl<R: CommandRunner> EngineStack for PulumiStack<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn set_all_config(&self, config: &StackConfig) -> Result<()> {
        self.pulumi(&["config", "set-all"], &config_args(config)).await?;
        Ok(())
    }

    async fn up(&self, progress: &dyn ProgressReporter) -> Result<UpResult> {
        progress.step(&format!("pulumi up {}", self.name));
        let output = self
            .pulumi(&["up", "--yes", "--skip-preview", "--suppress-progress"], &[])
            .await?;
        forward_lines(progress, &output);

        let outputs = self
            .pulumi(&["stack", "output", "--json", "--show-secrets"], &[])
            .await?;
        let result = parse_stack_outputs(&outputs.stdout)?;
        progress.success(&format!("stack {} up", self.name));
        Ok(result)
    }

    async fn refresh(&self) -> Result<()> {
        self.pulumi(&["refresh", "--yes", "--skip-preview"], &[]).await?;
        Ok(())
    }

    async fn destroy(&self, progress: &dyn ProgressReporter) -> Result<()> {
        progress.step(&format!("pulumi destroy {}", self.name));
        let output = self
            .pulumi(&["destroy", "--yes", "--skip-preview", "--suppress-progress"], &[])
            .await?;
        forward_lines(progress, &output);
        progress.success(&format!("stack {} destroyed", self.name));
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        self.pulumi(&["stack", "rm", "--yes"], &[]).await?;
        Ok(())
    }
}

fn config_args(config: &StackConfig) -> Vec<String> {
    config
        .iter()
        .flat_map(|(key, value)| {
            let flag = if value.secret { "--secret" } else { "--plaintext" };
            [flag.to_string(), format!("{key}={}", value.value)]
        })
        .collect()
}

fn forward_lines(progress: &dyn ProgressReporter, output: &Output) {
    for line in String::from_utf8_lossy(&output.stdout).lines() {
        let line = line.trim_end();
        if !line.is_empty() {
            progress.step(line);
        }
    }
}

/// Parse `pulumi stack output --json` into an up-result.
///
/// # Errors
///
/// Returns an error if the payload is not a JSON object.
pub fn parse_stack_outputs(raw: &[u8]) -> Result<UpResult> {
    let map: HashMap<String, serde_json::Value> =
        serde_json::from_slice(raw).context("parsing pulumi stack outputs")?;
    Ok(UpResult::new(
        map.into_iter()
            .map(|(k, v)| (k, OutputValue::from(v)))
            .collect(),
    ))
}
