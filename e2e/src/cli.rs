//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use e2e_env::application::services::teardown;
use e2e_env::domain::stack::{normalize_identity, stack_name};
use e2e_env::infra::command_runner::ENGINE_CMD_TIMEOUT;
use e2e_env::infra::{
    PulumiEngine, PulumiProgram, TokioCommandRunner, TracingReporter, YamlConfigStore,
    current_identity,
};

/// Maintenance commands for end-to-end test stacks
#[derive(Parser)]
#[command(
    name = "e2e-env",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Identity to scope stack names with (defaults to the current OS user)
    #[arg(long, global = true)]
    pub identity: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the engine stack name for a logical stack
    StackName(StackNameArgs),

    /// Refresh, destroy and remove a stack
    Destroy(DestroyArgs),
}

#[derive(Args)]
pub struct StackNameArgs {
    /// Logical stack name
    pub name: String,
}

#[derive(Args)]
pub struct DestroyArgs {
    /// Logical stack name
    pub name: String,

    /// Directory holding the Pulumi project the stack was created from
    #[arg(long)]
    pub project_dir: PathBuf,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded or the command fails.
    pub async fn run(self) -> Result<()> {
        let identity = self
            .identity
            .as_deref()
            .map_or_else(current_identity, |raw| normalize_identity(Some(raw)));
        match self.command {
            Command::StackName(args) => {
                println!("{}", stack_name(&identity, &args.name));
                Ok(())
            }
            Command::Destroy(args) => destroy(&identity, args).await,
        }
    }
}

async fn destroy(identity: &str, args: DestroyArgs) -> Result<()> {
    let config = YamlConfigStore.load()?;
    let name = stack_name(identity, &args.name);
    let engine = PulumiEngine::new(TokioCommandRunner::new(ENGINE_CMD_TIMEOUT));
    let program = PulumiProgram::new(args.project_dir);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling teardown");
            on_signal.cancel();
        }
    });

    let stack = engine
        .select(&name, &program)
        .await
        .with_context(|| format!("cannot select stack {name}"))?;
    teardown(&stack, &config.stack, &cancel, &TracingReporter).await?;
    println!("destroyed {name}");
    Ok(())
}
