//! e2e-env - maintenance tool for end-to-end test stacks

#![cfg_attr(test, allow(clippy::expect_used))]

use clap::Parser;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() {
    e2e_env::telemetry::init();
    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
