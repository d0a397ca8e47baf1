//! Agent command formatting and ready-banner parsing.
//!
//! How the agent binary is invoked differs per host OS and between a host
//! install and a container. Everything here is a pure string transform so
//! the clients never need to know which transport they ride on.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::connection::OsFamily;

/// Matches the version banner printed by `agent version`
/// (`Agent 7.52.0 - Commit: 1a2b3c4 - ...`) and the header of `agent status`
/// (`Agent (v7.52.0)`).
pub static VERSION_BANNER_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Safety: this is a compile-time constant pattern, cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"(?m)^Agent \(?v?(\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?)\b")
        .expect("valid regex")
});

const LINUX_AGENT_BIN: &str = "datadog-agent";
const MACOS_AGENT_BIN: &str = "/opt/datadog-agent/bin/agent/agent";
const WINDOWS_AGENT_BIN: &str = r#"& "$env:ProgramFiles\Datadog\Datadog Agent\bin\agent.exe""#;
const CONTAINER_AGENT_BIN: &str = "agent";

/// Where an agent binary lives relative to the command transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentTarget {
    /// Installed on the host the transport connects to.
    Host(OsFamily),
    /// Running inside a container on a docker host (always Linux).
    Container(String),
}

/// Build the shell command that runs the agent with `args` on `target`.
#[must_use]
pub fn agent_command(target: &AgentTarget, args: &[&str]) -> String {
    let shell = match target {
        AgentTarget::Host(os) => *os,
        AgentTarget::Container(_) => OsFamily::Linux,
    };
    let prefix = match target {
        AgentTarget::Host(OsFamily::Linux) => format!("sudo {LINUX_AGENT_BIN}"),
        AgentTarget::Host(OsFamily::MacOs) => format!("sudo {MACOS_AGENT_BIN}"),
        AgentTarget::Host(OsFamily::Windows) => WINDOWS_AGENT_BIN.to_string(),
        AgentTarget::Container(name) => {
            format!("docker exec {} {CONTAINER_AGENT_BIN}", quote_arg(name, OsFamily::Linux))
        }
    };
    join_command(&prefix, args, shell)
}

/// Build `docker exec <container> <command>` for an arbitrary command.
#[must_use]
pub fn container_exec_command(container: &str, command: &str) -> String {
    format!("docker exec {} {command}", quote_arg(container, OsFamily::Linux))
}

/// Extract the version string from an `agent version` or `agent status` payload.
#[must_use]
pub fn parse_version_banner(output: &str) -> Option<&str> {
    VERSION_BANNER_RE
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn join_command(prefix: &str, args: &[&str], shell: OsFamily) -> String {
    let mut cmd = prefix.to_string();
    for arg in args {
        cmd.push(' ');
        cmd.push_str(&quote_arg(arg, shell));
    }
    cmd
}

/// Single-quote `arg` when it contains characters a shell would split on.
///
/// `shell` picks the escape for embedded quotes: PowerShell on Windows
/// doubles them (`''`), POSIX shells close and reopen the quote (`'\''`).
pub(crate) fn quote_arg(arg: &str, shell: OsFamily) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,%+".contains(c));
    if plain {
        return arg.to_string();
    }
    let escaped = match shell {
        OsFamily::Windows => arg.replace('\'', "''"),
        OsFamily::Linux | OsFamily::MacOs => arg.replace('\'', "'\\''"),
    };
    format!("'{escaped}'")
}
