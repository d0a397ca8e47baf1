//! Up-result → typed connection → client, end to end against fakes.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use e2e_env::application::services::clients::{AgentClient, DockerAgentClient, HostAgentExecutor, VmClient};
use e2e_env::application::services::{ClientContext, ConnectionDeserializer, StackManager};
use e2e_env::domain::config::{ReadinessPolicy, StackTimeouts};
use e2e_env::domain::{
    AgentConnection, ClientInitError, DeserializeError, DockerConnection, HostConnection, OutputValue, StackConfig,
    UpResult,
};

use crate::mocks::{CannedTransport, FakeConnector, FakeEngine, NullReporter};

const STATUS: &str = "==============\nAgent (v7.52.0)\n==============\n";

fn context(connector: FakeConnector) -> ClientContext<FakeConnector> {
    ClientContext::new(
        connector,
        ReadinessPolicy {
            ready_timeout_secs: 5,
            poll_interval_ms: 10,
        },
    )
}

fn up_with(name: &str, value: serde_json::Value) -> UpResult {
    let mut outputs = HashMap::new();
    outputs.insert(name.to_string(), OutputValue::from(value));
    UpResult::new(outputs)
}

type VmDeserializer =
    ConnectionDeserializer<ClientContext<FakeConnector>, HostConnection, VmClient<CannedTransport>>;

type AgentDeserializer = ConnectionDeserializer<
    ClientContext<FakeConnector>,
    AgentConnection,
    AgentClient<HostAgentExecutor<CannedTransport>>,
>;

type DockerAgentDeserializer = ConnectionDeserializer<
    ClientContext<FakeConnector>,
    DockerConnection,
    DockerAgentClient<CannedTransport>,
>;

#[tokio::test]
async fn vm_client_from_managed_stack() {
    let mgr = StackManager::new(
        FakeEngine::new(),
        "alice",
        StackTimeouts::default(),
        Arc::new(NullReporter),
    );
    let up = mgr
        .get_stack(&CancellationToken::new(), "aws/sandbox", "vm", &StackConfig::new(), &())
        .await
        .expect("get_stack");

    let ctx = context(FakeConnector::new(&[("hostname", "ip-10-0-0-1\n")]));
    let vm = VmDeserializer::for_client()
        .deserialize(&ctx, &up)
        .expect("vm client");

    assert_eq!(vm.connection().address, "ddagent-e2e-alice-vm.internal");
    assert_eq!(vm.hostname().await, "ip-10-0-0-1");
    assert_eq!(
        *ctx.connector.dialled.lock().unwrap(),
        vec!["ubuntu@ddagent-e2e-alice-vm.internal:22".to_string()]
    );
}

#[tokio::test]
async fn agent_client_waits_for_readiness_then_runs() {
    let up = up_with(
        "agent",
        serde_json::json!({ "host": { "address": "10.0.0.7", "username": "ec2-user" } }),
    );
    let ctx = context(FakeConnector::new(&[
        ("datadog-agent status", STATUS),
        ("datadog-agent version", "Agent 7.52.0 - Commit: 1a2b3c - Serialization version: 5.0\n"),
    ]));
    let agent = AgentDeserializer::for_client()
        .deserialize(&ctx, &up)
        .expect("agent client");

    assert!(!agent.is_ready());
    assert_eq!(agent.parsed_version().await, Some(semver::Version::new(7, 52, 0)));
    assert!(agent.is_ready());
    assert_eq!(agent.readiness().unwrap().version, "7.52.0");

    let commands = ctx.connector.commands.lock().unwrap().clone();
    assert_eq!(commands.first().map(String::as_str), Some("sudo datadog-agent status"));
    assert_eq!(commands.last().map(String::as_str), Some("sudo datadog-agent version"));
}

#[test]
fn missing_output_skips_init() {
    let ctx = context(FakeConnector::new(&[]));
    let err = VmDeserializer::for_client()
        .deserialize(&ctx, &UpResult::default())
        .err()
        .expect("missing output");
    assert!(
        matches!(err, ClientInitError::Deserialize(DeserializeError::MissingOutput { ref name }) if name == "host"),
        "{err:?}"
    );
    assert!(ctx.connector.dialled.lock().unwrap().is_empty());
}

#[test]
fn connector_failure_surfaces_as_init_error() {
    let ctx = context(FakeConnector::refusing());
    let up = up_with("host", serde_json::json!({ "address": "h", "username": "u" }));
    let err = VmDeserializer::for_client()
        .deserialize(&ctx, &up)
        .err()
        .expect("init fails");
    assert!(matches!(err, ClientInitError::Init(_)), "{err:?}");
    let chain = format!("{:#}", anyhow::Error::from(err));
    assert_eq!(chain, "client initialisation failed: no private key configured");
}

#[test]
fn docker_agent_requires_agent_container() {
    let ctx = context(FakeConnector::new(&[]));
    let up = up_with(
        "docker",
        serde_json::json!({ "host": { "address": "h", "username": "u" } }),
    );
    let result = DockerAgentDeserializer::for_client()
        .deserialize(&ctx, &up);
    assert!(matches!(result, Err(ClientInitError::Init(_))));
}

#[tokio::test]
async fn docker_agent_runs_inside_its_container() {
    let ctx = context(FakeConnector::new(&[
        ("agent status", STATUS),
        ("agent hostname", "docker-host\n"),
    ]));
    let up = up_with(
        "docker",
        serde_json::json!({
            "host": { "address": "h", "username": "u" },
            "agentContainer": "datadog-agent"
        }),
    );
    let client = DockerAgentDeserializer::for_client()
        .deserialize(&ctx, &up)
        .expect("docker agent client");

    assert_eq!(client.agent().hostname().await, "docker-host");
    let commands = ctx.connector.commands.lock().unwrap().clone();
    assert!(
        commands.iter().all(|c| c.starts_with("docker exec datadog-agent agent ")),
        "{commands:?}"
    );
}
