//! Concurrency and lifecycle behaviour of `StackManager` against a fake engine.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use e2e_env::application::services::StackManager;
use e2e_env::domain::config::StackTimeouts;
use e2e_env::domain::stack::ENVIRONMENT_CONFIG_KEY;
use e2e_env::domain::{ConfigValue, StackConfig, StackError, StackStage, StackState};

use crate::mocks::{FakeEngine, NullReporter, outputs_for};

fn manager(engine: FakeEngine, identity: &str) -> StackManager<FakeEngine> {
    StackManager::new(engine, identity, StackTimeouts::default(), Arc::new(NullReporter))
}

fn config() -> StackConfig {
    let mut config = StackConfig::new();
    config.insert("ddagent:apiKey".into(), ConfigValue::secret("abc123"));
    config
}

#[tokio::test]
async fn get_stack_creates_once_and_reruns_up() {
    let engine = FakeEngine::new();
    let log = Arc::clone(&engine.log);
    let mgr = manager(engine, "alice");
    let cancel = CancellationToken::new();

    let first = mgr
        .get_stack(&cancel, "aws/sandbox", "smoke", &config(), &())
        .await
        .expect("first get");
    let second = mgr
        .get_stack(&cancel, "aws/sandbox", "smoke", &config(), &())
        .await
        .expect("second get");

    assert_eq!(first, second);
    assert_eq!(first, outputs_for("ddagent-e2e-alice-smoke"));
    assert_eq!(log.creates(), 1);
    assert_eq!(log.ups(), 2);
    assert_eq!(mgr.len(), 1);
    assert_eq!(mgr.state("aws/sandbox", "smoke"), Some(StackState::Up));
}

#[tokio::test]
async fn environment_key_is_injected_into_config() {
    let engine = FakeEngine::new();
    let log = Arc::clone(&engine.log);
    let mgr = manager(engine, "alice");
    let cancel = CancellationToken::new();

    let mut caller = config();
    caller.insert(ENVIRONMENT_CONFIG_KEY.into(), ConfigValue::plain("bogus"));
    mgr.get_stack(&cancel, "az/sandbox", "smoke", &caller, &())
        .await
        .expect("get");

    let configs = log.configs.lock().unwrap();
    let (name, applied) = &configs[0];
    assert_eq!(name, "ddagent-e2e-alice-smoke");
    assert_eq!(applied[ENVIRONMENT_CONFIG_KEY], ConfigValue::plain("az/sandbox"));
    assert!(applied["ddagent:apiKey"].secret);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_of_one_key_share_a_single_create() {
    let engine = FakeEngine::new().with_up_delay(Duration::from_millis(50));
    let log = Arc::clone(&engine.log);
    let mgr = Arc::new(manager(engine, "alice"));
    let cancel = CancellationToken::new();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let mgr = Arc::clone(&mgr);
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            mgr.get_stack(&cancel, "aws/sandbox", "shared", &StackConfig::new(), &())
                .await
        }));
    }

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap().expect("get_stack"));
    }

    assert_eq!(log.creates(), 1);
    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(mgr.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_key_does_not_block_other_keys() {
    let mut engine = FakeEngine::new();
    let gate = engine.gate("ddagent-e2e-alice-slow");
    let mgr = Arc::new(manager(engine, "alice"));
    let cancel = CancellationToken::new();

    let slow = {
        let mgr = Arc::clone(&mgr);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            mgr.get_stack(&cancel, "aws/sandbox", "slow", &StackConfig::new(), &())
                .await
        })
    };
    // Let the slow caller take its entry lock and park in `up`.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mgr.state("aws/sandbox", "slow"), Some(StackState::Provisioning));

    let fast = tokio::time::timeout(
        Duration::from_secs(5),
        mgr.get_stack(&cancel, "aws/sandbox", "fast", &StackConfig::new(), &()),
    )
    .await
    .expect("fast key must not wait for the slow one")
    .expect("fast get");
    assert_eq!(fast, outputs_for("ddagent-e2e-alice-fast"));

    gate.add_permits(1);
    let slow = slow.await.unwrap().expect("slow get");
    assert_eq!(slow, outputs_for("ddagent-e2e-alice-slow"));
}

#[tokio::test]
async fn cancellation_stops_a_blocked_up() {
    let mut engine = FakeEngine::new();
    let _gate = engine.gate("ddagent-e2e-alice-stuck");
    let mgr = Arc::new(manager(engine, "alice"));
    let cancel = CancellationToken::new();

    let task = {
        let mgr = Arc::clone(&mgr);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            mgr.get_stack(&cancel, "aws/sandbox", "stuck", &StackConfig::new(), &())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let err = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("cancel is prompt")
        .unwrap()
        .expect_err("cancelled");
    assert!(matches!(err, StackError::Cancelled { stage: StackStage::Up, .. }), "{err:?}");
}

#[tokio::test]
async fn failed_create_is_not_cached() {
    let engine = FakeEngine::new().failing_create("ddagent-e2e-alice-broken");
    let log = Arc::clone(&engine.log);
    let mgr = manager(engine, "alice");
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        let err = mgr
            .get_stack(&cancel, "aws/sandbox", "broken", &StackConfig::new(), &())
            .await
            .expect_err("create fails");
        let StackError::Engine { stage, source, .. } = err else {
            panic!("expected engine error");
        };
        assert_eq!(stage, StackStage::Create);
        assert_eq!(source.to_string(), "backend unreachable");
    }
    assert_eq!(log.creates(), 2);
    assert!(mgr.is_empty());
}

#[tokio::test]
async fn delete_unknown_stack_makes_no_engine_calls() {
    let engine = FakeEngine::new();
    let log = Arc::clone(&engine.log);
    let mgr = manager(engine, "alice");

    let err = mgr
        .delete_stack(&CancellationToken::new(), "aws/sandbox", "ghost")
        .await
        .expect_err("not found");
    assert!(err.is_not_found());
    assert_eq!(log.engine_calls(), 0);
}

#[tokio::test]
async fn delete_tears_down_and_forgets() {
    let engine = FakeEngine::new();
    let log = Arc::clone(&engine.log);
    let mgr = manager(engine, "alice");
    let cancel = CancellationToken::new();

    mgr.get_stack(&cancel, "aws/sandbox", "smoke", &StackConfig::new(), &())
        .await
        .expect("get");
    mgr.delete_stack(&cancel, "aws/sandbox", "smoke")
        .await
        .expect("delete");

    assert_eq!(log.destroys(), 1);
    assert_eq!(log.removes(), 1);
    assert!(mgr.is_empty());
    assert_eq!(mgr.state("aws/sandbox", "smoke"), None);

    // Same key again creates a fresh stack.
    mgr.get_stack(&cancel, "aws/sandbox", "smoke", &StackConfig::new(), &())
        .await
        .expect("recreate");
    assert_eq!(log.creates(), 2);
}

#[tokio::test]
async fn failed_destroy_keeps_entry() {
    let engine = FakeEngine::new().failing_destroy("ddagent-e2e-alice-sticky");
    let log = Arc::clone(&engine.log);
    let mgr = manager(engine, "alice");
    let cancel = CancellationToken::new();

    mgr.get_stack(&cancel, "aws/sandbox", "sticky", &StackConfig::new(), &())
        .await
        .expect("get");
    let err = mgr
        .delete_stack(&cancel, "aws/sandbox", "sticky")
        .await
        .expect_err("destroy fails");
    assert!(matches!(err, StackError::Engine { stage: StackStage::Destroy, .. }), "{err:?}");
    assert_eq!(log.removes(), 0);
    assert_eq!(mgr.len(), 1);
    assert_eq!(mgr.state("aws/sandbox", "sticky"), Some(StackState::Failed));
}

#[tokio::test]
async fn failed_up_reports_failed_state_and_keeps_entry() {
    let engine = FakeEngine::new().failing_up("ddagent-e2e-alice-conflict");
    let log = Arc::clone(&engine.log);
    let mgr = manager(engine, "alice");
    let cancel = CancellationToken::new();

    let err = mgr
        .get_stack(&cancel, "aws/sandbox", "conflict", &StackConfig::new(), &())
        .await
        .expect_err("up fails");
    assert!(matches!(err, StackError::Engine { stage: StackStage::Up, .. }), "{err:?}");
    assert_eq!(mgr.state("aws/sandbox", "conflict"), Some(StackState::Failed));

    // The created engine stack is still owned by the cache and gets reclaimed.
    assert!(mgr.cleanup(&cancel).await.is_empty());
    assert_eq!(log.destroys(), 1);
    assert!(mgr.is_empty());
}

#[tokio::test(start_paused = true)]
async fn up_budget_starts_after_waiting_for_the_key() {
    let engine = FakeEngine::new().with_up_delay(Duration::from_secs(15 * 60));
    let log = Arc::clone(&engine.log);
    let mgr = Arc::new(manager(engine, "alice"));
    let cancel = CancellationToken::new();

    let spawn_get = |mgr: Arc<StackManager<FakeEngine>>, cancel: CancellationToken| {
        tokio::spawn(async move {
            mgr.get_stack(&cancel, "aws/sandbox", "slow", &StackConfig::new(), &())
                .await
        })
    };
    let first = spawn_get(Arc::clone(&mgr), cancel.clone());
    tokio::time::sleep(Duration::from_secs(1)).await;
    let second = spawn_get(Arc::clone(&mgr), cancel.clone());

    // The second caller waits ~15 minutes for the key, then needs 15 more:
    // past 20 minutes overall, but within its own budget.
    first.await.unwrap().expect("first get");
    second.await.unwrap().expect("second get");
    assert_eq!(log.creates(), 1);
    assert_eq!(log.ups(), 2);
}

#[tokio::test]
async fn cleanup_attempts_every_stack_and_collects_failures() {
    let engine = FakeEngine::new().failing_destroy("ddagent-e2e-alice-b");
    let log = Arc::clone(&engine.log);
    let mgr = manager(engine, "alice");
    let cancel = CancellationToken::new();

    for name in ["a", "b", "c"] {
        mgr.get_stack(&cancel, "aws/sandbox", name, &StackConfig::new(), &())
            .await
            .expect("get");
    }

    let errors = mgr.cleanup(&cancel).await;
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].to_string().contains("ddagent-e2e-alice-b"), "{}", errors[0]);
    assert_eq!(log.destroys(), 3);
    assert_eq!(log.removes(), 2);
    assert_eq!(mgr.len(), 1);
}

#[tokio::test]
async fn cleanup_of_empty_manager_is_a_no_op() {
    let engine = FakeEngine::new();
    let log = Arc::clone(&engine.log);
    let mgr = manager(engine, "alice");
    assert!(mgr.cleanup(&CancellationToken::new()).await.is_empty());
    assert_eq!(log.engine_calls(), 0);
}

#[tokio::test]
async fn identities_get_distinct_stack_names() {
    let alice = manager(FakeEngine::new(), "alice");
    let bob = manager(FakeEngine::new(), "bob");
    assert_eq!(alice.stack_name("smoke"), "ddagent-e2e-alice-smoke");
    assert_eq!(bob.stack_name("smoke"), "ddagent-e2e-bob-smoke");

    let cancel = CancellationToken::new();
    let a = alice
        .get_stack(&cancel, "aws/sandbox", "smoke", &StackConfig::new(), &())
        .await
        .expect("alice");
    let b = bob
        .get_stack(&cancel, "aws/sandbox", "smoke", &StackConfig::new(), &())
        .await
        .expect("bob");
    assert_ne!(a, b);
}

#[tokio::test]
async fn environments_are_separate_cache_keys() {
    let engine = FakeEngine::new();
    let log = Arc::clone(&engine.log);
    let mgr = manager(engine, "alice");
    let cancel = CancellationToken::new();

    for env in ["aws/sandbox", "az/sandbox"] {
        mgr.get_stack(&cancel, env, "smoke", &StackConfig::new(), &())
            .await
            .expect("get");
    }
    assert_eq!(mgr.len(), 2);
    assert_eq!(log.creates(), 2);
}
