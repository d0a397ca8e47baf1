//! Cache of named stacks keyed by `(environment, name)`.
//!
//! The map itself sits behind a short-lived `RwLock` that is only held for
//! lookup/insert/remove. Each entry carries its own async mutex, held across
//! the long-running engine calls, so callers of one key are serialized while
//! callers of different keys never wait on each other.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{EngineStack, ProgressReporter, ProvisioningEngine};
use crate::domain::config::StackTimeouts;
use crate::domain::stack::{self, StackConfig, StackKey, StackStage, StackState, UpResult};
use crate::domain::StackError;

struct StackEntry<S> {
    /// Engine handle; `None` until the first successful create.
    stack: tokio::sync::Mutex<Option<S>>,
    state: Mutex<StackState>,
}

impl<S> StackEntry<S> {
    fn new() -> Self {
        Self {
            stack: tokio::sync::Mutex::new(None),
            state: Mutex::new(StackState::Absent),
        }
    }

    fn state(&self) -> StackState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: StackState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

/// Owns every stack provisioned by one test process.
///
/// Construct one per process (or per test for isolation) and call
/// [`StackManager::cleanup`] before exiting.
pub struct StackManager<E: ProvisioningEngine> {
    engine: E,
    identity: String,
    timeouts: StackTimeouts,
    reporter: Arc<dyn ProgressReporter>,
    stacks: RwLock<HashMap<StackKey, Arc<StackEntry<E::Stack>>>>,
}

impl<E: ProvisioningEngine> StackManager<E> {
    /// `identity` must already be normalised (see
    /// [`crate::domain::stack::normalize_identity`]).
    pub fn new(
        engine: E,
        identity: impl Into<String>,
        timeouts: StackTimeouts,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            engine,
            identity: identity.into(),
            timeouts,
            reporter,
            stacks: RwLock::new(HashMap::new()),
        }
    }

    /// Engine-side name of the logical stack `name`.
    #[must_use]
    pub fn stack_name(&self, name: &str) -> String {
        stack::stack_name(&self.identity, name)
    }

    /// Lifecycle state of a cached key, `None` when nothing is cached.
    #[must_use]
    pub fn state(&self, environment: &str, name: &str) -> Option<StackState> {
        self.lookup(&StackKey::new(environment, name))
            .map(|entry| entry.state())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the up-result of the stack for `(environment, name)`, creating
    /// the engine stack from `program` on first use.
    ///
    /// `config` is merged with the injected environment key and applied
    /// before every `up`. Create, configure and `up` share one deadline, which
    /// starts once this caller holds the key.
    ///
    /// # Errors
    ///
    /// Engine failures are returned as [`StackError::Engine`] with the engine
    /// error as source; they are never retried here.
    pub async fn get_stack(
        &self,
        cancel: &CancellationToken,
        environment: &str,
        name: &str,
        config: &StackConfig,
        program: &E::Program,
    ) -> Result<UpResult, StackError> {
        let key = StackKey::new(environment, name);
        let stack_name = self.stack_name(name);

        loop {
            let entry = self.entry_or_insert(&key);
            let mut slot = lock_or_cancel(&entry.stack, cancel, StackStage::Up, &stack_name).await?;
            if entry.state() == StackState::Deleted {
                // Torn down while we waited; the map already holds a fresh entry or none.
                continue;
            }
            // The budget starts once this caller owns the key.
            let deadline = Instant::now() + self.timeouts.up();
            entry.set_state(StackState::Provisioning);

            if slot.is_none() {
                tracing::info!(stack = %stack_name, key = %key, "creating stack");
                let budget = self.timeouts.up();
                let created = run_stage(
                    cancel,
                    StackStage::Create,
                    &stack_name,
                    deadline,
                    budget,
                    self.engine.create_or_select(&stack_name, program),
                )
                .await;
                match created {
                    Ok(s) => *slot = Some(s),
                    Err(e) => {
                        entry.set_state(StackState::Deleted);
                        self.remove_entry(&key, &entry);
                        return Err(e);
                    }
                }
            }
            let Some(stack) = slot.as_ref() else {
                continue;
            };

            let merged = stack::with_environment(config, environment);
            let applied = async {
                run_stage(
                    cancel,
                    StackStage::Configure,
                    &stack_name,
                    deadline,
                    self.timeouts.up(),
                    stack.set_all_config(&merged),
                )
                .await?;

                tracing::info!(stack = %stack_name, "running up");
                run_stage(
                    cancel,
                    StackStage::Up,
                    &stack_name,
                    deadline,
                    self.timeouts.up(),
                    stack.up(self.reporter.as_ref()),
                )
                .await
            }
            .await;

            return match applied {
                Ok(result) => {
                    entry.set_state(StackState::Up);
                    tracing::info!(stack = %stack_name, outputs = result.outputs.len(), "stack up");
                    Ok(result)
                }
                Err(e) => {
                    // The engine stack exists; keep it cached so cleanup reclaims it.
                    entry.set_state(StackState::Failed);
                    Err(e)
                }
            };
        }
    }

    /// Tear down and forget the stack for `(environment, name)`.
    ///
    /// The cache entry is removed only after refresh, destroy and remove
    /// all succeed.
    ///
    /// # Errors
    ///
    /// [`StackError::NotFound`] when nothing is cached for the key (no engine
    /// call is made); otherwise the first failing stage.
    pub async fn delete_stack(
        &self,
        cancel: &CancellationToken,
        environment: &str,
        name: &str,
    ) -> Result<(), StackError> {
        let key = StackKey::new(environment, name);
        let entry = self.lookup(&key).ok_or_else(|| StackError::NotFound {
            environment: environment.to_string(),
            name: name.to_string(),
        })?;
        self.destroy_entry(cancel, &key, &entry).await
    }

    /// Tear down every cached stack, collecting failures instead of stopping
    /// at the first one.
    pub async fn cleanup(&self, cancel: &CancellationToken) -> Vec<StackError> {
        let entries: Vec<_> = self
            .stacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, e)| (k.clone(), Arc::clone(e)))
            .collect();

        tracing::info!(stacks = entries.len(), "cleaning up stacks");
        let mut errors = Vec::new();
        for (key, entry) in entries {
            match self.destroy_entry(cancel, &key, &entry).await {
                Ok(()) => {}
                // Deleted concurrently, nothing left to reclaim.
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "stack cleanup failed");
                    errors.push(e);
                }
            }
        }
        errors
    }

    async fn destroy_entry(
        &self,
        cancel: &CancellationToken,
        key: &StackKey,
        entry: &Arc<StackEntry<E::Stack>>,
    ) -> Result<(), StackError> {
        let not_found = || StackError::NotFound {
            environment: key.environment.clone(),
            name: key.name.clone(),
        };
        let stack_name = self.stack_name(&key.name);
        let mut slot = lock_or_cancel(&entry.stack, cancel, StackStage::Destroy, &stack_name).await?;
        if entry.state() == StackState::Deleted {
            return Err(not_found());
        }
        let Some(stack) = slot.as_ref() else {
            return Err(not_found());
        };

        entry.set_state(StackState::Destroying);
        if let Err(e) = teardown(stack, &self.timeouts, cancel, self.reporter.as_ref()).await {
            entry.set_state(StackState::Failed);
            return Err(e);
        }

        *slot = None;
        entry.set_state(StackState::Deleted);
        self.remove_entry(key, entry);
        tracing::info!(stack = %stack_name, "stack deleted");
        Ok(())
    }

    fn lookup(&self, key: &StackKey) -> Option<Arc<StackEntry<E::Stack>>> {
        self.stacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn entry_or_insert(&self, key: &StackKey) -> Arc<StackEntry<E::Stack>> {
        if let Some(entry) = self.lookup(key) {
            return entry;
        }
        let mut stacks = self.stacks.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            stacks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(StackEntry::new())),
        )
    }

    fn remove_entry(&self, key: &StackKey, entry: &Arc<StackEntry<E::Stack>>) {
        let mut stacks = self.stacks.write().unwrap_or_else(PoisonError::into_inner);
        if stacks.get(key).is_some_and(|current| Arc::ptr_eq(current, entry)) {
            stacks.remove(key);
        }
    }
}

/// Refresh, destroy, then remove `stack` from its workspace.
///
/// Refresh and destroy share the destroy deadline; remove gets its own, so a
/// slow destroy never eats into the remove budget. Any failing stage aborts
/// the sequence.
///
/// # Errors
///
/// The first failing stage, as [`StackError::Engine`], [`StackError::Timeout`]
/// or [`StackError::Cancelled`].
pub async fn teardown<S: EngineStack>(
    stack: &S,
    timeouts: &StackTimeouts,
    cancel: &CancellationToken,
    progress: &dyn ProgressReporter,
) -> Result<(), StackError> {
    let name = stack.name().to_string();

    let destroy_deadline = Instant::now() + timeouts.destroy();
    tracing::info!(stack = %name, "refreshing stack");
    run_stage(
        cancel,
        StackStage::Refresh,
        &name,
        destroy_deadline,
        timeouts.destroy(),
        stack.refresh(),
    )
    .await?;

    tracing::info!(stack = %name, "destroying stack");
    run_stage(
        cancel,
        StackStage::Destroy,
        &name,
        destroy_deadline,
        timeouts.destroy(),
        stack.destroy(progress),
    )
    .await?;

    let remove_deadline = Instant::now() + timeouts.remove();
    run_stage(
        cancel,
        StackStage::Remove,
        &name,
        remove_deadline,
        timeouts.remove(),
        stack.remove(),
    )
    .await
}

async fn run_stage<T>(
    cancel: &CancellationToken,
    stage: StackStage,
    stack: &str,
    deadline: Instant,
    budget: Duration,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, StackError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(StackError::Cancelled {
            stage,
            stack: stack.to_string(),
        }),
        res = tokio::time::timeout_at(deadline, fut) => match res {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(StackError::Engine {
                stage,
                stack: stack.to_string(),
                source,
            }),
            Err(_) => Err(StackError::Timeout {
                stage,
                stack: stack.to_string(),
                after: budget,
            }),
        },
    }
}

async fn lock_or_cancel<'a, T>(
    mutex: &'a tokio::sync::Mutex<T>,
    cancel: &CancellationToken,
    stage: StackStage,
    stack: &str,
) -> Result<tokio::sync::MutexGuard<'a, T>, StackError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(StackError::Cancelled {
            stage,
            stack: stack.to_string(),
        }),
        guard = mutex.lock() => Ok(guard),
    }
}
