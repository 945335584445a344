use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use futures::{FutureExt, future::BoxFuture};

use crate::{DrainReport, PersistError, ShutdownSummary, TickSummary};

pub type DrainFuture = BoxFuture<'static, Result<DrainReport, PersistError>>;

/// One type's drain routine, identified by the `Arc` it is registered as.
pub type DrainHook = Arc<dyn Fn() -> DrainFuture + Send + Sync>;

/// Wrap an async closure as a [`DrainHook`]
pub fn drain_hook<F, Fut>(f: F) -> DrainHook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<DrainReport, PersistError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

#[derive(Default)]
struct Hooks {
    shutdown: Vec<DrainHook>,
    timer: Vec<DrainHook>,
}

/// The orchestrator every entity-state type registers its drains with.
///
/// On shutdown all types are drained at once; on each tick they are drained
/// one after another until the process stops accepting work.
pub struct StateStore {
    hooks: Mutex<Hooks>,
    accepting: Arc<AtomicBool>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hooks = self.hooks.lock().unwrap();
        f.debug_struct("StateStore")
            .field("shutdown_hooks", &hooks.shutdown.len())
            .field("timer_hooks", &hooks.timer.len())
            .field("accepting", &self.is_accepting_work())
            .finish()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::with_accepting_flag(Arc::new(AtomicBool::new(true)))
    }

    /// Use an existing process-wide "still accepting work" flag
    pub fn with_accepting_flag(accepting: Arc<AtomicBool>) -> Self {
        StateStore {
            hooks: Mutex::new(Hooks::default()),
            accepting,
        }
    }

    pub fn is_accepting_work(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub fn stop_accepting_work(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    /// Register a type's drain pair. A timer hook that is already registered
    /// is not added again.
    pub fn register(&self, shutdown: DrainHook, timer: DrainHook) {
        let mut hooks = self.hooks.lock().unwrap();
        hooks.shutdown.push(shutdown);
        if hooks.timer.iter().any(|existing| Arc::ptr_eq(existing, &timer)) {
            tracing::trace!("timer hook already registered");
        } else {
            hooks.timer.push(timer);
        }
    }

    pub fn shutdown_hook_count(&self) -> usize {
        self.hooks.lock().unwrap().shutdown.len()
    }

    pub fn timer_hook_count(&self) -> usize {
        self.hooks.lock().unwrap().timer.len()
    }

    /// Run every shutdown hook concurrently and wait for all of them.
    ///
    /// A hook that fails is logged and counted; it never stops the others.
    #[tracing::instrument(skip(self))]
    pub async fn drain_on_shutdown(&self) -> ShutdownSummary {
        let hooks = self.hooks.lock().unwrap().shutdown.clone();
        tracing::debug!(types = hooks.len(), "draining all state for shutdown");
        let results = futures::future::join_all(hooks.iter().map(|hook| hook())).await;

        let mut summary = ShutdownSummary::default();
        for result in results {
            match result {
                Ok(report) => summary.reports.push(report),
                Err(err) => {
                    tracing::error!(%err, "state drain failed during shutdown");
                    summary.failed_types += 1;
                }
            }
        }
        summary
    }

    /// Run every timer hook in registration order.
    ///
    /// The accepting flag is checked before each hook; once it is false no
    /// further hooks start. A hook returning an error ends the tick, leaving
    /// the remaining types for the next one.
    #[tracing::instrument(skip(self))]
    pub async fn drain_on_tick(&self) -> TickSummary {
        let hooks = self.hooks.lock().unwrap().timer.clone();
        let mut summary = TickSummary::default();
        for (index, hook) in hooks.iter().enumerate() {
            if !self.is_accepting_work() {
                tracing::debug!(
                    remaining = hooks.len() - index,
                    "no longer accepting work, ending tick early"
                );
                summary.interrupted = true;
                break;
            }
            match hook().await {
                Ok(report) => summary.reports.push(report),
                Err(err) => {
                    tracing::warn!(
                        %err,
                        remaining = hooks.len() - index - 1,
                        "state drain failed, deferring the rest of this tick"
                    );
                    summary.error = Some(err);
                    break;
                }
            }
        }
        summary
    }
}
