//! Persistence of long-lived actor entity state.
//!
//! Each entity owns its state through a [`StateComponent`] and mutates it only
//! on its own execution context. A [`TypedStateCache`] per state type indexes
//! the live states and commits the dirty ones to a [`DocumentStore`] in
//! batches, driven by the [`StateStore`] orchestrator: incrementally on every
//! tick while the process runs, and all at once on shutdown.
//!
//! [`Persistence`] wires these together:
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), statehold::PersistError> {
//! use statehold::{EntityId, EntityState, Persistence};
//!
//! #[derive(Default, serde::Serialize, serde::Deserialize)]
//! struct PlayerState {
//!     gold: u64,
//! }
//!
//! impl EntityState for PlayerState {}
//!
//! let persistence = Persistence::build_tokio().build();
//! let id = EntityId::new(1);
//! let mailbox = persistence.directory().spawn(id, persistence.runtime());
//!
//! let mut player = persistence.component::<PlayerState>(id);
//! player.activate().await?;
//! let state = player.state().cloned().expect("activated");
//! mailbox.call(move || state.modify(|p| p.gold += 10)).await?;
//!
//! persistence.tick().await;
//! persistence.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

pub use statehold_core::{
    BulkWriteResult, CodecError, DocumentKey, DrainConfig, EntityId, EntityState, Tracked,
    UnixTimestamp, UpdateDescriptor, WriteOrdering, codec,
};
use tracing::Instrument;

pub mod actor;
mod builder;
pub use builder::PersistenceBuilder;
mod cache;
pub use cache::TypedStateCache;
mod component;
pub use component::{Phase, StateComponent};
mod error;
pub use error::{PersistError, Stopped, StoreError};
mod mailbox;
pub use mailbox::{Mailbox, MailboxDirectory};
mod report;
pub use report::{DrainReport, FailedPage, ShutdownSummary, TickSummary};
pub mod runtime;
mod state;
pub use state::StateRef;
mod state_store;
pub use state_store::{DrainFuture, DrainHook, StateStore, drain_hook};
pub mod store;
mod unbounded;

use crate::{
    actor::ActorDirectory,
    runtime::RuntimeHandle,
    store::{DocumentStore, InMemoryStore},
};

/// The persistence subsystem of one process: the store, the actor directory,
/// the orchestrator and one typed cache per entity-state type.
pub struct Persistence<S, D, R> {
    inner: Arc<Inner<S, D, R>>,
}

impl<S, D, R> Clone for Persistence<S, D, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<S, D, R> {
    store: S,
    directory: D,
    runtime: R,
    config: DrainConfig,
    state_store: Arc<StateStore>,
    caches: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Persistence<InMemoryStore, MailboxDirectory, ()> {
    // Start building a [`Persistence`] which runs its mailboxes and ticker on the provided runtime
    pub fn builder<R: RuntimeHandle>(
        runtime: R,
    ) -> PersistenceBuilder<InMemoryStore, MailboxDirectory, R> {
        PersistenceBuilder::new(runtime)
    }

    // Start building a [`Persistence`] on the current tokio runtime
    //
    // # Panics
    //
    // If called outside of a tokio runtime
    #[cfg(feature = "tokio")]
    pub fn build_tokio()
    -> PersistenceBuilder<InMemoryStore, MailboxDirectory, ::tokio::runtime::Handle> {
        PersistenceBuilder::new(::tokio::runtime::Handle::current())
    }
}

impl<S: DocumentStore, D: ActorDirectory, R: RuntimeHandle> Persistence<S, D, R> {
    fn from_builder(builder: PersistenceBuilder<S, D, R>) -> Self {
        let PersistenceBuilder {
            store,
            directory,
            runtime,
            config,
            accepting,
        } = builder;
        let state_store = match accepting {
            Some(flag) => StateStore::with_accepting_flag(flag),
            None => StateStore::new(),
        };
        Persistence {
            inner: Arc::new(Inner {
                store,
                directory,
                runtime,
                config,
                state_store: Arc::new(state_store),
                caches: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn directory(&self) -> &D {
        &self.inner.directory
    }

    pub fn runtime(&self) -> &R {
        &self.inner.runtime
    }

    pub fn config(&self) -> &DrainConfig {
        &self.inner.config
    }

    pub fn state_store(&self) -> &Arc<StateStore> {
        &self.inner.state_store
    }

    /// The cache for state type `T`, created and registered with the
    /// orchestrator the first time it is asked for
    pub fn cache<T: EntityState>(&self) -> Arc<TypedStateCache<T, S, D, R>> {
        let mut caches = self.inner.caches.lock().unwrap();
        if let Some(existing) = caches.get(&TypeId::of::<T>())
            && let Ok(cache) = existing.clone().downcast::<TypedStateCache<T, S, D, R>>()
        {
            return cache;
        }
        let cache = Arc::new(TypedStateCache::new(
            self.inner.store.clone(),
            self.inner.directory.clone(),
            self.inner.runtime.clone(),
            self.inner.config.clone(),
        ));
        cache.register(&self.inner.state_store);
        tracing::debug!(collection = T::collection(), "registered state type");
        caches.insert(TypeId::of::<T>(), cache.clone());
        cache
    }

    /// A fresh, inactive component for entity `id`'s state of type `T`
    pub fn component<T: EntityState>(&self, id: EntityId) -> StateComponent<T, S, D, R> {
        StateComponent::new(id, self.cache::<T>())
    }

    /// Flush dirty state of every type through the entities' mailboxes
    pub async fn tick(&self) -> TickSummary {
        self.inner.state_store.drain_on_tick().await
    }

    /// Stop accepting work, then write out every type's dirty state.
    ///
    /// Call this once the entities' actors have stopped.
    pub async fn shutdown(&self) -> ShutdownSummary {
        self.inner.state_store.stop_accepting_work();
        self.inner.state_store.drain_on_shutdown().await
    }

    /// Tick every `period` on the runtime until work stops being accepted
    pub fn spawn_ticker(&self, period: Duration) {
        let state_store = self.inner.state_store.clone();
        let runtime = self.inner.runtime.clone();
        self.inner.runtime.spawn(Box::pin(
            async move {
                loop {
                    runtime.sleep(period).await;
                    if !state_store.is_accepting_work() {
                        tracing::debug!("no longer accepting work, stopping ticker");
                        break;
                    }
                    let summary = state_store.drain_on_tick().await;
                    tracing::trace!(types = summary.reports.len(), "tick finished");
                }
            }
            .instrument(tracing::info_span!("state_ticker")),
        ));
    }
}
