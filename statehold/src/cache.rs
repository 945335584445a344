use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, OnceLock},
};

use futures::channel::oneshot;
use statehold_core::{
    DrainConfig, EntityId, EntityState, Tracked, UpdateDescriptor, WriteOrdering, codec,
};

use crate::{
    DrainReport, FailedPage, PersistError,
    actor::{ActorDirectory, ActorHandle},
    runtime::RuntimeHandle,
    state::{PendingWrite, StateCommand, StateRef},
    state_store::{DrainHook, StateStore, drain_hook},
    store::DocumentStore,
};

/// The live states of every active entity of type `T`, and the two
/// algorithms that commit them to the store in batches.
///
/// An entry exists exactly while the entity's
/// [`StateComponent`](crate::StateComponent) is active.
pub struct TypedStateCache<T, S, D, R> {
    entries: Mutex<BTreeMap<EntityId, StateRef<T>>>,
    store: S,
    directory: D,
    runtime: R,
    config: DrainConfig,
    hooks: OnceLock<(DrainHook, DrainHook)>,
}

enum PageOutcome {
    Written,
    Failed { attempts: u32 },
}

impl<T, S, D, R> TypedStateCache<T, S, D, R>
where
    T: EntityState,
    S: DocumentStore,
    D: ActorDirectory,
    R: RuntimeHandle,
{
    pub fn new(store: S, directory: D, runtime: R, config: DrainConfig) -> Self {
        TypedStateCache {
            entries: Mutex::new(BTreeMap::new()),
            store,
            directory,
            runtime,
            config,
            hooks: OnceLock::new(),
        }
    }

    pub fn collection(&self) -> &'static str {
        T::collection()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &DrainConfig {
        &self.config
    }

    /// Register this type's drains with `state_store`.
    ///
    /// A cache registers at most once; later calls return `false` and leave
    /// the orchestrator untouched, so no drain runs twice.
    pub fn register(self: &Arc<Self>, state_store: &StateStore) -> bool {
        let mut created = false;
        let (shutdown, timer) = self.hooks.get_or_init(|| {
            created = true;
            // Weak so the hooks, which this cache owns, do not keep it alive
            let on_shutdown = Arc::downgrade(self);
            let on_tick = Arc::downgrade(self);
            (
                drain_hook(move || {
                    let cache = on_shutdown.upgrade();
                    async move {
                        match cache {
                            Some(cache) => cache.flush_all().await,
                            None => Ok(DrainReport::new(T::collection())),
                        }
                    }
                }),
                drain_hook(move || {
                    let cache = on_tick.upgrade();
                    async move {
                        match cache {
                            Some(cache) => cache.flush_dirty().await,
                            None => Ok(DrainReport::new(T::collection())),
                        }
                    }
                }),
            )
        });
        if !created {
            tracing::trace!(collection = T::collection(), "drains already registered");
            return false;
        }
        state_store.register(shutdown.clone(), timer.clone());
        true
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.lock().unwrap().contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<StateRef<T>> {
        self.entries.lock().unwrap().get(&id).cloned()
    }

    /// Load `id` from the store, starting from the default state if it has
    /// never been saved
    pub(crate) async fn load(&self, id: EntityId) -> Result<Tracked<T>, PersistError> {
        let payload = match self.store.load(T::collection(), id).await? {
            Some(bytes) => codec::decode_document(id, &bytes)?,
            None => {
                tracing::trace!(%id, "no stored document, starting from default");
                T::default()
            }
        };
        Ok(Tracked::clean(id, payload))
    }

    /// Index `state`, dropping any stale entry left for the same id
    pub(crate) fn insert(&self, state: StateRef<T>) {
        let id = state.id();
        let mut entries = self.entries.lock().unwrap();
        if entries.remove(&id).is_some() {
            tracing::debug!(%id, collection = T::collection(), "replaced stale cache entry");
        }
        entries.insert(id, state);
    }

    /// Remove the entry for `state`'s id if it still points at `state`
    pub(crate) fn remove(&self, state: &StateRef<T>) -> bool {
        let id = state.id();
        let mut entries = self.entries.lock().unwrap();
        match entries.get(&id) {
            Some(existing) if existing.same_state(state) => {
                entries.remove(&id);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn indexes(&self, state: &StateRef<T>) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(&state.id())
            .is_some_and(|existing| existing.same_state(state))
    }

    fn entries(&self) -> Vec<(EntityId, StateRef<T>)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(id, state)| (*id, state.clone()))
            .collect()
    }

    fn writable_actor(&self, id: EntityId) -> Option<D::Handle> {
        match self.directory.lookup(id) {
            Some(handle) if !handle.is_read_only() => Some(handle),
            Some(_) => {
                tracing::trace!(%id, "actor is read-only, skipping");
                None
            }
            None => {
                tracing::trace!(%id, "no live actor, skipping");
                None
            }
        }
    }

    /// Write every dirty entry, for use once actors have stopped.
    ///
    /// States are read here directly instead of through their mailboxes:
    /// with no actor left running there is no writer to race. Pages the
    /// store does not acknowledge are retried, and abandoned with an error
    /// once the retries run out. Entries that fail to encode are left dirty
    /// and listed in the report; the rest of the type is still written.
    #[tracing::instrument(skip(self), fields(collection = T::collection()))]
    pub async fn flush_all(&self) -> Result<DrainReport, PersistError> {
        let mut report = DrainReport::new(T::collection());
        let mut pending = Vec::new();
        for (id, state) in self.entries() {
            report.considered += 1;
            if self.writable_actor(id).is_none() {
                report.skipped += 1;
                continue;
            }
            let snapshot = state.with_tracked(|tracked| {
                if !tracked.is_dirty() {
                    return Ok(None);
                }
                self.store
                    .update_descriptor(T::collection(), id, tracked.get())
                    .map(|descriptor| Some((descriptor, tracked.version())))
            });
            match snapshot {
                Ok(Some((descriptor, version))) => pending.push((descriptor, state, version)),
                Ok(None) => report.clean += 1,
                Err(err) => {
                    tracing::error!(%id, %err, "state cannot be encoded, it will not be written");
                    report.unencodable.push(id);
                }
            }
        }
        tracing::debug!(dirty = pending.len(), "flushing all dirty state");

        for (index, page) in into_pages(pending, self.config.page_size).into_iter().enumerate() {
            if index > 0 {
                self.runtime.sleep(self.config.shutdown_page_pause).await;
            }
            let (updates, written): (Vec<_>, Vec<_>) = page
                .into_iter()
                .map(|(descriptor, state, version)| (descriptor, (state, version)))
                .unzip();
            let len = updates.len();
            match self.write_with_retries(index, &updates).await {
                PageOutcome::Written => {
                    for (state, version) in written {
                        state.with_tracked(|tracked| tracked.clear_dirty_at(version));
                    }
                    report.written += len;
                }
                PageOutcome::Failed { attempts } => {
                    tracing::error!(
                        page = index,
                        len,
                        attempts,
                        "bulk write never acknowledged, this page may not be durable"
                    );
                    report.failed_pages.push(FailedPage {
                        index,
                        len,
                        attempts,
                    });
                }
            }
        }
        Ok(report)
    }

    async fn write_with_retries(&self, index: usize, updates: &[UpdateDescriptor]) -> PageOutcome {
        let max_attempts = self.config.shutdown_retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .store
                .bulk_write(T::collection(), updates.to_vec(), WriteOrdering::Unordered)
                .await
            {
                Ok(result) if result.acknowledged => return PageOutcome::Written,
                Ok(_) => tracing::warn!(page = index, attempt, "bulk write not acknowledged"),
                Err(err) => tracing::warn!(page = index, attempt, %err, "bulk write failed"),
            }
            if attempt >= max_attempts {
                return PageOutcome::Failed { attempts: attempt };
            }
            self.runtime.sleep(self.config.retry_delay).await;
        }
    }

    /// Write the dirty entries of live, writable actors while they keep
    /// running.
    ///
    /// Every dirty check and snapshot runs on the entity's own mailbox, and
    /// so does every clear, which is only sent once the store has
    /// acknowledged the page. Pages are not retried: entities in a failed
    /// page stay dirty and are picked up by the next tick, as do entries that
    /// fail to encode.
    #[tracing::instrument(skip(self), fields(collection = T::collection()))]
    pub async fn flush_dirty(&self) -> Result<DrainReport, PersistError> {
        let mut report = DrainReport::new(T::collection());
        let mut submissions = Vec::new();
        for (id, state) in self.entries() {
            report.considered += 1;
            let Some(actor) = self.writable_actor(id) else {
                report.skipped += 1;
                continue;
            };
            let (tx, rx) = oneshot::channel();
            let submitted = actor.submit(state.task(StateCommand::Snapshot {
                store: self.store.clone(),
                reply: tx,
            }));
            submissions.push(async move {
                let snapshot = match submitted.await {
                    Ok(()) => rx.await.ok(),
                    Err(_stopped) => None,
                };
                (id, actor, state, snapshot)
            });
        }

        // Each queued item carries its update together with the id, actor
        // and version it was snapshotted from
        let mut queue: Vec<(PendingWrite, D::Handle, StateRef<T>)> = Vec::new();
        for (id, actor, state, snapshot) in futures::future::join_all(submissions).await {
            match snapshot {
                Some(Ok(Some(pending))) => queue.push((pending, actor, state)),
                Some(Ok(None)) => report.clean += 1,
                Some(Err(err)) => {
                    tracing::warn!(%id, %err, "state cannot be encoded, leaving it dirty");
                    report.unencodable.push(id);
                }
                None => {
                    tracing::trace!(%id, "mailbox stopped before snapshot, skipping");
                    report.skipped += 1;
                }
            }
        }
        tracing::debug!(dirty = queue.len(), "flushing dirty state");

        for (index, page) in into_pages(queue, self.config.page_size).into_iter().enumerate() {
            if index > 0 {
                self.runtime.sleep(self.config.tick_page_pause).await;
            }
            let (updates, clears): (Vec<_>, Vec<_>) = page
                .into_iter()
                .map(|(pending, actor, state)| {
                    (pending.descriptor, (actor, state, pending.version))
                })
                .unzip();
            let len = updates.len();
            let outcome = self
                .store
                .bulk_write(T::collection(), updates, WriteOrdering::Unordered)
                .await;
            match outcome {
                Ok(result) if result.acknowledged => {
                    for (actor, state, version) in clears {
                        let clear =
                            actor.submit(state.task::<S>(StateCommand::ClearDirty { version }));
                        self.runtime.spawn(Box::pin(async move {
                            if clear.await.is_err() {
                                tracing::trace!("mailbox stopped before dirty flag was cleared");
                            }
                        }));
                    }
                    report.written += len;
                }
                Ok(_) => {
                    tracing::warn!(
                        page = index,
                        len,
                        "bulk write not acknowledged, retrying next tick"
                    );
                    report.failed_pages.push(FailedPage {
                        index,
                        len,
                        attempts: 1,
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        page = index,
                        len,
                        %err,
                        "bulk write failed, retrying next tick"
                    );
                    report.failed_pages.push(FailedPage {
                        index,
                        len,
                        attempts: 1,
                    });
                }
            }
        }
        Ok(report)
    }
}

fn into_pages<I>(items: Vec<I>, page_size: usize) -> Vec<Vec<I>> {
    let page_size = page_size.max(1);
    let mut pages = Vec::with_capacity(items.len().div_ceil(page_size));
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        pages.push(items.by_ref().take(page_size).collect());
    }
    pages
}
