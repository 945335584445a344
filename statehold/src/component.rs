use std::{sync::Arc, time::Duration};

use statehold_core::{EntityId, EntityState, UnixTimestamp, codec};

use crate::{
    PersistError, TypedStateCache, actor::ActorDirectory, runtime::RuntimeHandle,
    state::StateRef, store::DocumentStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Inactive,
    Active,
    Deactivated,
}

/// The state of type `T` owned by one entity.
///
/// A component belongs to exactly one actor and is driven from that actor's
/// execution context. While it is [`Phase::Active`] its state is indexed by
/// the typed cache, which flushes it when dirty.
pub struct StateComponent<T, S, D, R> {
    id: EntityId,
    cache: Arc<TypedStateCache<T, S, D, R>>,
    state: Option<StateRef<T>>,
    phase: Phase,
    loaded_at: Option<UnixTimestamp>,
}

impl<T, S, D, R> std::fmt::Debug for StateComponent<T, S, D, R>
where
    T: EntityState,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateComponent")
            .field("collection", &T::collection())
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

impl<T, S, D, R> StateComponent<T, S, D, R>
where
    T: EntityState,
    S: DocumentStore,
    D: ActorDirectory,
    R: RuntimeHandle,
{
    pub fn new(id: EntityId, cache: Arc<TypedStateCache<T, S, D, R>>) -> Self {
        StateComponent {
            id,
            cache,
            state: None,
            phase: Phase::Inactive,
            loaded_at: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    pub fn loaded_at(&self) -> Option<UnixTimestamp> {
        self.loaded_at
    }

    /// The loaded state, if any
    pub fn state(&self) -> Option<&StateRef<T>> {
        self.state.as_ref()
    }

    pub fn read<F, O>(&self, f: F) -> Result<O, PersistError>
    where
        F: FnOnce(&T) -> O,
    {
        Ok(self.loaded()?.read(f))
    }

    /// Mutate the state, marking it dirty. Only call this from the entity's
    /// own execution context.
    pub fn modify<F, O>(&self, f: F) -> Result<O, PersistError>
    where
        F: FnOnce(&mut T) -> O,
    {
        Ok(self.loaded()?.modify(f))
    }

    fn loaded(&self) -> Result<&StateRef<T>, PersistError> {
        self.state.as_ref().ok_or(PersistError::NotLoaded(self.id))
    }

    /// Load the state and start tracking it. Does nothing if already active.
    #[tracing::instrument(skip(self), fields(collection = T::collection(), id = %self.id))]
    pub async fn activate(&mut self) -> Result<(), PersistError> {
        if self.phase == Phase::Active {
            return Ok(());
        }
        let loaded = self.cache.load(self.id).await?;
        let state = StateRef::new(loaded);
        self.cache.insert(state.clone());
        self.state = Some(state);
        self.loaded_at = Some(UnixTimestamp::now());
        self.phase = Phase::Active;
        tracing::debug!("activated");
        Ok(())
    }

    /// Reload unless the state was loaded within the configured cold window.
    ///
    /// Returns whether the store was read.
    pub async fn reload_throttled(&mut self) -> Result<bool, PersistError> {
        let cold_window = self.cache.config().cold_window;
        self.reload_throttled_within(cold_window).await
    }

    /// Reload unless the state was loaded within `cold_window`.
    ///
    /// Meant for readers outside the entity's owning shard, which can live
    /// with staleness; it neither needs nor touches the entity's execution
    /// context, the cache or the phase.
    #[tracing::instrument(skip(self), fields(collection = T::collection(), id = %self.id))]
    pub async fn reload_throttled_within(
        &mut self,
        cold_window: Duration,
    ) -> Result<bool, PersistError> {
        if let Some(loaded_at) = self.loaded_at
            && UnixTimestamp::now().since(loaded_at) <= cold_window
        {
            tracing::trace!("loaded within the cold window, not reloading");
            return Ok(false);
        }
        self.reload().await?;
        Ok(true)
    }

    /// Reload from the store unconditionally and make sure the state is
    /// tracked.
    #[tracing::instrument(skip(self), fields(collection = T::collection(), id = %self.id))]
    pub async fn read_fresh(&mut self) -> Result<(), PersistError> {
        self.reload().await?;
        if let Some(state) = &self.state
            && !self.cache.indexes(state)
        {
            self.cache.insert(state.clone());
        }
        self.phase = Phase::Active;
        Ok(())
    }

    async fn reload(&mut self) -> Result<(), PersistError> {
        let loaded = self.cache.load(self.id).await?;
        match &self.state {
            Some(state) => state.with_tracked(|tracked| {
                if tracked.is_dirty() {
                    tracing::warn!("reload discards unsaved changes");
                }
                tracked.reload_from(loaded);
            }),
            None => self.state = Some(StateRef::new(loaded)),
        }
        self.loaded_at = Some(UnixTimestamp::now());
        Ok(())
    }

    /// Save the state right away instead of waiting for the next drain.
    ///
    /// The dirty flag is cleared unless the state changed while saving.
    #[tracing::instrument(skip(self), fields(collection = T::collection(), id = %self.id))]
    pub async fn write_now(&self) -> Result<(), PersistError> {
        let state = self.loaded()?;
        let (document, version) = state.with_tracked(|tracked| {
            codec::encode_document(self.id, tracked.get()).map(|doc| (doc, tracked.version()))
        })?;
        self.cache
            .store()
            .save(T::collection(), self.id, document)
            .await?;
        state.with_tracked(|tracked| tracked.clear_dirty_at(version));
        Ok(())
    }

    /// Stop tracking the state.
    ///
    /// There is no final save: callers check [`Self::is_safe_to_reclaim`]
    /// first, and anything written before that point has been captured by a
    /// drain.
    #[tracing::instrument(skip(self), fields(collection = T::collection(), id = %self.id))]
    pub fn deactivate(&mut self) {
        if self.phase != Phase::Active {
            return;
        }
        if let Some(state) = &self.state {
            if state.is_dirty() {
                tracing::warn!("deactivated with unsaved changes");
            }
            self.cache.remove(state);
        }
        self.phase = Phase::Deactivated;
        tracing::debug!("deactivated");
    }

    /// Whether the entity can be reclaimed without losing a write
    pub fn is_safe_to_reclaim(&self) -> bool {
        self.state.as_ref().is_none_or(|state| !state.is_dirty())
    }
}
