use std::sync::{Arc, Mutex};

use futures::channel::oneshot;
use statehold_core::{CodecError, EntityId, EntityState, Tracked, UpdateDescriptor};

use crate::{actor::ActorTask, store::DocumentStore};

/// A shared handle onto an entity's live state.
///
/// The owning [`StateComponent`](crate::StateComponent) and the typed cache
/// both hold one. Mutation is only expected from the entity's own execution
/// context; the cache reaches the state through [`StateCommand`]s run there.
pub struct StateRef<T> {
    inner: Arc<Mutex<Tracked<T>>>,
}

impl<T> Clone for StateRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for StateRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StateRef")
            .field(&*self.inner.lock().unwrap())
            .finish()
    }
}

impl<T: EntityState> StateRef<T> {
    pub(crate) fn new(state: Tracked<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub fn id(&self) -> EntityId {
        self.inner.lock().unwrap().id()
    }

    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(self.inner.lock().unwrap().get())
    }

    /// Mutate the payload and mark it dirty
    pub fn modify<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        self.inner.lock().unwrap().modify(f)
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.lock().unwrap().is_dirty()
    }

    pub fn version(&self) -> u64 {
        self.inner.lock().unwrap().version()
    }

    /// Whether both handles point at the same live state
    pub fn same_state(&self, other: &StateRef<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn with_tracked<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Tracked<T>) -> R,
    {
        f(&mut self.inner.lock().unwrap())
    }

    /// Package `command` as a task for the entity's mailbox
    pub(crate) fn task<S: DocumentStore>(&self, command: StateCommand<S>) -> ActorTask {
        let state = self.clone();
        Box::new(move || state.apply(command))
    }

    fn apply<S: DocumentStore>(&self, command: StateCommand<S>) {
        match command {
            StateCommand::Snapshot { store, reply } => {
                let snapshot = self.with_tracked(
                    |tracked| -> Result<Option<PendingWrite>, CodecError> {
                        if !tracked.is_dirty() {
                            return Ok(None);
                        }
                        let descriptor = store.update_descriptor(
                            T::collection(),
                            tracked.id(),
                            tracked.get(),
                        )?;
                        Ok(Some(PendingWrite {
                            descriptor,
                            version: tracked.version(),
                        }))
                    },
                );
                // The drain may have given up waiting; nothing to do then
                let _ = reply.send(snapshot);
            }
            StateCommand::ClearDirty { version } => {
                let cleared = self.with_tracked(|tracked| tracked.clear_dirty_at(version));
                if !cleared {
                    tracing::trace!(
                        id = %self.id(),
                        "mutated after snapshot, staying dirty"
                    );
                }
            }
        }
    }
}

/// Requests the typed cache sends into an entity's mailbox.
pub(crate) enum StateCommand<S> {
    /// Reply with an update for the current state if it is dirty
    Snapshot {
        store: S,
        reply: oneshot::Sender<Result<Option<PendingWrite>, CodecError>>,
    },
    /// Clear the dirty flag if the state is still at `version`
    ClearDirty { version: u64 },
}

/// An update and the state version it was built from.
pub(crate) struct PendingWrite {
    pub(crate) descriptor: UpdateDescriptor,
    pub(crate) version: u64,
}
