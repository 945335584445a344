use statehold_core::EntityId;

use crate::Stopped;

/// A unit of work run on an entity's own execution context.
pub type ActorTask = Box<dyn FnOnce() + Send + 'static>;

/// A handle onto one entity's single-threaded execution context.
pub trait ActorHandle: Clone + Send + Sync + 'static {
    /// Read-only actors are owned elsewhere and never flushed from here
    fn is_read_only(&self) -> bool;

    /// Run `task` exclusively on this entity's context.
    ///
    /// The task is enqueued before this method returns, so dropping the
    /// returned future does not cancel it. The future resolves once the task
    /// has run, or with [`Stopped`] if the context no longer accepts work.
    fn submit(&self, task: ActorTask) -> impl Future<Output = Result<(), Stopped>> + Send + 'static;
}

/// Finds the live actor for an entity, if there is one in this process.
pub trait ActorDirectory: Clone + Send + Sync + 'static {
    type Handle: ActorHandle;

    fn lookup(&self, id: EntityId) -> Option<Self::Handle>;
}
