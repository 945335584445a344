use statehold_core::{CodecError, EntityId};

/// An entity's mailbox has shut down and no longer accepts work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the entity's mailbox has stopped")]
pub struct Stopped;

/// A failure reported by a [`DocumentStore`](crate::store::DocumentStore) driver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("document store error: {message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new<M: Into<String>>(message: M) -> Self {
        StoreError {
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("no state is loaded for {0}")]
    NotLoaded(EntityId),
    #[error(transparent)]
    Stopped(#[from] Stopped),
}
