use serde::Serialize;
use statehold_core::{BulkWriteResult, CodecError, EntityId, UpdateDescriptor, WriteOrdering};

use crate::StoreError;

mod in_memory;
pub use in_memory::InMemoryStore;
pub mod testing;

/// The backing document store: one logical collection per entity-state type,
/// one document per entity id.
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Load the document for `id`, `None` if it has never been saved
    fn load(
        &self,
        collection: &str,
        id: EntityId,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send;

    fn save(
        &self,
        collection: &str,
        id: EntityId,
        document: Vec<u8>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Build the upsert a bulk write applies for one entity's state
    fn update_descriptor<T: Serialize>(
        &self,
        collection: &str,
        id: EntityId,
        state: &T,
    ) -> Result<UpdateDescriptor, CodecError> {
        UpdateDescriptor::upsert(collection, id, state)
    }

    /// Apply many independent upserts in one round trip
    fn bulk_write(
        &self,
        collection: &str,
        updates: Vec<UpdateDescriptor>,
        ordering: WriteOrdering,
    ) -> impl Future<Output = Result<BulkWriteResult, StoreError>> + Send;
}
