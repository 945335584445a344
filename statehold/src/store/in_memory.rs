use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use statehold_core::{
    BulkWriteResult, DocumentKey, EntityId, UpdateDescriptor, WriteOrdering, codec,
};

use crate::{StoreError, store::DocumentStore};

/// A [`DocumentStore`] which keeps every document in a shared map.
///
/// Clones share the same documents.
#[derive(Clone, Default)]
pub struct InMemoryStore(Arc<Mutex<HashMap<DocumentKey, Vec<u8>>>>);

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, collection: &str, id: EntityId) -> Option<Vec<u8>> {
        self.0
            .lock()
            .unwrap()
            .get(&DocumentKey::new(collection, id))
            .cloned()
    }

    /// Decode the stored document for `id`
    pub fn get_decoded<T: serde::de::DeserializeOwned>(
        &self,
        collection: &str,
        id: EntityId,
    ) -> Option<Result<T, codec::CodecError>> {
        self.get(collection, id)
            .map(|bytes| codec::decode_document(id, &bytes))
    }

    pub fn count(&self, collection: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.is_in(collection))
            .count()
    }
}

impl DocumentStore for InMemoryStore {
    fn load(
        &self,
        collection: &str,
        id: EntityId,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send {
        futures::future::ready(Ok(self.get(collection, id)))
    }

    fn save(
        &self,
        collection: &str,
        id: EntityId,
        document: Vec<u8>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.0
            .lock()
            .unwrap()
            .insert(DocumentKey::new(collection, id), document);
        futures::future::ready(Ok(()))
    }

    fn bulk_write(
        &self,
        collection: &str,
        updates: Vec<UpdateDescriptor>,
        _ordering: WriteOrdering,
    ) -> impl Future<Output = Result<BulkWriteResult, StoreError>> + Send {
        let result = if let Some(stray) = updates.iter().find(|u| !u.key().is_in(collection)) {
            Err(StoreError::new(format!(
                "update for {} sent to collection {collection}",
                stray.key()
            )))
        } else {
            let mut docs = self.0.lock().unwrap();
            let matched = updates.len();
            for update in updates {
                let (key, document) = update.into_parts();
                docs.insert(key, document);
            }
            Ok(BulkWriteResult::acknowledged(matched))
        };
        futures::future::ready(result)
    }
}
