use serde::Serialize;

use crate::{DocumentKey, EntityId, codec};

/// A single-document upsert, built just before a batch is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDescriptor {
    key: DocumentKey,
    document: Vec<u8>,
}

impl UpdateDescriptor {
    pub fn upsert<T: Serialize>(
        collection: &str,
        id: EntityId,
        payload: &T,
    ) -> Result<Self, codec::CodecError> {
        Ok(UpdateDescriptor {
            key: DocumentKey::new(collection, id),
            document: codec::encode_document(id, payload)?,
        })
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn id(&self) -> EntityId {
        self.key.id()
    }

    pub fn document(&self) -> &[u8] {
        &self.document
    }

    pub fn into_parts(self) -> (DocumentKey, Vec<u8>) {
        (self.key, self.document)
    }
}

/// Whether the store must apply a bulk write in order, stopping at the first
/// failure, or may apply every update independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrdering {
    Ordered,
    Unordered,
}

/// The store's answer to a bulk write.
///
/// An unacknowledged write is entirely unverified: some of its updates may
/// have landed, others not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkWriteResult {
    pub acknowledged: bool,
    pub matched: usize,
}

impl BulkWriteResult {
    pub fn acknowledged(matched: usize) -> Self {
        BulkWriteResult {
            acknowledged: true,
            matched,
        }
    }

    pub fn unacknowledged() -> Self {
        BulkWriteResult {
            acknowledged: false,
            matched: 0,
        }
    }
}
