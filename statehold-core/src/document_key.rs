use std::fmt;

use crate::EntityId;

/// Addresses one persisted document: the collection of the entity-state
/// type and the id of the entity within it.
///
/// ```rust
/// use statehold_core::{DocumentKey, EntityId};
///
/// let key = DocumentKey::new("PlayerState", EntityId::new(7));
/// assert_eq!(key.to_string(), "PlayerState/7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    collection: String,
    id: EntityId,
}

impl DocumentKey {
    pub fn new<C: Into<String>>(collection: C, id: EntityId) -> Self {
        DocumentKey {
            collection: collection.into(),
            id,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Whether this key lives in the given collection
    pub fn is_in(&self, collection: &str) -> bool {
        self.collection == collection
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id.as_u64())
    }
}
