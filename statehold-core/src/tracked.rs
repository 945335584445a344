use serde::{Serialize, de::DeserializeOwned};

use crate::EntityId;

/// A schema of persisted data shared by every entity of one kind.
///
/// Each implementing type is stored in its own collection, named by
/// [`EntityState::collection`]. Entities that have never been saved start out
/// as `Default::default()`.
pub trait EntityState: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// The collection documents of this type are stored in
    fn collection() -> &'static str {
        short_type_name::<Self>()
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}

/// An entity's live state: the payload, its id and whether it holds
/// mutations that have not been acknowledged by the store.
///
/// Every mutation also bumps a version counter. A flush records the version
/// it wrote and clears the dirty flag with [`Tracked::clear_dirty_at`], so a
/// mutation that lands between the snapshot and the clear is never lost.
#[derive(Debug, Clone)]
pub struct Tracked<T> {
    id: EntityId,
    payload: T,
    dirty: bool,
    version: u64,
}

impl<T> Tracked<T> {
    /// State freshly loaded from the store, so not dirty
    pub fn clean(id: EntityId, payload: T) -> Self {
        Tracked {
            id,
            payload,
            dirty: false,
            version: 0,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn get(&self) -> &T {
        &self.payload
    }

    /// Mutate the payload, marking the state dirty
    pub fn modify<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        self.mark_dirty();
        f(&mut self.payload)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.version += 1;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Clear the dirty flag only if nothing changed since `version` was
    /// observed. Returns whether the flag was cleared.
    pub fn clear_dirty_at(&mut self, version: u64) -> bool {
        if self.version == version {
            self.dirty = false;
            true
        } else {
            false
        }
    }

    /// Overwrite with freshly loaded state, discarding unsaved mutations.
    pub fn reload_from(&mut self, loaded: Tracked<T>) {
        self.payload = loaded.payload;
        self.dirty = false;
        // Outstanding clears for the old contents must not match
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, serde::Serialize, serde::Deserialize)]
    struct PlayerState {
        gold: u64,
    }

    impl EntityState for PlayerState {}

    #[test]
    fn collection_defaults_to_the_type_name() {
        assert_eq!(PlayerState::collection(), "PlayerState");
    }

    #[test]
    fn stale_clear_leaves_later_mutation_dirty() {
        let mut state = Tracked::clean(EntityId::new(1), PlayerState::default());
        assert!(!state.is_dirty());

        state.modify(|p| p.gold += 10);
        let written = state.version();
        state.modify(|p| p.gold += 5);

        assert!(!state.clear_dirty_at(written));
        assert!(state.is_dirty());
        assert!(state.clear_dirty_at(state.version()));
        assert!(!state.is_dirty());
    }

    #[test]
    fn reload_discards_unsaved_changes() {
        let mut state = Tracked::clean(EntityId::new(1), PlayerState::default());
        state.modify(|p| p.gold = 99);
        let before = state.version();
        state.reload_from(Tracked::clean(EntityId::new(1), PlayerState { gold: 3 }));
        assert_eq!(state.get().gold, 3);
        assert!(!state.is_dirty());
        assert!(!state.clear_dirty_at(before));
    }
}
