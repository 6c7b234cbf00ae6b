//! Identity arena: the only path from an uncommitted object back to its
//! committed counterpart.
//!
//! New objects may reference each other before any of them exists in the
//! store. Instead of nullable back pointers, every object gets an index into
//! this arena when the manager first sees it; cross references are stored as
//! indices and only turned into committed keys during the commit walk.

use crate::error::{CoreError, CoreResult};
use crate::types::IdentityKey;
use ledgergraph_storage::{EntityTypeId, ObjectKey, PropertyId};
use std::collections::HashMap;

/// Where an object currently sits in the uncommitted view: a list property
/// of an owner object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    /// Object owning the list.
    pub owner: IdentityKey,
    /// The owner's list property.
    pub list: PropertyId,
}

#[derive(Debug, Clone)]
struct IdentitySlot {
    entity: EntityTypeId,
    committed: Option<ObjectKey>,
    created_here: bool,
    // New objects: always their list. Committed objects: only set while
    // moved away from their committed parent list.
    placement: Option<Placement>,
}

/// Arena of identity keys for one transaction manager.
#[derive(Debug, Default)]
pub struct IdentityArena {
    slots: Vec<IdentitySlot>,
    by_committed: HashMap<ObjectKey, IdentityKey>,
}

impl IdentityArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the key for a committed object, allocating one already
    /// resolved to `committed` on first sight.
    pub fn intern(&mut self, committed: ObjectKey, entity: EntityTypeId) -> IdentityKey {
        if let Some(key) = self.by_committed.get(&committed) {
            return *key;
        }
        let key = self.push(IdentitySlot {
            entity,
            committed: Some(committed),
            created_here: false,
            placement: None,
        });
        self.by_committed.insert(committed, key);
        key
    }

    /// Allocates a key for an object created in this transaction.
    pub fn allocate(&mut self, entity: EntityTypeId, placement: Placement) -> IdentityKey {
        self.push(IdentitySlot {
            entity,
            committed: None,
            created_here: true,
            placement: Some(placement),
        })
    }

    /// Returns the key already interned for a committed object.
    #[must_use]
    pub fn lookup(&self, committed: ObjectKey) -> Option<IdentityKey> {
        self.by_committed.get(&committed).copied()
    }

    /// Returns the committed counterpart, `None` while the object is new.
    #[must_use]
    pub fn resolve(&self, key: IdentityKey) -> Option<ObjectKey> {
        self.slots.get(key.index()).and_then(|slot| slot.committed)
    }

    /// Binds a new object's key to the committed object written for it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvariantViolation`] if the key is unknown or
    /// already resolved.
    pub fn bind(&mut self, key: IdentityKey, committed: ObjectKey) -> CoreResult<()> {
        let slot = self.slot_mut(key)?;
        if let Some(existing) = slot.committed {
            return Err(CoreError::invariant(format!(
                "{key} is already bound to {existing}"
            )));
        }
        slot.committed = Some(committed);
        self.by_committed.insert(committed, key);
        Ok(())
    }

    /// Returns the entity type of the object.
    pub fn entity(&self, key: IdentityKey) -> CoreResult<EntityTypeId> {
        Ok(self.slot(key)?.entity)
    }

    /// Returns true if the object was created in this transaction, even
    /// after it has been bound during commit.
    pub fn is_new(&self, key: IdentityKey) -> CoreResult<bool> {
        Ok(self.slot(key)?.created_here)
    }

    /// Returns the uncommitted placement recorded for the object.
    pub fn placement(&self, key: IdentityKey) -> CoreResult<Option<Placement>> {
        Ok(self.slot(key)?.placement)
    }

    /// Records a new placement.
    pub fn set_placement(
        &mut self,
        key: IdentityKey,
        placement: Option<Placement>,
    ) -> CoreResult<()> {
        self.slot_mut(key)?.placement = placement;
        Ok(())
    }

    /// Returns true if `key` was issued by this arena.
    #[must_use]
    pub fn contains(&self, key: IdentityKey) -> bool {
        key.index() < self.slots.len()
    }

    /// Returns the number of identities issued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no identities were issued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn push(&mut self, slot: IdentitySlot) -> IdentityKey {
        #[allow(clippy::cast_possible_truncation)]
        let key = IdentityKey::new(self.slots.len() as u32);
        self.slots.push(slot);
        key
    }

    fn slot(&self, key: IdentityKey) -> CoreResult<&IdentitySlot> {
        self.slots
            .get(key.index())
            .ok_or_else(|| CoreError::invariant(format!("{key} was not issued by this manager")))
    }

    fn slot_mut(&mut self, key: IdentityKey) -> CoreResult<&mut IdentitySlot> {
        self.slots
            .get_mut(key.index())
            .ok_or_else(|| CoreError::invariant(format!("{key} was not issued by this manager")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THING: EntityTypeId = EntityTypeId::new(1);
    const ITEMS: PropertyId = PropertyId::new(THING, 0);

    #[test]
    fn intern_is_stable() {
        let mut arena = IdentityArena::new();
        let a = arena.intern(ObjectKey::new(10), THING);
        let b = arena.intern(ObjectKey::new(10), THING);
        let c = arena.intern(ObjectKey::new(11), THING);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.resolve(a), Some(ObjectKey::new(10)));
        assert!(!arena.is_new(a).unwrap());
    }

    #[test]
    fn new_identity_resolves_after_bind() {
        let mut arena = IdentityArena::new();
        let parent = arena.intern(ObjectKey::new(1), THING);
        let key = arena.allocate(
            THING,
            Placement {
                owner: parent,
                list: ITEMS,
            },
        );
        assert_eq!(arena.resolve(key), None);
        assert!(arena.is_new(key).unwrap());

        arena.bind(key, ObjectKey::new(5)).unwrap();
        assert_eq!(arena.resolve(key), Some(ObjectKey::new(5)));
        assert_eq!(arena.lookup(ObjectKey::new(5)), Some(key));
        assert!(arena.is_new(key).unwrap());
    }

    #[test]
    fn double_bind_is_invariant_violation() {
        let mut arena = IdentityArena::new();
        let parent = arena.intern(ObjectKey::new(1), THING);
        let key = arena.allocate(
            THING,
            Placement {
                owner: parent,
                list: ITEMS,
            },
        );
        arena.bind(key, ObjectKey::new(5)).unwrap();
        let err = arena.bind(key, ObjectKey::new(6)).unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation { .. }));
        assert_eq!(arena.resolve(key), Some(ObjectKey::new(5)));
    }

    #[test]
    fn binding_committed_identity_fails() {
        let mut arena = IdentityArena::new();
        let key = arena.intern(ObjectKey::new(1), THING);
        assert!(arena.bind(key, ObjectKey::new(2)).is_err());
    }

    #[test]
    fn foreign_key_is_rejected() {
        let arena = IdentityArena::new();
        let stranger = IdentityKey::new(9);
        assert!(!arena.contains(stranger));
        assert!(arena.entity(stranger).is_err());
        assert_eq!(arena.resolve(stranger), None);
    }
}
