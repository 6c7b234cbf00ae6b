//! Lazy views of list properties.

use super::object::UncommittedObject;
use super::state::Shared;
use crate::change_feed::ChangeKind;
use crate::delta::{ListDelta, ListMember, MergingIterator, Membership};
use crate::error::{CoreError, CoreResult};
use crate::identity::Placement;
use crate::types::IdentityKey;
use ledgergraph_storage::{EntityTypeId, ObjectKey, PropertyId};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// One list property of one object in the uncommitted view.
///
/// The view holds no members itself. Every call reads the committed list
/// and overlays the list delta as it stands at that moment.
#[derive(Clone)]
pub struct ListView {
    shared: Rc<Shared>,
    owner: IdentityKey,
    property: PropertyId,
    member: EntityTypeId,
}

impl ListView {
    pub(crate) fn new(
        shared: Rc<Shared>,
        owner: IdentityKey,
        property: PropertyId,
        member: EntityTypeId,
    ) -> Self {
        Self {
            shared,
            owner,
            property,
            member,
        }
    }

    /// Returns the list property.
    #[must_use]
    pub fn property(&self) -> PropertyId {
        self.property
    }

    /// Returns the entity type of the members.
    #[must_use]
    pub fn member_type(&self) -> EntityTypeId {
        self.member
    }

    /// Iterates over the logical members: committed members that were not
    /// removed, then members added in this transaction.
    ///
    /// The iterator works on a copy of the delta taken here; edits made
    /// while iterating show up in the next iterator, not this one.
    pub fn iter(&self) -> CoreResult<ListIter> {
        Ok(ListIter {
            shared: Rc::clone(&self.shared),
            members: self.merged()?,
        })
    }

    /// Returns the number of logical members.
    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.merged()?.count())
    }

    /// Returns true if the list has no logical members.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Creates a new object at the end of the list, starting from schema
    /// defaults. Nothing is written to the store before commit.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WrongEntityType`] if the list does not hold
    /// `entity`.
    pub fn create(&self, entity: EntityTypeId) -> CoreResult<UncommittedObject> {
        if entity != self.member {
            return Err(CoreError::WrongEntityType {
                property: self.property,
                expected: self.member,
                actual: entity,
            });
        }
        let placement = self.placement();
        let identity = {
            let mut state = self.shared.state.borrow_mut();
            state.ensure_live(self.owner)?;
            let identity = state.arena.allocate(entity, placement);
            state.delta_mut(placement).add(identity, Membership::New);
            identity
        };
        debug!(
            session = %self.shared.session,
            identity = %identity,
            owner = %self.owner,
            list = %self.property,
            "created object"
        );
        let object = self.shared.materialize(identity)?;
        self.announce(identity, true);
        Ok(object)
    }

    /// Moves `object` from wherever it is into this list.
    ///
    /// Returns `false` if it already is a member.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedOperation`] if `object` belongs to a
    /// different manager or is the root, and
    /// [`CoreError::InvariantViolation`] if this list sits inside `object`.
    pub fn add(&self, object: &UncommittedObject) -> CoreResult<bool> {
        self.check_same_manager(object, "move between managers")?;
        let actual = object.entity_type();
        if actual != self.member {
            return Err(CoreError::WrongEntityType {
                property: self.property,
                expected: self.member,
                actual,
            });
        }
        let identity = object.identity();
        let target = self.placement();
        {
            let mut guard = self.shared.state.borrow_mut();
            let state = &mut *guard;
            state.ensure_live(self.owner)?;
            state.ensure_live(identity)?;
            let store = self.shared.store();
            let current = state
                .placement(store, identity)?
                .ok_or_else(|| CoreError::unsupported("move root"))?;
            if current == target {
                return Ok(false);
            }
            let mut cursor = Some(self.owner);
            while let Some(ancestor) = cursor {
                if ancestor == identity {
                    return Err(CoreError::invariant(format!(
                        "{identity} cannot be moved into its own subtree"
                    )));
                }
                cursor = state.placement(store, ancestor)?.map(|p| p.owner);
            }

            let from = state.membership(store, identity, current)?;
            state.delta_mut(current).remove(identity, from);
            let to = state.membership(store, identity, target)?;
            state.delta_mut(target).add(identity, to);

            let placement = match to {
                Membership::Committed { in_list: true, .. } => None,
                Membership::Committed { .. } | Membership::New => Some(target),
            };
            state.arena.set_placement(identity, placement)?;
        }
        self.announce(identity, false);
        Ok(true)
    }

    /// Removes `object` from the list. Lists own their members, so this
    /// deletes it.
    ///
    /// Returns `false` if it is not a member.
    pub fn remove(&self, object: &UncommittedObject) -> CoreResult<bool> {
        self.check_same_manager(object, "remove across managers")?;
        {
            let mut state = self.shared.state.borrow_mut();
            state.ensure_live(self.owner)?;
            if state.journal.is_deleted(object.identity()) {
                return Ok(false);
            }
            if state.placement(self.shared.store(), object.identity())? != Some(self.placement()) {
                return Ok(false);
            }
        }
        object.delete()?;
        Ok(true)
    }

    /// Always fails: membership queries are not supported.
    pub fn contains(&self, _object: &UncommittedObject) -> CoreResult<bool> {
        Err(CoreError::unsupported("contains"))
    }

    /// Always fails: membership queries are not supported.
    pub fn contains_all(&self, _objects: &[UncommittedObject]) -> CoreResult<bool> {
        Err(CoreError::unsupported("contains_all"))
    }

    /// Always fails: bulk edits are not supported.
    pub fn add_all(&self, _objects: &[UncommittedObject]) -> CoreResult<bool> {
        Err(CoreError::unsupported("add_all"))
    }

    /// Always fails: bulk edits are not supported.
    pub fn retain_all(&self, _objects: &[UncommittedObject]) -> CoreResult<bool> {
        Err(CoreError::unsupported("retain_all"))
    }

    fn placement(&self) -> Placement {
        Placement {
            owner: self.owner,
            list: self.property,
        }
    }

    fn merged(&self) -> CoreResult<MergingIterator<std::vec::IntoIter<ObjectKey>>> {
        let state = self.shared.state.borrow();
        state.ensure_live(self.owner)?;
        let committed = match state.arena.resolve(self.owner) {
            Some(owner) => self.shared.store().list_members(owner, self.property)?,
            None => Vec::new(),
        };
        Ok(match state.delta(self.owner, self.property) {
            Some(delta) => delta.merged_view(committed),
            None => ListDelta::new().merged_view(committed),
        })
    }

    fn check_same_manager(
        &self,
        object: &UncommittedObject,
        operation: &'static str,
    ) -> CoreResult<()> {
        if Rc::ptr_eq(&self.shared, object.shared()) {
            Ok(())
        } else {
            Err(CoreError::unsupported(operation))
        }
    }

    fn announce(&self, identity: IdentityKey, created: bool) {
        let owner = self.shared.state.borrow().object_ref(self.owner);
        let kind = if created {
            ChangeKind::Inserted {
                owner,
                list: self.property,
            }
        } else {
            ChangeKind::Moved {
                owner,
                list: self.property,
            }
        };
        self.shared.emit(identity, kind);
    }
}

impl fmt::Debug for ListView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListView")
            .field("owner", &self.owner)
            .field("property", &self.property)
            .field("member", &self.member)
            .finish()
    }
}

/// Iterator over the members of a [`ListView`], materializing each one.
pub struct ListIter {
    shared: Rc<Shared>,
    members: MergingIterator<std::vec::IntoIter<ObjectKey>>,
}

impl Iterator for ListIter {
    type Item = CoreResult<UncommittedObject>;

    fn next(&mut self) -> Option<Self::Item> {
        let member = self.members.next()?;
        Some(match member {
            ListMember::Committed(key) => self.shared.materialize_key(key),
            ListMember::Added(identity) => self.shared.materialize(identity),
        })
    }
}

impl fmt::Debug for ListIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListIter").finish_non_exhaustive()
    }
}
