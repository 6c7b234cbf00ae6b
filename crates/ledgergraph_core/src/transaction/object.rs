//! Handles to objects in the uncommitted view.

use super::list::ListView;
use super::state::{Shadow, Shared};
use crate::change_feed::ChangeKind;
use crate::error::{CoreError, CoreResult};
use crate::journal::FieldValue;
use crate::types::IdentityKey;
use ledgergraph_storage::{
    CommittedStore, EntityTypeId, ObjectKey, PropertyDescriptor, PropertyId, PropertyKind,
    StorageError, Value, ValueType,
};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A mutable, speculative view of one object.
///
/// Reads come from the values copied in at materialization; writes go to the
/// manager's journal and never touch the committed store. Handles are cheap
/// to clone and are tied to the manager that produced them.
#[derive(Clone)]
pub struct UncommittedObject {
    shared: Rc<Shared>,
    shadow: Rc<RefCell<Shadow>>,
}

impl UncommittedObject {
    pub(crate) fn new(shared: Rc<Shared>, shadow: Rc<RefCell<Shadow>>) -> Self {
        Self { shared, shadow }
    }

    pub(crate) fn shared(&self) -> &Rc<Shared> {
        &self.shared
    }

    /// Returns the object's identity in its manager.
    #[must_use]
    pub fn identity(&self) -> IdentityKey {
        self.shadow.borrow().identity
    }

    /// Returns the object's entity type.
    #[must_use]
    pub fn entity_type(&self) -> EntityTypeId {
        self.shadow.borrow().entity
    }

    /// Returns the committed key, `None` until a new object is committed.
    #[must_use]
    pub fn committed_key(&self) -> Option<ObjectKey> {
        self.shared.state.borrow().arena.resolve(self.identity())
    }

    /// Returns true if the object was created in this transaction.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.shared
            .state
            .borrow()
            .arena
            .is_new(self.identity())
            .unwrap_or(false)
    }

    /// Returns true if the object has been deleted in this transaction.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.shared.state.borrow().journal.is_deleted(self.identity())
    }

    /// Returns true if both handles share one instance.
    ///
    /// Separate materializations of one object are separate instances unless
    /// the manager caches materializations.
    #[must_use]
    pub fn same_instance(&self, other: &UncommittedObject) -> bool {
        Rc::ptr_eq(&self.shadow, &other.shadow)
    }

    /// Reads a scalar property.
    ///
    /// # Errors
    ///
    /// Fails if the property does not belong to this entity type or is a
    /// reference or list property.
    pub fn get(&self, property: PropertyId) -> CoreResult<Value> {
        match self.field(property)? {
            FieldValue::Scalar(value) => Ok(value),
            FieldValue::Reference(_) => Err(StorageError::WrongPropertyKind {
                property,
                expected: "scalar",
            }
            .into()),
        }
    }

    /// Reads a scalar or reference property as held in the uncommitted view.
    pub fn field(&self, property: PropertyId) -> CoreResult<FieldValue> {
        self.descriptor(property)?;
        self.shadow
            .borrow()
            .values
            .get(&property)
            .cloned()
            .ok_or_else(|| CoreError::invariant(format!("{property} missing from shadow")))
    }

    /// Writes a scalar property.
    ///
    /// A reference property also accepts `Value::Null` and
    /// `Value::Reference` to a committed object not deleted in this
    /// transaction.
    ///
    /// # Errors
    ///
    /// Fails if the object is deleted, the manager is no longer open, or the
    /// value does not match the property's declared type.
    pub fn set(&self, property: PropertyId, value: Value) -> CoreResult<()> {
        let descriptor = self.descriptor(property)?;
        let field = match descriptor.kind {
            PropertyKind::Reference { target } => match value {
                Value::Null => FieldValue::Reference(None),
                Value::Reference(key) => {
                    let store: &dyn CommittedStore = self.shared.store();
                    let actual = store.entity_type(key)?;
                    if actual != target {
                        return Err(CoreError::WrongEntityType {
                            property,
                            expected: target,
                            actual,
                        });
                    }
                    let identity = {
                        let mut state = self.shared.state.borrow_mut();
                        let identity = state.intern(store, key)?;
                        state.ensure_live(identity)?;
                        identity
                    };
                    FieldValue::Reference(Some(identity))
                }
                other => {
                    return Err(StorageError::TypeMismatch {
                        property,
                        expected: ValueType::Reference,
                        actual: other.value_type(),
                    }
                    .into())
                }
            },
            _ => {
                descriptor.check_value(&value)?;
                FieldValue::Scalar(value)
            }
        };
        self.write(property, field)
    }

    /// Materializes the target of a reference property.
    ///
    /// Returns `None` for a null reference.
    pub fn reference(&self, property: PropertyId) -> CoreResult<Option<UncommittedObject>> {
        let descriptor = self.descriptor(property)?;
        if descriptor.reference_target().is_none() {
            return Err(StorageError::WrongPropertyKind {
                property,
                expected: "reference",
            }
            .into());
        }
        match self.field(property)?.as_reference() {
            Some(target) => self.shared.materialize(target).map(Some),
            None => Ok(None),
        }
    }

    /// Points a reference property at another object of this manager, or
    /// clears it.
    ///
    /// The target may be new; it is resolved when the transaction commits.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedOperation`] if `target` belongs to a
    /// different manager, [`CoreError::WrongEntityType`] if it has the wrong
    /// type.
    pub fn set_reference(
        &self,
        property: PropertyId,
        target: Option<&UncommittedObject>,
    ) -> CoreResult<()> {
        let descriptor = self.descriptor(property)?;
        let expected = descriptor.reference_target().ok_or(StorageError::WrongPropertyKind {
            property,
            expected: "reference",
        })?;
        let field = match target {
            None => FieldValue::Reference(None),
            Some(target) => {
                if !Rc::ptr_eq(&self.shared, &target.shared) {
                    return Err(CoreError::unsupported("reference across managers"));
                }
                let actual = target.entity_type();
                if actual != expected {
                    return Err(CoreError::WrongEntityType {
                        property,
                        expected,
                        actual,
                    });
                }
                self.shared.state.borrow().ensure_live(target.identity())?;
                FieldValue::Reference(Some(target.identity()))
            }
        };
        self.write(property, field)
    }

    /// Returns a view of a list property.
    pub fn list(&self, property: PropertyId) -> CoreResult<ListView> {
        let schema = self.shared.schemas.schema_for(self.entity_type())?;
        let member = schema
            .list_property(property)?
            .list_member()
            .ok_or(StorageError::WrongPropertyKind {
                property,
                expected: "list",
            })?;
        Ok(ListView::new(
            Rc::clone(&self.shared),
            self.identity(),
            property,
            member,
        ))
    }

    /// Creates a new object at the end of one of this object's lists.
    pub fn create_child(
        &self,
        list: PropertyId,
        entity: EntityTypeId,
    ) -> CoreResult<UncommittedObject> {
        self.list(list)?.create(entity)
    }

    /// Deletes the object and everything it owns.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyDeleted`] on a second delete and
    /// [`CoreError::UnsupportedOperation`] for the root.
    pub fn delete(&self) -> CoreResult<()> {
        let identity = self.identity();
        {
            let mut guard = self.shared.state.borrow_mut();
            let state = &mut *guard;
            state.ensure_open()?;
            if identity == state.root {
                return Err(CoreError::unsupported("delete root"));
            }
            if state.journal.is_deleted(identity) {
                return Err(CoreError::AlreadyDeleted { identity });
            }
            let store = self.shared.store();
            if let Some(current) = state.placement(store, identity)? {
                let membership = state.membership(store, identity, current)?;
                state.delta_mut(current).remove(identity, membership);
            }
            state.arena.set_placement(identity, None)?;
            state.journal.record_deletion(identity)?;
            state.cache.remove(&identity);
        }
        self.shared.emit(identity, ChangeKind::Deleted);
        Ok(())
    }

    fn descriptor(&self, property: PropertyId) -> CoreResult<PropertyDescriptor> {
        let schema = self.shared.schemas.schema_for(self.entity_type())?;
        Ok(schema.value_property(property)?.clone())
    }

    fn write(&self, property: PropertyId, value: FieldValue) -> CoreResult<()> {
        let identity = self.identity();
        {
            let mut state = self.shared.state.borrow_mut();
            state.ensure_live(identity)?;
            state.journal.record_change(identity, property, value.clone())?;
        }
        let old = self
            .shadow
            .borrow_mut()
            .values
            .insert(property, value.clone())
            .unwrap_or(FieldValue::Reference(None));
        self.shared.emit(
            identity,
            ChangeKind::PropertyChanged {
                property,
                old,
                new: value,
            },
        );
        Ok(())
    }
}

impl fmt::Debug for UncommittedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shadow = self.shadow.borrow();
        f.debug_struct("UncommittedObject")
            .field("identity", &shadow.identity)
            .field("entity", &shadow.entity)
            .field("values", &shadow.values)
            .finish()
    }
}
