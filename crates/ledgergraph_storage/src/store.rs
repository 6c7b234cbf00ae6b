//! Committed store trait definition.

use crate::error::StorageResult;
use crate::key::ObjectKey;
use crate::schema::{EntityTypeId, PropertyId, SchemaRegistry};
use crate::value::Value;
use std::sync::Arc;

/// The durable object graph that transactions are committed to.
///
/// A committed store holds a tree of objects: every object except the root
/// lives in exactly one list property of exactly one parent. Objects carry
/// scalar values and references to other objects anywhere in the graph.
///
/// # Invariants
///
/// - Writes (`create_child`, `set_property`, `move_child`, `delete_child`)
///   are only accepted between `start_transaction` and
///   `commit_transaction`/`rollback_transaction`
/// - `rollback_transaction` leaves the graph exactly as it was at
///   `start_transaction`
/// - `delete_child` removes the whole subtree and refuses to leave a
///   reference from a surviving object to a deleted one
/// - Object keys are never reused
/// - Stores must be `Send + Sync`; several edit sessions may share one
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - staged in-memory graph
pub trait CommittedStore: Send + Sync {
    /// Returns the schema registry the store validates against.
    fn schemas(&self) -> Arc<SchemaRegistry>;

    /// Opens the write bracket.
    ///
    /// # Errors
    ///
    /// Returns an error if a bracket is already open.
    fn start_transaction(&self) -> StorageResult<()>;

    /// Publishes every write made since `start_transaction`.
    ///
    /// # Errors
    ///
    /// Returns an error if no bracket is open.
    fn commit_transaction(&self) -> StorageResult<()>;

    /// Discards every write made since `start_transaction`.
    ///
    /// # Errors
    ///
    /// Returns an error if no bracket is open.
    fn rollback_transaction(&self) -> StorageResult<()>;

    /// Returns true while a write bracket is open.
    fn in_transaction(&self) -> bool;

    /// Returns the root object, if the store has one.
    fn root(&self) -> Option<ObjectKey>;

    /// Returns true if the object exists.
    fn contains(&self, key: ObjectKey) -> bool;

    /// Returns the entity type of an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not exist.
    fn entity_type(&self, key: ObjectKey) -> StorageResult<EntityTypeId>;

    /// Reads a scalar or reference property.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not exist or the property is not a
    /// value property of its entity type.
    fn get_property(&self, key: ObjectKey, property: PropertyId) -> StorageResult<Value>;

    /// Returns the members of a list property in list order.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not exist or the property is not a
    /// list property of its entity type.
    fn list_members(&self, parent: ObjectKey, list: PropertyId) -> StorageResult<Vec<ObjectKey>>;

    /// Returns the parent object and list property holding `key`.
    ///
    /// Returns `None` for the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not exist.
    fn parent_of(&self, key: ObjectKey) -> StorageResult<Option<(ObjectKey, PropertyId)>>;

    /// Creates a new object at the end of `parent`'s `list`, with every
    /// property at its schema default.
    ///
    /// # Errors
    ///
    /// Returns an error if no bracket is open, the parent does not exist, or
    /// `list` is not a list of `entity`.
    fn create_child(
        &self,
        parent: ObjectKey,
        list: PropertyId,
        entity: EntityTypeId,
    ) -> StorageResult<ObjectKey>;

    /// Writes a scalar or reference property.
    ///
    /// # Errors
    ///
    /// Returns an error if no bracket is open, the value does not match the
    /// property's declared type, or a reference target does not exist.
    fn set_property(&self, key: ObjectKey, property: PropertyId, value: Value) -> StorageResult<()>;

    /// Moves an existing object to the end of another list.
    ///
    /// # Errors
    ///
    /// Returns an error if no bracket is open, either object does not exist,
    /// the list does not accept the object's type, or the move would create
    /// a cycle.
    fn move_child(&self, key: ObjectKey, parent: ObjectKey, list: PropertyId) -> StorageResult<()>;

    /// Deletes `key` and its subtree from `parent`'s `list`.
    ///
    /// # Errors
    ///
    /// Returns an error if no bracket is open, `key` is not a member of that
    /// list, or a surviving object still references the subtree.
    fn delete_child(&self, parent: ObjectKey, list: PropertyId, key: ObjectKey)
        -> StorageResult<()>;
}
