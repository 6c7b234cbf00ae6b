//! Error types for committed store operations.

use crate::key::ObjectKey;
use crate::schema::{EntityTypeId, PropertyId};
use crate::value::ValueType;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading or writing the committed store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// No object with this key exists in the store.
    #[error("unknown object {key}")]
    UnknownObject {
        /// The key that was looked up.
        key: ObjectKey,
    },

    /// The entity type is not registered in the schema registry.
    #[error("unknown entity type {entity}")]
    UnknownEntityType {
        /// The unregistered entity type.
        entity: EntityTypeId,
    },

    /// The property does not belong to the object's entity type.
    #[error("property {property} is not defined for entity type {entity}")]
    UnknownProperty {
        /// The object's entity type.
        entity: EntityTypeId,
        /// The property that was requested.
        property: PropertyId,
    },

    /// The property exists but has the wrong kind for this operation.
    #[error("property {property} is not a {expected} property")]
    WrongPropertyKind {
        /// The property that was used.
        property: PropertyId,
        /// The kind the operation needed.
        expected: &'static str,
    },

    /// A value does not match the property's declared type.
    #[error("type mismatch on {property}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The property being written.
        property: PropertyId,
        /// The declared value type.
        expected: ValueType,
        /// The type of the offered value.
        actual: ValueType,
    },

    /// A reference points at an object of the wrong entity type.
    #[error("reference on {property} must target {expected}, got {actual}")]
    ReferenceTargetMismatch {
        /// The reference property.
        property: PropertyId,
        /// The declared target entity type.
        expected: EntityTypeId,
        /// The entity type of the referenced object.
        actual: EntityTypeId,
    },

    /// The object is not a member of the given parent list.
    #[error("object {key} is not a member of {parent}/{list}")]
    NotAMember {
        /// The parent object.
        parent: ObjectKey,
        /// The parent's list property.
        list: PropertyId,
        /// The object that was expected in the list.
        key: ObjectKey,
    },

    /// Deleting the object would leave a dangling reference behind.
    #[error("object {key} is still referenced by {referrer} through {property}")]
    StillReferenced {
        /// The object being deleted.
        key: ObjectKey,
        /// The surviving object holding the reference.
        referrer: ObjectKey,
        /// The referring property.
        property: PropertyId,
    },

    /// Moving the object would make it its own ancestor.
    #[error("cannot move {key} beneath its own descendant {parent}")]
    CyclicMove {
        /// The object being moved.
        key: ObjectKey,
        /// The requested new parent.
        parent: ObjectKey,
    },

    /// A write was attempted outside a transaction bracket.
    #[error("no store transaction is active")]
    NoTransaction,

    /// `start_transaction` was called while a bracket is already open.
    #[error("a store transaction is already active")]
    TransactionActive,

    /// The store already has a root object.
    #[error("store already has root object {root}")]
    RootExists {
        /// The existing root.
        root: ObjectKey,
    },

    /// The schema registry definition is inconsistent.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A snapshot could not be loaded.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl StorageError {
    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema(message.into())
    }

    /// Creates an invalid snapshot error.
    pub fn invalid_snapshot(message: impl Into<String>) -> Self {
        Self::InvalidSnapshot(message.into())
    }
}
