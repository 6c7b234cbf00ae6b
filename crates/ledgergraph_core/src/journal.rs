//! Property change journal.
//!
//! Records every pending scalar write and deletion mark, keyed by object
//! identity. Nothing here touches the committed store; the journal is
//! replayed during commit.

use crate::error::{CoreError, CoreResult};
use crate::types::IdentityKey;
use ledgergraph_storage::{PropertyId, Value};
use std::collections::BTreeMap;

/// The uncommitted value of a scalar or reference property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// A plain value. After commit this may also carry a committed
    /// `Value::Reference`.
    Scalar(Value),
    /// A reference held as an identity key, so the target is never
    /// materialized or committed early. `None` is a null reference.
    Reference(Option<IdentityKey>),
}

impl FieldValue {
    /// Returns the scalar payload, if this is a scalar.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(v) => Some(v),
            FieldValue::Reference(_) => None,
        }
    }

    /// Returns the reference target, if this is a non-null reference.
    #[must_use]
    pub fn as_reference(&self) -> Option<IdentityKey> {
        match self {
            FieldValue::Reference(target) => *target,
            FieldValue::Scalar(_) => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Scalar(value)
    }
}

/// Journal state of one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    /// Pending property writes in property order.
    Changes(BTreeMap<PropertyId, FieldValue>),
    /// The object is marked for deletion.
    Deleted,
}

/// Map from object identity to pending writes or deletion marks.
#[derive(Debug, Default)]
pub struct ChangeJournal {
    entries: BTreeMap<IdentityKey, JournalEntry>,
}

impl ChangeJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts a pending value. Later writes to the same property replace
    /// earlier ones.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvariantViolation`] if the object is marked
    /// deleted.
    pub fn record_change(
        &mut self,
        object: IdentityKey,
        property: PropertyId,
        value: FieldValue,
    ) -> CoreResult<()> {
        match self
            .entries
            .entry(object)
            .or_insert_with(|| JournalEntry::Changes(BTreeMap::new()))
        {
            JournalEntry::Changes(changes) => {
                changes.insert(property, value);
                Ok(())
            }
            JournalEntry::Deleted => Err(CoreError::invariant(format!(
                "cannot change {property} of deleted object {object}"
            ))),
        }
    }

    /// Marks the object deleted, discarding its pending changes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyDeleted`] on the second call.
    pub fn record_deletion(&mut self, object: IdentityKey) -> CoreResult<()> {
        if self.is_deleted(object) {
            return Err(CoreError::AlreadyDeleted { identity: object });
        }
        self.entries.insert(object, JournalEntry::Deleted);
        Ok(())
    }

    /// Returns the pending value of a property, if any.
    #[must_use]
    pub fn pending_value(&self, object: IdentityKey, property: PropertyId) -> Option<&FieldValue> {
        match self.entries.get(&object)? {
            JournalEntry::Changes(changes) => changes.get(&property),
            JournalEntry::Deleted => None,
        }
    }

    /// Returns the pending changes of an object.
    #[must_use]
    pub fn changes(&self, object: IdentityKey) -> Option<&BTreeMap<PropertyId, FieldValue>> {
        match self.entries.get(&object)? {
            JournalEntry::Changes(changes) => Some(changes),
            JournalEntry::Deleted => None,
        }
    }

    /// Returns true if the object is marked deleted.
    #[must_use]
    pub fn is_deleted(&self, object: IdentityKey) -> bool {
        matches!(self.entries.get(&object), Some(JournalEntry::Deleted))
    }

    /// Iterates over all entries in identity order.
    pub fn entries(&self) -> impl Iterator<Item = (IdentityKey, &JournalEntry)> {
        self.entries.iter().map(|(k, e)| (*k, e))
    }

    /// Iterates over the objects marked deleted.
    pub fn deleted(&self) -> impl Iterator<Item = IdentityKey> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| matches!(e, JournalEntry::Deleted))
            .map(|(k, _)| *k)
    }

    /// Returns the number of objects with journal entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
