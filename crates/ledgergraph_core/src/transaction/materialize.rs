//! Copy-in-transaction materialization.
//!
//! A materialized object is a shadow of its committed counterpart: every
//! value property is copied in when the shadow is built, taking the journal
//! value where one is pending and the committed value otherwise. Reference
//! targets stay identity keys until someone asks for them, and list
//! properties are read lazily through [`ListView`](super::ListView).

use super::object::UncommittedObject;
use super::state::{Shadow, Shared, TxState};
use crate::error::{CoreError, CoreResult};
use crate::journal::FieldValue;
use crate::types::IdentityKey;
use ledgergraph_storage::{CommittedStore, ObjectKey, PropertyKind, SchemaRegistry, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;

impl Shared {
    /// Materializes a committed object.
    pub(crate) fn materialize_key(self: &Rc<Self>, key: ObjectKey) -> CoreResult<UncommittedObject> {
        let identity = {
            let mut state = self.state.borrow_mut();
            state.ensure_open()?;
            state.intern(self.store(), key)?
        };
        self.materialize(identity)
    }

    /// Materializes any object known to this manager, new or committed.
    pub(crate) fn materialize(
        self: &Rc<Self>,
        identity: IdentityKey,
    ) -> CoreResult<UncommittedObject> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        if state.journal.is_deleted(identity) {
            return Err(CoreError::invariant(format!(
                "cannot materialize deleted object {identity}"
            )));
        }
        if self.config.cache_materializations {
            if let Some(shadow) = state.cache.get(&identity) {
                return Ok(UncommittedObject::new(Rc::clone(self), Rc::clone(shadow)));
            }
        }

        let shadow = build_shadow(self.store(), &self.schemas, &mut state, identity)?;
        debug!(
            session = %self.session,
            identity = %identity,
            entity = %shadow.entity,
            properties = shadow.values.len(),
            "materialized object"
        );
        let shadow = Rc::new(RefCell::new(shadow));
        if self.config.cache_materializations {
            state.cache.insert(identity, Rc::clone(&shadow));
        }
        Ok(UncommittedObject::new(Rc::clone(self), shadow))
    }
}

fn build_shadow(
    store: &dyn CommittedStore,
    schemas: &SchemaRegistry,
    state: &mut TxState,
    identity: IdentityKey,
) -> CoreResult<Shadow> {
    let entity = state.arena.entity(identity)?;
    let committed = state.arena.resolve(identity);
    let schema = schemas.schema_for(entity)?;

    let mut values = BTreeMap::new();
    for property in schema.properties().iter().filter(|p| p.is_value()) {
        let value = if let Some(pending) = state.journal.pending_value(identity, property.id) {
            pending.clone()
        } else if let Some(key) = committed {
            let stored = store.get_property(key, property.id)?;
            match property.kind {
                PropertyKind::Reference { .. } => match stored {
                    Value::Reference(target) => {
                        FieldValue::Reference(Some(state.intern(store, target)?))
                    }
                    Value::Null => FieldValue::Reference(None),
                    other => {
                        return Err(CoreError::invariant(format!(
                            "{} holds {other}, not a reference",
                            property.id
                        )))
                    }
                },
                _ => FieldValue::Scalar(stored),
            }
        } else {
            default_field(&property.kind)
        };
        values.insert(property.id, value);
    }

    Ok(Shadow {
        identity,
        entity,
        values,
    })
}

/// Value of a property on a freshly created object.
pub(crate) fn default_field(kind: &PropertyKind) -> FieldValue {
    match kind {
        PropertyKind::Scalar { default, .. } => FieldValue::Scalar(default.clone()),
        PropertyKind::Reference { .. } | PropertyKind::List { .. } => FieldValue::Reference(None),
    }
}
