//! Serializable copies of a committed graph.

use crate::key::ObjectKey;
use crate::schema::{EntityTypeId, PropertyId};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A full copy of a committed graph, suitable for `serde` round trips.
///
/// Maps are stored as pair lists so the snapshot serializes to formats that
/// only allow string map keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Key the store will hand out next.
    pub next_key: ObjectKey,
    /// Root object, if any.
    pub root: Option<ObjectKey>,
    /// Every object in key order.
    pub objects: Vec<SnapshotObject>,
}

/// One object inside a [`StoreSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotObject {
    /// Object key.
    pub key: ObjectKey,
    /// Entity type.
    pub entity: EntityTypeId,
    /// Parent object and list property, `None` for the root.
    pub parent: Option<(ObjectKey, PropertyId)>,
    /// Scalar and reference values.
    pub values: Vec<(PropertyId, Value)>,
    /// List members in list order.
    pub lists: Vec<(PropertyId, Vec<ObjectKey>)>,
}

impl StoreSnapshot {
    /// Looks up an object by key.
    #[must_use]
    pub fn object(&self, key: ObjectKey) -> Option<&SnapshotObject> {
        self.objects.iter().find(|o| o.key == key)
    }
}
