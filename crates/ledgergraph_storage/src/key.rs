//! Committed object identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a committed object.
///
/// Object keys are:
/// - Assigned by the store when the object is first written
/// - Immutable for the lifetime of the object
/// - Never reused, even after the object is deleted
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(u64);

impl ObjectKey {
    /// Creates an object key from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw key value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the key that follows this one.
    #[must_use]
    pub(crate) const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({})", self.0)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{}", self.0)
    }
}

impl From<ObjectKey> for u64 {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_is_monotonic() {
        let k = ObjectKey::new(7);
        assert_eq!(k.next().as_u64(), 8);
        assert!(k < k.next());
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", ObjectKey::new(42)), "obj:42");
        assert_eq!(format!("{:?}", ObjectKey::new(42)), "ObjectKey(42)");
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&ObjectKey::new(3)).unwrap();
        assert_eq!(json, "3");
        let back: ObjectKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ObjectKey::new(3));
    }
}
