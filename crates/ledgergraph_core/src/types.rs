//! Core type definitions for the transaction layer.

use std::fmt;
use uuid::Uuid;

/// Identity of an object inside one transaction manager.
///
/// Every object the manager has seen gets exactly one identity key: committed
/// objects are interned on first sight, new objects get a fresh key when
/// they are created. The key is an index into the manager's identity arena;
/// it resolves to a committed [`ObjectKey`](ledgergraph_storage::ObjectKey)
/// once the object exists in the store.
///
/// Keys are only meaningful to the manager that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityKey(u32);

impl IdentityKey {
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw arena index.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id:{}", self.0)
    }
}

/// Unique identifier of one transaction manager (one edit session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Converts to a UUID.
    #[must_use]
    pub fn to_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a transaction manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerPhase {
    /// Accepting reads and edits.
    Open,
    /// Replaying edits onto the store.
    Committing,
    /// Committed; the manager must be discarded.
    Closed,
    /// A commit failed; the store was rolled back and the manager must be
    /// discarded.
    Failed,
}

impl fmt::Display for ManagerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ManagerPhase::Open => "open",
            ManagerPhase::Committing => "committing",
            ManagerPhase::Closed => "closed",
            ManagerPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The ordered steps of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommitPhase {
    /// Opening the store bracket.
    Begin,
    /// Writing new objects.
    Create,
    /// Applying property changes, deferred references and moves.
    Update,
    /// Nulling references between objects that are about to be deleted.
    DeletePrepare,
    /// Removing deleted objects.
    Delete,
    /// Closing the store bracket.
    Finalize,
}

impl fmt::Display for CommitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommitPhase::Begin => "begin",
            CommitPhase::Create => "create",
            CommitPhase::Update => "update",
            CommitPhase::DeletePrepare => "delete-prepare",
            CommitPhase::Delete => "delete",
            CommitPhase::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_key_ordering() {
        assert!(IdentityKey::new(1) < IdentityKey::new(2));
        assert_eq!(IdentityKey::new(3).index(), 3);
    }

    #[test]
    fn identity_key_display() {
        assert_eq!(format!("{}", IdentityKey::new(42)), "id:42");
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn phases_are_ordered() {
        assert!(CommitPhase::Create < CommitPhase::Update);
        assert!(CommitPhase::DeletePrepare < CommitPhase::Delete);
        assert_eq!(CommitPhase::DeletePrepare.to_string(), "delete-prepare");
    }
}
