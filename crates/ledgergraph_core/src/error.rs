//! Error types for the transaction layer.

use crate::types::{CommitPhase, IdentityKey};
use ledgergraph_storage::{EntityTypeId, PropertyId, StorageError};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while editing or committing a transaction.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Committed store error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A programming error: double binding an identity, editing a deleted
    /// object, using a manager after it closed.
    #[error("invariant violation: {message}")]
    InvariantViolation {
        /// Description of the broken invariant.
        message: String,
    },

    /// The object was already marked for deletion.
    #[error("object {identity} is already deleted")]
    AlreadyDeleted {
        /// The deleted object.
        identity: IdentityKey,
    },

    /// The operation is intentionally not supported.
    #[error("unsupported operation: {operation}")]
    UnsupportedOperation {
        /// Name of the operation.
        operation: &'static str,
    },

    /// An object of the wrong entity type was offered to a reference or list.
    #[error("{property} expects {expected}, got {actual}")]
    WrongEntityType {
        /// The reference or list property.
        property: PropertyId,
        /// The declared entity type.
        expected: EntityTypeId,
        /// The entity type of the offered object.
        actual: EntityTypeId,
    },

    /// A reference points at a new object that was deleted before commit.
    #[error("reference to {identity}, which was deleted before it was committed")]
    DanglingReference {
        /// The unresolvable target.
        identity: IdentityKey,
    },

    /// A commit phase failed; the committed store was rolled back.
    #[error("commit failed during {phase} phase: {source}")]
    Commit {
        /// The phase that failed.
        phase: CommitPhase,
        /// The underlying failure.
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Creates an invariant violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(operation: &'static str) -> Self {
        Self::UnsupportedOperation { operation }
    }

    /// Wraps an error raised during a commit phase.
    pub fn commit(phase: CommitPhase, source: CoreError) -> Self {
        Self::Commit {
            phase,
            source: Box::new(source),
        }
    }

    /// Returns the failed phase for commit errors.
    #[must_use]
    pub fn commit_phase(&self) -> Option<CommitPhase> {
        match self {
            Self::Commit { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Returns the innermost error, looking through commit wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &CoreError {
        match self {
            Self::Commit { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgergraph_storage::ObjectKey;

    #[test]
    fn commit_error_reports_phase() {
        let inner = CoreError::Storage(StorageError::UnknownObject {
            key: ObjectKey::new(4),
        });
        let err = CoreError::commit(CommitPhase::Update, inner);
        assert_eq!(err.commit_phase(), Some(CommitPhase::Update));
        assert!(matches!(err.root_cause(), CoreError::Storage(_)));
        assert_eq!(
            err.to_string(),
            "commit failed during update phase: storage error: unknown object obj:4"
        );
    }

    #[test]
    fn helpers() {
        assert!(matches!(
            CoreError::unsupported("retain_all"),
            CoreError::UnsupportedOperation {
                operation: "retain_all"
            }
        ));
        assert_eq!(
            CoreError::invariant("bad").to_string(),
            "invariant violation: bad"
        );
        assert_eq!(CoreError::invariant("x").commit_phase(), None);
    }
}
