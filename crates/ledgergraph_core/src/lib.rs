//! # LedgerGraph Core
//!
//! Transaction isolation for the LedgerGraph object graph.
//!
//! This crate provides:
//! - Identity arena mapping uncommitted objects to committed keys
//! - Property change journal and list deltas
//! - Copy-in-transaction materialization of committed objects
//! - Transaction manager with a phased, all-or-nothing commit
//! - Change listeners for uncommitted and committed edits
//!
//! ## Example
//!
//! ```rust
//! use ledgergraph_core::TransactionManager;
//! use ledgergraph_model::{account, entry, session};
//! use ledgergraph_storage::{CommittedStore, InMemoryStore, Value};
//! use std::sync::Arc;
//!
//! let schemas = ledgergraph_model::registry().unwrap();
//! let store = Arc::new(InMemoryStore::new(schemas.clone()));
//! store.start_transaction().unwrap();
//! let root = store.create_root(session::SESSION).unwrap();
//! store.commit_transaction().unwrap();
//!
//! let manager = TransactionManager::open(store.clone(), schemas, root).unwrap();
//! let checking = manager
//!     .root()
//!     .unwrap()
//!     .create_child(session::ACCOUNTS, account::ACCOUNT)
//!     .unwrap();
//! let deposit = checking.create_child(account::ENTRIES, entry::ENTRY).unwrap();
//! deposit.set(entry::AMOUNT, Value::Integer(500)).unwrap();
//!
//! // Nothing is visible until commit.
//! assert!(store.list_members(root, session::ACCOUNTS).unwrap().is_empty());
//!
//! manager.commit().unwrap();
//! let key = deposit.committed_key().unwrap();
//! assert_eq!(store.get_property(key, entry::AMOUNT).unwrap(), Value::Integer(500));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod config;
mod delta;
mod error;
mod identity;
mod journal;
mod transaction;
mod types;

pub use change_feed::{
    ChangeEvent, ChangeKind, ChangeListener, ChangeStage, EventLog, ListenerId, ObjectRef,
};
pub use config::TransactionConfig;
pub use delta::{ListDelta, ListMember, Membership, MergingIterator};
pub use error::{CoreError, CoreResult};
pub use identity::{IdentityArena, Placement};
pub use journal::{ChangeJournal, FieldValue, JournalEntry};
pub use transaction::{CommitReport, ListIter, ListView, TransactionManager, UncommittedObject};
pub use types::{CommitPhase, IdentityKey, ManagerPhase, SessionId};
