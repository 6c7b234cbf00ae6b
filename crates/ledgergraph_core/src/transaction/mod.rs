//! Object-graph transactions.
//!
//! A [`TransactionManager`] shadows the committed store:
//! - **Isolation**: edits live in the manager until commit; store readers
//!   never see them
//! - **Atomicity**: commit replays every edit inside one store bracket and
//!   rolls the bracket back on failure
//! - **Forward references**: new objects may reference each other before
//!   any of them exists; references are resolved during the commit walk

mod commit;
mod list;
mod manager;
mod materialize;
mod object;
mod state;


pub use commit::CommitReport;
pub use list::{ListIter, ListView};
pub use manager::TransactionManager;
pub use object::UncommittedObject;
