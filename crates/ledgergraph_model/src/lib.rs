//! # LedgerGraph Model
//!
//! The personal-finance entity schema.
//!
//! ```text
//! Session
//!  ├── commodities: [Commodity]
//!  └── accounts:    [Account]
//!                    ├── currency -> Commodity
//!                    ├── entries:     [Entry]
//!                    │                 ├── commodity   -> Commodity
//!                    │                 └── counterpart -> Entry
//!                    └── subaccounts: [Account]
//! ```
//!
//! Every property is a [`PropertyId`](ledgergraph_storage::PropertyId)
//! constant declared in the module of its entity type, so code that edits
//! the graph names properties statically:
//!
//! ```rust
//! use ledgergraph_model::entry;
//!
//! assert_eq!(entry::AMOUNT.entity(), entry::ENTRY);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod account;
pub mod commodity;
pub mod entry;
pub mod session;

mod amount;

pub use amount::format_amount;

use ledgergraph_storage::{SchemaRegistry, StorageResult};
use std::sync::Arc;

/// Builds the registry holding every finance entity type.
///
/// # Errors
///
/// Only fails if the declarations in this crate are inconsistent.
pub fn registry() -> StorageResult<Arc<SchemaRegistry>> {
    SchemaRegistry::builder()
        .entity(session::schema())
        .entity(account::schema())
        .entity(entry::schema())
        .entity(commodity::schema())
        .build()
        .map(Arc::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_consistent() {
        let registry = registry().unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.schema_for(entry::ENTRY).unwrap().name(), "Entry");
    }

    #[test]
    fn entry_lists_and_references() {
        let registry = registry().unwrap();
        let account = registry.schema_for(account::ACCOUNT).unwrap();
        let lists: Vec<_> = account.lists().map(|p| p.name).collect();
        assert_eq!(lists, vec!["entries", "subaccounts"]);

        let entry = registry.schema_for(entry::ENTRY).unwrap();
        let refs: Vec<_> = entry.references().map(|p| p.name).collect();
        assert_eq!(refs, vec!["commodity", "counterpart"]);
    }
}
