//! # LedgerGraph Storage
//!
//! The committed object graph that LedgerGraph transactions are applied to.
//!
//! This crate provides the lowest layer of LedgerGraph: a store of entities
//! ("committed objects") addressed by stable [`ObjectKey`]s, organised as a
//! tree of parent/child list memberships, with scalar and reference
//! properties described by a [`SchemaRegistry`].
//!
//! ## Design Principles
//!
//! - The store knows nothing about uncommitted edits; it only ever sees
//!   finished writes inside a `start_transaction`/`commit_transaction`
//!   bracket
//! - Writes outside a bracket are rejected
//! - A rolled back bracket leaves the committed graph untouched
//! - Stores must be `Send + Sync` so several edit sessions can share one
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - staged copy-on-bracket graph, snapshot capable
//!
//! ## Example
//!
//! ```rust
//! use ledgergraph_storage::{
//!     CommittedStore, EntitySchema, EntityTypeId, InMemoryStore, PropertyId, SchemaRegistry,
//!     Value, ValueType,
//! };
//! use std::sync::Arc;
//!
//! const FOLDER: EntityTypeId = EntityTypeId::new(1);
//! const FOLDER_NAME: PropertyId = PropertyId::new(FOLDER, 0);
//!
//! let schemas = SchemaRegistry::builder()
//!     .entity(EntitySchema::new(FOLDER, "Folder").scalar(FOLDER_NAME, "name", ValueType::Text))
//!     .build()
//!     .unwrap();
//! let store = InMemoryStore::new(Arc::new(schemas));
//!
//! store.start_transaction().unwrap();
//! let root = store.create_root(FOLDER).unwrap();
//! store.set_property(root, FOLDER_NAME, Value::text("home")).unwrap();
//! store.commit_transaction().unwrap();
//!
//! assert_eq!(store.get_property(root, FOLDER_NAME).unwrap(), Value::text("home"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod key;
mod memory;
mod schema;
mod snapshot;
mod store;
mod value;

pub use error::{StorageError, StorageResult};
pub use key::ObjectKey;
pub use memory::InMemoryStore;
pub use schema::{
    EntitySchema, EntityTypeId, PropertyDescriptor, PropertyId, PropertyKind, SchemaRegistry,
    SchemaRegistryBuilder,
};
pub use snapshot::{SnapshotObject, StoreSnapshot};
pub use store::CommittedStore;
pub use value::{Value, ValueType};
