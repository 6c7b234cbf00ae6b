//! # LedgerGraph Testkit
//!
//! Test utilities for LedgerGraph.
//!
//! This crate provides:
//! - Ledger fixtures seeded into an in-memory store
//! - Property-based edit generators using proptest
//! - A model harness that checks isolation and convergence of random edit
//!   sessions
//!
//! ## Usage
//!
//! ```rust
//! use ledgergraph_testkit::prelude::*;
//!
//! with_ledger(&[("Checking", &[100, 200])], |ledger| {
//!     let manager = ledger.open();
//!     let entries = ledger.entries(&manager, 0);
//!     assert_eq!(entry_amounts(&entries), vec![100, 200]);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
