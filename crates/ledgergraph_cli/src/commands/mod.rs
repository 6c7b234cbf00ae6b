//! CLI command implementations.

pub mod accounts;
pub mod entries;
pub mod init;
pub mod ledger_file;
pub mod schema;
