//! Init command implementation.

use super::ledger_file::LedgerFile;
use ledgergraph_model::{account, commodity, session};
use ledgergraph_storage::{CommittedStore, InMemoryStore, Value};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Creates a new ledger file with a session root, one commodity and the
/// given top-level accounts.
pub fn run(
    path: &Path,
    session_name: &str,
    accounts: &[String],
    symbol: &str,
    decimals: u32,
) -> Result<(), Box<dyn Error>> {
    if path.exists() {
        return Err(format!("Ledger already exists at {:?}", path).into());
    }
    info!("Creating ledger at {:?}", path);

    let schemas = ledgergraph_model::registry()?;
    let store = Arc::new(InMemoryStore::new(Arc::clone(&schemas)));
    store.start_transaction()?;
    let root = store.create_root(session::SESSION)?;
    store.commit_transaction()?;

    let ledger = LedgerFile::new(path, store, schemas, root);
    ledger.edit(|root| {
        root.set(session::NAME, Value::text(session_name))?;
        let currency = root.create_child(session::COMMODITIES, commodity::COMMODITY)?;
        currency.set(commodity::SYMBOL, Value::text(symbol))?;
        currency.set(commodity::DECIMALS, Value::Integer(i64::from(decimals)))?;
        for name in accounts {
            let created = root.create_child(session::ACCOUNTS, account::ACCOUNT)?;
            created.set(account::NAME, Value::text(name.as_str()))?;
            // Resolved at commit; the commodity has no key yet.
            created.set_reference(account::CURRENCY, Some(&currency))?;
        }
        Ok(())
    })?;

    println!("Created ledger {:?} with {} account(s)", path, accounts.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        run(&path, "home", &["Cash".to_string(), "Card".to_string()], "EUR", 2).unwrap();

        let ledger = LedgerFile::load(&path).unwrap();
        let accounts = ledger
            .store
            .list_members(ledger.root, session::ACCOUNTS)
            .unwrap();
        assert_eq!(accounts.len(), 2);
        let currency = ledger
            .store
            .get_property(accounts[0], account::CURRENCY)
            .unwrap()
            .as_reference()
            .unwrap();
        assert_eq!(
            ledger.store.get_property(currency, commodity::SYMBOL).unwrap(),
            Value::text("EUR")
        );
    }

    #[test]
    fn test_init_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        run(&path, "home", &[], "USD", 2).unwrap();
        assert!(run(&path, "home", &[], "USD", 2).is_err());
    }
}
