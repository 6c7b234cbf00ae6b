//! Entry commands.

use super::ledger_file::{find_account, LedgerFile};
use ledgergraph_core::UncommittedObject;
use ledgergraph_model::{account, entry};
use ledgergraph_storage::Value;
use std::error::Error;
use std::path::Path;
use tracing::info;

fn book(
    owner: &UncommittedObject,
    amount: i64,
    memo: Option<&str>,
) -> Result<UncommittedObject, Box<dyn Error>> {
    let booked = owner.create_child(account::ENTRIES, entry::ENTRY)?;
    booked.set(entry::AMOUNT, Value::Integer(amount))?;
    if let Some(memo) = memo {
        booked.set(entry::MEMO, Value::text(memo))?;
    }
    let currency = owner.reference(account::CURRENCY)?;
    booked.set_reference(entry::COMMODITY_REF, currency.as_ref())?;
    Ok(booked)
}

fn entry_at(
    owner: &UncommittedObject,
    index: usize,
) -> Result<UncommittedObject, Box<dyn Error>> {
    let item = owner
        .list(account::ENTRIES)?
        .iter()?
        .nth(index)
        .ok_or_else(|| format!("Account has no entry at index {index}"))?;
    Ok(item?)
}

/// Books an entry of `amount` minor units against an account.
pub fn add(
    path: &Path,
    name: &str,
    amount: i64,
    memo: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    info!("Adding entry of {} to {:?}", amount, name);
    let ledger = LedgerFile::load(path)?;
    ledger.edit(|root| book(&find_account(root, name)?, amount, memo).map(drop))?;
    println!("Added entry of {amount} to {name:?}");
    Ok(())
}

/// Deletes the entry at `index`. The other leg of a transfer loses its
/// counterpart link.
pub fn delete(path: &Path, name: &str, index: usize) -> Result<(), Box<dyn Error>> {
    info!("Deleting entry {} of {:?}", index, name);
    let ledger = LedgerFile::load(path)?;
    ledger.edit(|root| {
        let doomed = entry_at(&find_account(root, name)?, index)?;
        if let Some(other) = doomed.reference(entry::COUNTERPART)? {
            other.set_reference(entry::COUNTERPART, None)?;
        }
        doomed.delete()?;
        Ok(())
    })?;
    println!("Deleted entry {index} of {name:?}");
    Ok(())
}

/// Moves the entry at `index` to the end of another account's entries.
pub fn relocate(path: &Path, name: &str, index: usize, to: &str) -> Result<(), Box<dyn Error>> {
    info!("Moving entry {} of {:?} to {:?}", index, name, to);
    let ledger = LedgerFile::load(path)?;
    let (moved, _) = ledger.edit(|root| {
        let item = entry_at(&find_account(root, name)?, index)?;
        Ok(find_account(root, to)?.list(account::ENTRIES)?.add(&item)?)
    })?;
    if moved {
        println!("Moved entry {index} of {name:?} to {to:?}");
    } else {
        println!("Entry already belongs to {to:?}");
    }
    Ok(())
}

/// Books a transfer as two entries that reference each other.
pub fn transfer(
    path: &Path,
    from: &str,
    to: &str,
    amount: i64,
    memo: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    info!("Transferring {} from {:?} to {:?}", amount, from, to);
    let ledger = LedgerFile::load(path)?;
    ledger.edit(|root| {
        let outgoing = book(&find_account(root, from)?, -amount, memo)?;
        let incoming = book(&find_account(root, to)?, amount, memo)?;
        // Both legs are new; the links are resolved at commit.
        outgoing.set_reference(entry::COUNTERPART, Some(&incoming))?;
        incoming.set_reference(entry::COUNTERPART, Some(&outgoing))?;
        Ok(())
    })?;
    println!("Transferred {amount} from {from:?} to {to:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::accounts::summarize;
    use crate::commands::init;
    use ledgergraph_model::session;
    use ledgergraph_storage::CommittedStore;

    fn ledger(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("ledger.json");
        let names = ["Checking".to_string(), "Savings".to_string()];
        init::run(&path, "home", &names, "USD", 2).unwrap();
        path
    }

    fn balances(path: &Path) -> Vec<i64> {
        summarize(&LedgerFile::load(path).unwrap())
            .unwrap()
            .iter()
            .map(|s| s.balance)
            .collect()
    }

    #[test]
    fn test_transfer_links_both_legs() {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger(&dir);
        transfer(&path, "Checking", "Savings", 400, Some("rainy day")).unwrap();
        assert_eq!(balances(&path), vec![-400, 400]);

        let ledger = LedgerFile::load(&path).unwrap();
        let accounts = ledger
            .store
            .list_members(ledger.root, session::ACCOUNTS)
            .unwrap();
        let outgoing = ledger
            .store
            .list_members(accounts[0], account::ENTRIES)
            .unwrap()[0];
        let incoming = ledger
            .store
            .list_members(accounts[1], account::ENTRIES)
            .unwrap()[0];
        assert_eq!(
            ledger.store.get_property(outgoing, entry::COUNTERPART).unwrap(),
            Value::Reference(incoming)
        );
        assert_eq!(
            ledger.store.get_property(incoming, entry::COUNTERPART).unwrap(),
            Value::Reference(outgoing)
        );
        assert_eq!(
            ledger.store.get_property(incoming, entry::MEMO).unwrap(),
            Value::text("rainy day")
        );
    }

    #[test]
    fn test_delete_transfer_leg_unlinks_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger(&dir);
        transfer(&path, "Checking", "Savings", 400, None).unwrap();
        delete(&path, "Savings", 0).unwrap();
        assert_eq!(balances(&path), vec![-400, 0]);

        let ledger = LedgerFile::load(&path).unwrap();
        let accounts = ledger
            .store
            .list_members(ledger.root, session::ACCOUNTS)
            .unwrap();
        let outgoing = ledger
            .store
            .list_members(accounts[0], account::ENTRIES)
            .unwrap()[0];
        assert_eq!(
            ledger.store.get_property(outgoing, entry::COUNTERPART).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_relocate_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger(&dir);
        add(&path, "Checking", 100, None).unwrap();
        add(&path, "Checking", 200, None).unwrap();
        relocate(&path, "Checking", 0, "Savings").unwrap();
        assert_eq!(balances(&path), vec![200, 100]);
        relocate(&path, "Savings", 0, "Savings").unwrap();
        assert_eq!(balances(&path), vec![200, 100]);
    }

    #[test]
    fn test_missing_entry_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger(&dir);
        assert!(delete(&path, "Checking", 3).is_err());
    }
}
