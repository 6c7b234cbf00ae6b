//! Ledger fixtures.
//!
//! Seeds an in-memory committed store with a session, a USD commodity and
//! a handful of accounts, then opens edit sessions over it.

use ledgergraph_core::{ListView, TransactionConfig, TransactionManager};
use ledgergraph_model::{account, commodity, entry, session};
use ledgergraph_storage::{CommittedStore, InMemoryStore, ObjectKey, SchemaRegistry, Value};
use std::sync::Arc;
use tempfile::TempDir;

/// A committed ledger with known keys.
pub struct TestLedger {
    /// The committed store.
    pub store: Arc<InMemoryStore>,
    /// The finance schema.
    pub schemas: Arc<SchemaRegistry>,
    /// The session root.
    pub root: ObjectKey,
    /// The USD commodity every account is denominated in.
    pub usd: ObjectKey,
    /// Seeded accounts in creation order. They start at the top level;
    /// [`nest`](Self::nest) may move them under each other.
    pub accounts: Vec<ObjectKey>,
}

impl TestLedger {
    /// Creates a ledger with no accounts.
    pub fn empty() -> Self {
        Self::with_accounts(&[])
    }

    /// Creates a ledger with one top-level account per `(name, amounts)`
    /// pair, each holding one entry per amount.
    pub fn with_accounts(accounts: &[(&str, &[i64])]) -> Self {
        let schemas = ledgergraph_model::registry().expect("Failed to build schema");
        let store = Arc::new(InMemoryStore::new(Arc::clone(&schemas)));
        store
            .start_transaction()
            .expect("Failed to start transaction");
        let root = store
            .create_root(session::SESSION)
            .expect("Failed to create root");
        store
            .set_property(root, session::NAME, Value::text("test ledger"))
            .expect("Failed to name session");
        let usd = store
            .create_child(root, session::COMMODITIES, commodity::COMMODITY)
            .expect("Failed to create commodity");
        store
            .set_property(usd, commodity::SYMBOL, Value::text("USD"))
            .expect("Failed to set symbol");

        let mut keys = Vec::with_capacity(accounts.len());
        for (name, amounts) in accounts {
            let key = store
                .create_child(root, session::ACCOUNTS, account::ACCOUNT)
                .expect("Failed to create account");
            store
                .set_property(key, account::NAME, Value::text(*name))
                .expect("Failed to name account");
            store
                .set_property(key, account::CURRENCY, Value::Reference(usd))
                .expect("Failed to set currency");
            for amount in *amounts {
                seed_entry(&store, key, usd, *amount);
            }
            keys.push(key);
        }
        store
            .commit_transaction()
            .expect("Failed to commit seed data");

        Self {
            store,
            schemas,
            root,
            usd,
            accounts: keys,
        }
    }

    /// Commits account `child` as the last subaccount of account `parent`.
    pub fn nest(&self, child: usize, parent: usize) {
        self.store
            .start_transaction()
            .expect("Failed to start transaction");
        self.store
            .move_child(
                self.accounts[child],
                self.accounts[parent],
                account::SUBACCOUNTS,
            )
            .expect("Failed to nest account");
        self.store
            .commit_transaction()
            .expect("Failed to commit nesting");
    }

    /// Returns the committed members of the top-level account list, or of
    /// the subaccounts of `parent`.
    pub fn stored_accounts(&self, parent: Option<ObjectKey>) -> Vec<ObjectKey> {
        match parent {
            Some(owner) => self.store.list_members(owner, account::SUBACCOUNTS),
            None => self.store.list_members(self.root, session::ACCOUNTS),
        }
        .expect("Failed to list accounts")
    }

    /// Opens an edit session with the default config.
    pub fn open(&self) -> TransactionManager {
        self.open_with(TransactionConfig::default())
    }

    /// Opens an edit session with `config`.
    pub fn open_with(&self, config: TransactionConfig) -> TransactionManager {
        TransactionManager::open_with_config(
            Arc::clone(&self.store),
            Arc::clone(&self.schemas),
            self.root,
            config,
        )
        .expect("Failed to open transaction manager")
    }

    /// Returns the uncommitted entry list of the account at `index`.
    pub fn entries(&self, manager: &TransactionManager, index: usize) -> ListView {
        manager
            .materialize(self.accounts[index])
            .expect("Failed to materialize account")
            .list(account::ENTRIES)
            .expect("Failed to open entry list")
    }

    /// Returns the committed entry amounts of `owner` in list order.
    pub fn stored_amounts(&self, owner: ObjectKey) -> Vec<i64> {
        self.store
            .list_members(owner, account::ENTRIES)
            .expect("Failed to list entries")
            .into_iter()
            .map(|key| {
                self.store
                    .get_property(key, entry::AMOUNT)
                    .expect("Failed to read amount")
                    .as_integer()
                    .expect("Amount is not an integer")
            })
            .collect()
    }

    /// Returns the committed name of `owner`.
    pub fn stored_name(&self, owner: ObjectKey) -> String {
        self.store
            .get_property(owner, account::NAME)
            .expect("Failed to read name")
            .as_text()
            .unwrap_or_default()
            .to_string()
    }

    /// Writes the store to a JSON file in a temporary directory and loads
    /// it back into a fresh store. Keys survive the trip.
    pub fn reload_from_disk(&self) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("ledger.json");
        let json =
            serde_json::to_vec_pretty(&self.store.snapshot()).expect("Failed to encode snapshot");
        std::fs::write(&path, json).expect("Failed to write snapshot");

        let bytes = std::fs::read(&path).expect("Failed to read snapshot");
        let snapshot = serde_json::from_slice(&bytes).expect("Failed to decode snapshot");
        let store = InMemoryStore::from_snapshot(Arc::clone(&self.schemas), snapshot)
            .expect("Failed to load snapshot");

        Self {
            store: Arc::new(store),
            schemas: Arc::clone(&self.schemas),
            root: self.root,
            usd: self.usd,
            accounts: self.accounts.clone(),
        }
    }
}

fn seed_entry(store: &InMemoryStore, owner: ObjectKey, usd: ObjectKey, amount: i64) -> ObjectKey {
    let key = store
        .create_child(owner, account::ENTRIES, entry::ENTRY)
        .expect("Failed to create entry");
    store
        .set_property(key, entry::AMOUNT, Value::Integer(amount))
        .expect("Failed to set amount");
    store
        .set_property(key, entry::COMMODITY_REF, Value::Reference(usd))
        .expect("Failed to set commodity");
    key
}

/// Collects the amounts of an uncommitted entry list in view order.
pub fn entry_amounts(list: &ListView) -> Vec<i64> {
    list.iter()
        .expect("Failed to iterate list")
        .map(|object| {
            object
                .expect("Failed to materialize entry")
                .get(entry::AMOUNT)
                .expect("Failed to read amount")
                .as_integer()
                .expect("Amount is not an integer")
        })
        .collect()
}

/// Runs a test against a freshly seeded ledger.
///
/// # Example
///
/// ```rust
/// use ledgergraph_testkit::with_ledger;
///
/// with_ledger(&[("Cash", &[5])], |ledger| {
///     assert_eq!(ledger.stored_amounts(ledger.accounts[0]), vec![5]);
/// });
/// ```
pub fn with_ledger<F, R>(accounts: &[(&str, &[i64])], f: F) -> R
where
    F: FnOnce(&TestLedger) -> R,
{
    let ledger = TestLedger::with_accounts(accounts);
    f(&ledger)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Checking with entries 100, 200, 300 and an empty Savings account.
    pub fn household() -> TestLedger {
        TestLedger::with_accounts(&[("Checking", &[100, 200, 300]), ("Savings", &[])])
    }

    /// Adds a committed transfer of `amount` from account `from` to account
    /// `to`: two entries whose counterparts reference each other. Returns
    /// the `(outgoing, incoming)` keys.
    pub fn transfer(
        ledger: &TestLedger,
        from: usize,
        to: usize,
        amount: i64,
    ) -> (ObjectKey, ObjectKey) {
        let store = &ledger.store;
        store
            .start_transaction()
            .expect("Failed to start transaction");
        let outgoing = seed_entry(store, ledger.accounts[from], ledger.usd, -amount);
        let incoming = seed_entry(store, ledger.accounts[to], ledger.usd, amount);
        store
            .set_property(outgoing, entry::COUNTERPART, Value::Reference(incoming))
            .expect("Failed to link transfer");
        store
            .set_property(incoming, entry::COUNTERPART, Value::Reference(outgoing))
            .expect("Failed to link transfer");
        store
            .commit_transaction()
            .expect("Failed to commit transfer");
        (outgoing, incoming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ledger() {
        let ledger = TestLedger::empty();
        assert!(ledger.accounts.is_empty());
        assert_eq!(
            ledger
                .store
                .list_members(ledger.root, session::COMMODITIES)
                .unwrap(),
            vec![ledger.usd]
        );
    }

    #[test]
    fn test_with_ledger() {
        with_ledger(&[("Cash", &[1, 2]), ("Card", &[-3])], |ledger| {
            assert_eq!(ledger.stored_amounts(ledger.accounts[0]), vec![1, 2]);
            assert_eq!(ledger.stored_amounts(ledger.accounts[1]), vec![-3]);
            assert_eq!(ledger.stored_name(ledger.accounts[1]), "Card");
        });
    }

    #[test]
    fn test_entries_view_matches_store() {
        let ledger = scenarios::household();
        let manager = ledger.open();
        assert_eq!(
            entry_amounts(&ledger.entries(&manager, 0)),
            vec![100, 200, 300]
        );
        assert!(entry_amounts(&ledger.entries(&manager, 1)).is_empty());
    }

    #[test]
    fn test_transfer_scenario_links_entries() {
        let ledger = scenarios::household();
        let (outgoing, incoming) = scenarios::transfer(&ledger, 0, 1, 50);
        assert_eq!(
            ledger.store.get_property(outgoing, entry::COUNTERPART).unwrap(),
            Value::Reference(incoming)
        );
        assert_eq!(ledger.stored_amounts(ledger.accounts[1]), vec![50]);
    }

    #[test]
    fn test_nest_moves_account_under_parent() {
        let ledger = TestLedger::with_accounts(&[("Assets", &[]), ("Bank", &[5]), ("Cash", &[])]);
        ledger.nest(1, 0);
        ledger.nest(2, 1);
        assert_eq!(ledger.stored_accounts(None), vec![ledger.accounts[0]]);
        assert_eq!(
            ledger.stored_accounts(Some(ledger.accounts[0])),
            vec![ledger.accounts[1]]
        );
        assert_eq!(
            ledger.stored_accounts(Some(ledger.accounts[1])),
            vec![ledger.accounts[2]]
        );
        assert_eq!(ledger.stored_amounts(ledger.accounts[1]), vec![5]);
    }

    #[test]
    fn test_reload_from_disk_keeps_keys() {
        let ledger = scenarios::household();
        let reloaded = ledger.reload_from_disk();
        assert_eq!(reloaded.store.snapshot(), ledger.store.snapshot());
        assert_eq!(
            reloaded.stored_amounts(reloaded.accounts[0]),
            vec![100, 200, 300]
        );
    }
}
