//! Ledger snapshot files.
//!
//! A ledger lives in one JSON file holding a [`StoreSnapshot`]. Commands
//! load it into an [`InMemoryStore`], edit it through one transaction
//! manager, and write it back only if the commit succeeded.

use ledgergraph_core::{CommitReport, TransactionManager, UncommittedObject};
use ledgergraph_model::{account, session};
use ledgergraph_storage::{
    InMemoryStore, ObjectKey, PropertyId, SchemaRegistry, StoreSnapshot, Value,
};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// A ledger loaded from disk.
pub struct LedgerFile {
    path: PathBuf,
    /// The committed store.
    pub store: Arc<InMemoryStore>,
    /// The finance schema.
    pub schemas: Arc<SchemaRegistry>,
    /// The session root.
    pub root: ObjectKey,
}

impl LedgerFile {
    /// Wraps a freshly built store that has not been written yet.
    pub fn new(
        path: &Path,
        store: Arc<InMemoryStore>,
        schemas: Arc<SchemaRegistry>,
        root: ObjectKey,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            store,
            schemas,
            root,
        }
    }

    /// Loads the ledger at `path`.
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        if !path.exists() {
            return Err(format!("No ledger found at {:?}", path).into());
        }
        let bytes = std::fs::read(path)?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)?;
        let root = snapshot.root.ok_or("Ledger has no session root")?;
        let schemas = ledgergraph_model::registry()?;
        let store = InMemoryStore::from_snapshot(Arc::clone(&schemas), snapshot)?;
        debug!(path = ?path, objects = store.object_count(), "loaded ledger");
        Ok(Self::new(path, Arc::new(store), schemas, root))
    }

    /// Writes the committed store back to disk.
    pub fn save(&self) -> Result<(), Box<dyn Error>> {
        let json = serde_json::to_vec_pretty(&self.store.snapshot())?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = ?self.path, "saved ledger");
        Ok(())
    }

    /// Opens an edit session.
    pub fn open(&self) -> Result<TransactionManager, Box<dyn Error>> {
        Ok(TransactionManager::open(
            Arc::clone(&self.store),
            Arc::clone(&self.schemas),
            self.root,
        )?)
    }

    /// Runs `edit` against a fresh session rooted at the session object,
    /// commits and saves. Nothing is written if `edit` or the commit fails.
    pub fn edit<F, T>(&self, edit: F) -> Result<(T, CommitReport), Box<dyn Error>>
    where
        F: FnOnce(&UncommittedObject) -> Result<T, Box<dyn Error>>,
    {
        let manager = self.open()?;
        let value = edit(&manager.root()?)?;
        let report = manager.commit()?;
        self.save()?;
        info!(
            created = report.created,
            updated = report.updated,
            moved = report.moved,
            deleted = report.deleted,
            "ledger updated"
        );
        Ok((value, report))
    }
}

/// Finds an account by name anywhere under the session, depth-first.
pub fn find_account(
    root: &UncommittedObject,
    name: &str,
) -> Result<UncommittedObject, Box<dyn Error>> {
    let mut pending = vec![root.list(session::ACCOUNTS)?];
    while let Some(list) = pending.pop() {
        for account in list.iter()? {
            let account = account?;
            if account.get(account::NAME)?.as_text() == Some(name) {
                return Ok(account);
            }
            pending.push(account.list(account::SUBACCOUNTS)?);
        }
    }
    Err(format!("No account named {name:?}").into())
}

/// Reads a text property, treating `Null` as empty.
pub fn text_of(object: &UncommittedObject, property: PropertyId) -> Result<String, Box<dyn Error>> {
    Ok(match object.get(property)? {
        Value::Text(text) => text,
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init;
    use ledgergraph_storage::CommittedStore;

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LedgerFile::load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_failed_edit_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        init::run(&path, "home", &["Cash".to_string()], "USD", 2).unwrap();
        let before = std::fs::read(&path).unwrap();

        let ledger = LedgerFile::load(&path).unwrap();
        let result = ledger.edit(|root| {
            find_account(root, "Cash")?.set(account::NAME, Value::text("Wallet"))?;
            Err::<(), _>("stop".into())
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_find_nested_account() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        init::run(&path, "home", &["Assets".to_string()], "USD", 2).unwrap();

        let ledger = LedgerFile::load(&path).unwrap();
        ledger
            .edit(|root| {
                let assets = find_account(root, "Assets")?;
                let bank = assets.create_child(account::SUBACCOUNTS, account::ACCOUNT)?;
                bank.set(account::NAME, Value::text("Bank"))?;
                Ok(())
            })
            .unwrap();

        let ledger = LedgerFile::load(&path).unwrap();
        let manager = ledger.open().unwrap();
        let bank = find_account(&manager.root().unwrap(), "Bank").unwrap();
        let key = bank.committed_key().unwrap();
        assert!(ledger.store.contains(key));
    }
}
