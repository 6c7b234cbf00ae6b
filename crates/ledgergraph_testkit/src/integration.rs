//! Cross-crate integration test helpers.
//!
//! [`ModelHarness`] drives an edit session with [`EditOperation`]s while
//! keeping a plain model of what the uncommitted view should show, entries
//! and the account tree alike. It then checks that the view matches the
//! model and that the committed store is untouched until commit. After
//! commit it checks that the store matches the model.

use crate::fixtures::{entry_amounts, TestLedger};
use crate::generators::EditOperation;
use ledgergraph_core::{
    CommitReport, CoreError, ListView, TransactionConfig, TransactionManager, UncommittedObject,
};
use ledgergraph_model::{account, entry, session};
use ledgergraph_storage::{CommittedStore, ObjectKey, StoreSnapshot, Value};

struct ModelEntry {
    amount: i64,
    handle: UncommittedObject,
    /// Account the entry was committed under, `None` for new entries.
    origin: Option<usize>,
    location: usize,
    committed_key: Option<ObjectKey>,
    deleted: bool,
}

struct ModelAccount {
    name: String,
    /// Committed entries in committed order, wherever they are now.
    committed: Vec<usize>,
    /// Entries added to this list in this session, in insertion order.
    added: Vec<usize>,
    /// Committed parent account, `None` at the top level.
    origin: Option<usize>,
    /// Current parent account.
    parent: Option<usize>,
    /// Accounts moved under this one in this session, in insertion order.
    children: Vec<usize>,
}

/// A test harness pairing an edit session with its expected view.
pub struct ModelHarness {
    /// The seeded ledger.
    pub ledger: TestLedger,
    /// The edit session under test.
    pub manager: TransactionManager,
    accounts: Vec<ModelAccount>,
    entries: Vec<ModelEntry>,
    /// Nested accounts moved to the top level in this session.
    lifted: Vec<usize>,
    baseline: StoreSnapshot,
    applied: usize,
}

impl ModelHarness {
    /// Seeds a ledger from `shape` and opens an edit session over it.
    pub fn new(shape: &[(String, Vec<i64>)]) -> Self {
        Self::with_config(shape, TransactionConfig::default())
    }

    /// Like [`new`](Self::new) with an explicit session config.
    pub fn with_config(shape: &[(String, Vec<i64>)], config: TransactionConfig) -> Self {
        Self::with_hierarchy(shape, &[], config)
    }

    /// Seeds a ledger from `shape`, commits account `i` under account
    /// `parents[i]` and opens an edit session over it. A parent position is
    /// reduced modulo `i`, so accounts only nest under earlier ones; the
    /// first account and accounts past the end of `parents` stay at the
    /// top level.
    pub fn with_hierarchy(
        shape: &[(String, Vec<i64>)],
        parents: &[Option<usize>],
        config: TransactionConfig,
    ) -> Self {
        let seed: Vec<(&str, &[i64])> = shape
            .iter()
            .map(|(name, amounts)| (name.as_str(), amounts.as_slice()))
            .collect();
        let ledger = TestLedger::with_accounts(&seed);
        let origins: Vec<Option<usize>> = (0..shape.len())
            .map(|index| match parents.get(index).copied().flatten() {
                Some(parent) if index > 0 => Some(parent % index),
                _ => None,
            })
            .collect();
        for (index, origin) in origins.iter().enumerate() {
            if let Some(parent) = origin {
                ledger.nest(index, *parent);
            }
        }
        let manager = ledger.open_with(config);
        let baseline = ledger.store.snapshot();

        let mut accounts = Vec::with_capacity(shape.len());
        let mut entries = Vec::new();
        for (index, (name, amounts)) in shape.iter().enumerate() {
            let keys = ledger
                .store
                .list_members(ledger.accounts[index], account::ENTRIES)
                .expect("Failed to list entries");
            let mut committed = Vec::with_capacity(keys.len());
            for (key, amount) in keys.into_iter().zip(amounts) {
                committed.push(entries.len());
                entries.push(ModelEntry {
                    amount: *amount,
                    handle: manager.materialize(key).expect("Failed to materialize"),
                    origin: Some(index),
                    location: index,
                    committed_key: Some(key),
                    deleted: false,
                });
            }
            accounts.push(ModelAccount {
                name: name.clone(),
                committed,
                added: Vec::new(),
                origin: origins[index],
                parent: origins[index],
                children: Vec::new(),
            });
        }

        Self {
            ledger,
            manager,
            accounts,
            entries,
            lifted: Vec::new(),
            baseline,
            applied: 0,
        }
    }

    /// Returns how many operations changed the session.
    pub fn applied_count(&self) -> usize {
        self.applied
    }

    /// Entry ids visible in account `index`, in view order.
    fn view(&self, index: usize) -> Vec<usize> {
        let account = &self.accounts[index];
        account
            .committed
            .iter()
            .chain(&account.added)
            .copied()
            .filter(|&id| {
                let entry = &self.entries[id];
                !entry.deleted && entry.location == index
            })
            .collect()
    }

    /// Expected entry amounts of account `index`, in view order.
    pub fn expected_amounts(&self, index: usize) -> Vec<i64> {
        self.view(index)
            .into_iter()
            .map(|id| self.entries[id].amount)
            .collect()
    }

    /// Account ids visible at the top level or under `parent`, in view
    /// order. Committed members come in seed order since nesting appends.
    fn account_view(&self, parent: Option<usize>) -> Vec<usize> {
        let added = match parent {
            Some(owner) => &self.accounts[owner].children,
            None => &self.lifted,
        };
        (0..self.accounts.len())
            .filter(|&id| self.accounts[id].origin == parent)
            .chain(added.iter().copied())
            .filter(|&id| self.accounts[id].parent == parent)
            .collect()
    }

    /// Expected account keys at the top level or under `parent`.
    pub fn expected_accounts(&self, parent: Option<usize>) -> Vec<ObjectKey> {
        self.account_view(parent)
            .into_iter()
            .map(|id| self.ledger.accounts[id])
            .collect()
    }

    fn account_list(&self, parent: Option<usize>) -> ListView {
        match parent {
            Some(owner) => self
                .manager
                .materialize(self.ledger.accounts[owner])
                .expect("Failed to materialize account")
                .list(account::SUBACCOUNTS),
            None => self
                .manager
                .root()
                .expect("Failed to materialize root")
                .list(session::ACCOUNTS),
        }
        .expect("Failed to open account list")
    }

    /// Returns true if `account` is `ancestor` or sits below it.
    fn within(&self, ancestor: usize, account: usize) -> bool {
        let mut cursor = Some(account);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.accounts[current].parent;
        }
        false
    }

    fn pick(&self, account: usize, entry: usize) -> Option<usize> {
        let view = self.view(account);
        (!view.is_empty()).then(|| view[entry % view.len()])
    }

    /// Applies one edit to the session and the model. Returns false if the
    /// edit had nothing to act on.
    pub fn apply(&mut self, op: &EditOperation) -> bool {
        let count = self.accounts.len();
        let changed = match op {
            EditOperation::SetAmount {
                account,
                entry,
                amount,
            } => match self.pick(account % count, *entry) {
                Some(id) => {
                    self.entries[id]
                        .handle
                        .set(entry::AMOUNT, Value::Integer(*amount))
                        .expect("Failed to set amount");
                    self.entries[id].amount = *amount;
                    true
                }
                None => false,
            },
            EditOperation::AddEntry { account, amount } => {
                let index = account % count;
                let handle = self
                    .ledger
                    .entries(&self.manager, index)
                    .create(entry::ENTRY)
                    .expect("Failed to create entry");
                handle
                    .set(entry::AMOUNT, Value::Integer(*amount))
                    .expect("Failed to set amount");
                self.accounts[index].added.push(self.entries.len());
                self.entries.push(ModelEntry {
                    amount: *amount,
                    handle,
                    origin: None,
                    location: index,
                    committed_key: None,
                    deleted: false,
                });
                true
            }
            EditOperation::DeleteEntry { account, entry } => {
                match self.pick(account % count, *entry) {
                    Some(id) => {
                        self.entries[id]
                            .handle
                            .delete()
                            .expect("Failed to delete entry");
                        let location = self.entries[id].location;
                        self.accounts[location].added.retain(|&e| e != id);
                        self.entries[id].deleted = true;
                        true
                    }
                    None => false,
                }
            }
            EditOperation::MoveEntry { from, entry, to } => {
                let (from, to) = (from % count, to % count);
                match self.pick(from, *entry) {
                    Some(id) => {
                        let moved = self
                            .ledger
                            .entries(&self.manager, to)
                            .add(&self.entries[id].handle)
                            .expect("Failed to move entry");
                        assert_eq!(moved, from != to, "unexpected move result for {op}");
                        if moved {
                            self.accounts[from].added.retain(|&e| e != id);
                            if self.entries[id].origin != Some(to) {
                                self.accounts[to].added.push(id);
                            }
                            self.entries[id].location = to;
                        }
                        moved
                    }
                    None => false,
                }
            }
            EditOperation::MoveAccount { account, under } => {
                let index = account % count;
                let target = under.map(|under| under % count);
                let handle = self
                    .manager
                    .materialize(self.ledger.accounts[index])
                    .expect("Failed to materialize account");
                let result = self.account_list(target).add(&handle);
                if target.is_some_and(|target| self.within(index, target)) {
                    assert!(
                        matches!(result, Err(CoreError::InvariantViolation { .. })),
                        "cyclic account move accepted for {op}"
                    );
                    false
                } else {
                    let moved = result.expect("Failed to move account");
                    let current = self.accounts[index].parent;
                    assert_eq!(moved, current != target, "unexpected move result for {op}");
                    if moved {
                        match current {
                            Some(owner) => self.accounts[owner].children.retain(|&a| a != index),
                            None => self.lifted.retain(|&a| a != index),
                        }
                        if self.accounts[index].origin != target {
                            match target {
                                Some(owner) => self.accounts[owner].children.push(index),
                                None => self.lifted.push(index),
                            }
                        }
                        self.accounts[index].parent = target;
                    }
                    moved
                }
            }
            EditOperation::RenameAccount { account, name } => {
                let index = account % count;
                self.manager
                    .materialize(self.ledger.accounts[index])
                    .expect("Failed to materialize account")
                    .set(account::NAME, Value::text(name.clone()))
                    .expect("Failed to rename account");
                self.accounts[index].name = name.clone();
                true
            }
        };
        if changed {
            self.applied += 1;
        }
        changed
    }

    /// Applies every edit in order.
    pub fn apply_all(&mut self, ops: &[EditOperation]) {
        for op in ops {
            self.apply(op);
        }
    }

    /// Asserts the uncommitted view matches the model.
    pub fn verify_view(&self) {
        for index in 0..self.accounts.len() {
            let list = self.ledger.entries(&self.manager, index);
            assert_eq!(
                entry_amounts(&list),
                self.expected_amounts(index),
                "entry view mismatch for account {index}"
            );
            let name = self
                .manager
                .materialize(self.ledger.accounts[index])
                .expect("Failed to materialize account")
                .get(account::NAME)
                .expect("Failed to read name");
            assert_eq!(name.as_text(), Some(self.accounts[index].name.as_str()));
        }
        for parent in self.account_parents() {
            let keys: Vec<ObjectKey> = self
                .account_list(parent)
                .iter()
                .expect("Failed to iterate accounts")
                .map(|object| {
                    object
                        .expect("Failed to materialize account")
                        .committed_key()
                        .expect("Account has no committed key")
                })
                .collect();
            assert_eq!(
                keys,
                self.expected_accounts(parent),
                "account view mismatch under {parent:?}"
            );
        }
    }

    fn account_parents(&self) -> impl Iterator<Item = Option<usize>> {
        std::iter::once(None).chain((0..self.accounts.len()).map(Some))
    }

    /// Asserts the committed store has not changed since the session opened.
    pub fn verify_isolated(&self) {
        assert_eq!(
            self.ledger.store.snapshot(),
            self.baseline,
            "committed store changed before commit"
        );
    }

    /// Commits the session.
    pub fn commit(&self) -> CommitReport {
        self.manager.commit().expect("Commit failed")
    }

    /// Asserts the committed store matches the model.
    pub fn verify_committed(&self) {
        for (index, model) in self.accounts.iter().enumerate() {
            let key = self.ledger.accounts[index];
            assert_eq!(
                self.ledger.stored_amounts(key),
                self.expected_amounts(index),
                "committed entries mismatch for account {index}"
            );
            assert_eq!(self.ledger.stored_name(key), model.name);
        }
        for parent in self.account_parents() {
            assert_eq!(
                self.ledger
                    .stored_accounts(parent.map(|owner| self.ledger.accounts[owner])),
                self.expected_accounts(parent),
                "committed accounts mismatch under {parent:?}"
            );
        }
        for entry in &self.entries {
            if let Some(key) = entry.committed_key {
                assert_eq!(self.ledger.store.contains(key), !entry.deleted);
            }
            if !entry.deleted {
                assert!(entry.handle.committed_key().is_some());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{
        edit_sequence_strategy, hierarchy_strategy, ledger_shape_strategy, PropTestConfig,
    };
    use proptest::prelude::*;

    fn shape() -> Vec<(String, Vec<i64>)> {
        vec![
            ("Checking".to_string(), vec![100, 200, 300]),
            ("Savings".to_string(), vec![-50]),
        ]
    }

    #[test]
    fn test_move_back_restores_position() {
        let mut harness = ModelHarness::new(&shape());
        harness.apply(&EditOperation::MoveEntry {
            from: 0,
            entry: 0,
            to: 1,
        });
        assert_eq!(harness.expected_amounts(0), vec![200, 300]);
        assert_eq!(harness.expected_amounts(1), vec![-50, 100]);
        harness.apply(&EditOperation::MoveEntry {
            from: 1,
            entry: 1,
            to: 0,
        });
        assert_eq!(harness.expected_amounts(0), vec![100, 200, 300]);
        harness.verify_view();
        assert!(!harness.manager.is_dirty());
    }

    #[test]
    fn test_interleaved_edits_converge() {
        let mut harness = ModelHarness::new(&shape());
        harness.apply_all(&[
            EditOperation::AddEntry {
                account: 1,
                amount: 7,
            },
            EditOperation::MoveEntry {
                from: 0,
                entry: 1,
                to: 1,
            },
            EditOperation::SetAmount {
                account: 1,
                entry: 2,
                amount: 250,
            },
            EditOperation::DeleteEntry {
                account: 0,
                entry: 0,
            },
            EditOperation::RenameAccount {
                account: 1,
                name: "Rainy day".to_string(),
            },
        ]);
        assert_eq!(harness.applied_count(), 5);
        assert_eq!(harness.expected_amounts(0), vec![300]);
        assert_eq!(harness.expected_amounts(1), vec![-50, 7, 250]);
        harness.verify_view();
        harness.verify_isolated();

        let report = harness.commit();
        assert_eq!(report.created, 1);
        assert_eq!(report.moved, 1);
        assert_eq!(report.deleted, 1);
        harness.verify_committed();
    }

    #[test]
    fn test_edits_on_empty_accounts_are_skipped() {
        let mut harness = ModelHarness::new(&[("Empty".to_string(), Vec::new())]);
        assert!(!harness.apply(&EditOperation::DeleteEntry {
            account: 0,
            entry: 3,
        }));
        assert!(!harness.apply(&EditOperation::SetAmount {
            account: 0,
            entry: 0,
            amount: 1,
        }));
        assert_eq!(harness.applied_count(), 0);
        assert!(harness.commit().is_empty());
    }

    fn accounts() -> Vec<(String, Vec<i64>)> {
        vec![
            ("Assets".to_string(), vec![10]),
            ("Bank".to_string(), vec![20]),
            ("Cash".to_string(), Vec::new()),
        ]
    }

    #[test]
    fn test_nested_accounts_trade_places() {
        // Bank under Assets, Cash under Bank.
        let mut harness = ModelHarness::with_hierarchy(
            &accounts(),
            &[None, Some(0), Some(1)],
            TransactionConfig::default(),
        );
        assert!(harness.apply(&EditOperation::MoveAccount {
            account: 2,
            under: Some(0),
        }));
        assert!(harness.apply(&EditOperation::MoveAccount {
            account: 1,
            under: Some(2),
        }));
        assert_eq!(
            harness.expected_accounts(Some(0)),
            vec![harness.ledger.accounts[2]]
        );
        harness.verify_view();
        harness.verify_isolated();

        let report = harness.commit();
        assert_eq!(report.moved, 2);
        harness.verify_committed();
    }

    #[test]
    fn test_cyclic_account_move_is_refused() {
        let mut harness = ModelHarness::new(&accounts());
        assert!(harness.apply(&EditOperation::MoveAccount {
            account: 1,
            under: Some(0),
        }));
        assert!(!harness.apply(&EditOperation::MoveAccount {
            account: 0,
            under: Some(1),
        }));
        assert!(!harness.apply(&EditOperation::MoveAccount {
            account: 2,
            under: Some(2),
        }));
        assert_eq!(harness.applied_count(), 1);
        harness.verify_view();

        assert_eq!(harness.commit().moved, 1);
        harness.verify_committed();
    }

    #[test]
    fn test_lifted_account_returns_to_its_seed_position() {
        let mut harness = ModelHarness::with_hierarchy(
            &accounts(),
            &[None, Some(0)],
            TransactionConfig::default(),
        );
        assert!(harness.apply(&EditOperation::MoveAccount {
            account: 1,
            under: None,
        }));
        assert_eq!(
            harness.expected_accounts(None),
            vec![
                harness.ledger.accounts[0],
                harness.ledger.accounts[2],
                harness.ledger.accounts[1]
            ]
        );
        assert!(harness.apply(&EditOperation::MoveAccount {
            account: 1,
            under: Some(0),
        }));
        harness.verify_view();
        assert!(!harness.manager.is_dirty());
        assert!(harness.commit().is_empty());
    }

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn nested_account_moves_converge(
            shape in ledger_shape_strategy(4, 2),
            parents in hierarchy_strategy(4),
            ops in edit_sequence_strategy(24),
        ) {
            let mut harness =
                ModelHarness::with_hierarchy(&shape, &parents, TransactionConfig::default());
            for op in &ops {
                harness.apply(op);
                harness.verify_view();
            }
            harness.verify_isolated();
            harness.commit();
            harness.verify_committed();
        }

        #[test]
        fn uncommitted_edits_stay_isolated(
            shape in ledger_shape_strategy(3, 4),
            ops in edit_sequence_strategy(24),
        ) {
            let mut harness = ModelHarness::new(&shape);
            for op in &ops {
                harness.apply(op);
                harness.verify_view();
            }
            harness.verify_isolated();
        }

        #[test]
        fn commit_converges_to_view(
            shape in ledger_shape_strategy(3, 4),
            ops in edit_sequence_strategy(24),
        ) {
            let mut harness = ModelHarness::new(&shape);
            harness.apply_all(&ops);
            harness.commit();
            harness.verify_committed();
        }

        #[test]
        fn cached_sessions_converge_too(
            shape in ledger_shape_strategy(3, 4),
            ops in edit_sequence_strategy(24),
        ) {
            let config = TransactionConfig::default().cache_materializations(true);
            let mut harness = ModelHarness::with_config(&shape, config);
            harness.apply_all(&ops);
            harness.verify_view();
            harness.commit();
            harness.verify_committed();
        }

        #[test]
        fn dropped_session_leaves_store_untouched(
            shape in ledger_shape_strategy(2, 3),
            ops in edit_sequence_strategy(12),
        ) {
            let mut harness = ModelHarness::new(&shape);
            harness.apply_all(&ops);
            let ModelHarness { ledger, manager, baseline, entries, .. } = harness;
            drop(entries);
            drop(manager);
            prop_assert_eq!(ledger.store.snapshot(), baseline);
        }
    }
}
