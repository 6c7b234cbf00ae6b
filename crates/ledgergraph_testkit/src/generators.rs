//! Property-based test generators using proptest.
//!
//! Edits address accounts and entries by position. Positions are reduced
//! modulo the current sizes when applied, so every generated sequence is
//! applicable to any ledger.

use proptest::prelude::*;
use std::fmt;

/// One edit applied to an uncommitted ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOperation {
    /// Overwrite the amount of an existing entry.
    SetAmount {
        /// Account position.
        account: usize,
        /// Entry position within the account's view.
        entry: usize,
        /// New amount in minor units.
        amount: i64,
    },
    /// Append a new entry.
    AddEntry {
        /// Account position.
        account: usize,
        /// Amount in minor units.
        amount: i64,
    },
    /// Delete an entry.
    DeleteEntry {
        /// Account position.
        account: usize,
        /// Entry position within the account's view.
        entry: usize,
    },
    /// Move an entry to another account's entry list.
    MoveEntry {
        /// Source account position.
        from: usize,
        /// Entry position within the source view.
        entry: usize,
        /// Target account position.
        to: usize,
    },
    /// Move an account to the top level or under another account.
    MoveAccount {
        /// Account position.
        account: usize,
        /// Position of the new parent, `None` for the top level.
        under: Option<usize>,
    },
    /// Rename an account.
    RenameAccount {
        /// Account position.
        account: usize,
        /// New name.
        name: String,
    },
}

impl fmt::Display for EditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetAmount {
                account,
                entry,
                amount,
            } => write!(f, "set a{account}[{entry}] = {amount}"),
            Self::AddEntry { account, amount } => write!(f, "add a{account} += {amount}"),
            Self::DeleteEntry { account, entry } => write!(f, "delete a{account}[{entry}]"),
            Self::MoveEntry { from, entry, to } => write!(f, "move a{from}[{entry}] -> a{to}"),
            Self::MoveAccount {
                account,
                under: Some(under),
            } => write!(f, "nest a{account} under a{under}"),
            Self::MoveAccount {
                account,
                under: None,
            } => write!(f, "lift a{account} to top"),
            Self::RenameAccount { account, name } => write!(f, "rename a{account} {name:?}"),
        }
    }
}

/// Strategy for entry amounts in minor units.
pub fn amount_strategy() -> impl Strategy<Value = i64> {
    -1_000_000i64..1_000_000
}

/// Strategy for account names.
pub fn account_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{2,11}").expect("Invalid regex")
}

/// Strategy for the shape of a committed ledger: accounts with their
/// entry amounts.
pub fn ledger_shape_strategy(
    max_accounts: usize,
    max_entries: usize,
) -> impl Strategy<Value = Vec<(String, Vec<i64>)>> {
    prop::collection::vec(
        (
            account_name_strategy(),
            prop::collection::vec(amount_strategy(), 0..=max_entries),
        ),
        1..=max_accounts.max(1),
    )
}

/// Strategy for the committed account tree of a ledger with up to
/// `max_accounts` accounts: the parent position of each account, `None`
/// for top-level ones. Parents are reduced modulo the account's own
/// position, so every account nests under an earlier one.
pub fn hierarchy_strategy(max_accounts: usize) -> impl Strategy<Value = Vec<Option<usize>>> {
    prop::collection::vec(prop::option::of(any::<usize>()), 0..=max_accounts)
}

/// Strategy for a single edit.
pub fn edit_operation_strategy() -> impl Strategy<Value = EditOperation> {
    prop_oneof![
        3 => (any::<usize>(), any::<usize>(), amount_strategy()).prop_map(
            |(account, entry, amount)| EditOperation::SetAmount {
                account,
                entry,
                amount
            }
        ),
        3 => (any::<usize>(), amount_strategy())
            .prop_map(|(account, amount)| EditOperation::AddEntry { account, amount }),
        2 => (any::<usize>(), any::<usize>())
            .prop_map(|(account, entry)| EditOperation::DeleteEntry { account, entry }),
        2 => (any::<usize>(), any::<usize>(), any::<usize>())
            .prop_map(|(from, entry, to)| EditOperation::MoveEntry { from, entry, to }),
        2 => (any::<usize>(), prop::option::of(any::<usize>()))
            .prop_map(|(account, under)| EditOperation::MoveAccount { account, under }),
        1 => (any::<usize>(), account_name_strategy())
            .prop_map(|(account, name)| EditOperation::RenameAccount { account, name }),
    ]
}

/// Strategy for an edit session of up to `max_len` operations.
pub fn edit_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<EditOperation>> {
    prop::collection::vec(edit_operation_strategy(), 0..=max_len)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 128,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let op = EditOperation::MoveEntry {
            from: 0,
            entry: 2,
            to: 1,
        };
        assert_eq!(op.to_string(), "move a0[2] -> a1");
        let op = EditOperation::MoveAccount {
            account: 2,
            under: Some(0),
        };
        assert_eq!(op.to_string(), "nest a2 under a0");
        let op = EditOperation::MoveAccount {
            account: 2,
            under: None,
        };
        assert_eq!(op.to_string(), "lift a2 to top");
    }

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn account_name_is_capitalized(name in account_name_strategy()) {
            let first = name.chars().next();
            prop_assert!(first.is_some_and(|c| c.is_ascii_uppercase()));
        }

        #[test]
        fn ledger_shape_respects_bounds(shape in ledger_shape_strategy(3, 4)) {
            prop_assert!(!shape.is_empty() && shape.len() <= 3);
            prop_assert!(shape.iter().all(|(_, amounts)| amounts.len() <= 4));
        }

        #[test]
        fn hierarchy_respects_bounds(parents in hierarchy_strategy(4)) {
            prop_assert!(parents.len() <= 4);
        }

        #[test]
        fn edit_sequence_respects_length(ops in edit_sequence_strategy(8)) {
            prop_assert!(ops.len() <= 8);
        }
    }
}
