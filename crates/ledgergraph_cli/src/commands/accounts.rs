//! Account commands: listing balances, opening and renaming accounts.

use super::ledger_file::{find_account, text_of, LedgerFile};
use ledgergraph_core::ListView;
use ledgergraph_model::{account, commodity, entry, format_amount, session};
use ledgergraph_storage::Value;
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tracing::info;

/// Balance line for one account.
#[derive(Debug, Serialize)]
pub struct AccountSummary {
    /// Account name.
    pub name: String,
    /// Nesting depth, 0 for top-level accounts.
    pub depth: usize,
    /// Commodity symbol.
    pub currency: String,
    /// Number of entries.
    pub entries: usize,
    /// Opening balance plus entries, in minor units.
    pub balance: i64,
    /// Balance formatted with the commodity's decimals.
    pub formatted: String,
}

/// Collects a summary of every account, depth-first in list order.
pub fn summarize(ledger: &LedgerFile) -> Result<Vec<AccountSummary>, Box<dyn Error>> {
    let manager = ledger.open()?;
    let mut summaries = Vec::new();
    walk(&manager.root()?.list(session::ACCOUNTS)?, 0, &mut summaries)?;
    Ok(summaries)
}

fn walk(
    accounts: &ListView,
    depth: usize,
    out: &mut Vec<AccountSummary>,
) -> Result<(), Box<dyn Error>> {
    for item in accounts.iter()? {
        let acct = item?;
        let (currency, decimals) = match acct.reference(account::CURRENCY)? {
            Some(unit) => (
                text_of(&unit, commodity::SYMBOL)?,
                unit.get(commodity::DECIMALS)?.as_integer().unwrap_or(2),
            ),
            None => (String::new(), 0),
        };

        let mut balance = acct
            .get(account::OPENING_BALANCE)?
            .as_integer()
            .unwrap_or(0);
        let mut entries = 0;
        for booked in acct.list(account::ENTRIES)?.iter()? {
            balance += booked?.get(entry::AMOUNT)?.as_integer().unwrap_or(0);
            entries += 1;
        }

        out.push(AccountSummary {
            name: text_of(&acct, account::NAME)?,
            depth,
            currency,
            entries,
            balance,
            formatted: format_amount(balance, u32::try_from(decimals).unwrap_or(0)),
        });
        walk(&acct.list(account::SUBACCOUNTS)?, depth + 1, out)?;
    }
    Ok(())
}

/// Runs the accounts command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn Error>> {
    let ledger = LedgerFile::load(path)?;
    let summaries = summarize(&ledger)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summaries)?),
        _ => {
            for summary in &summaries {
                let label = format!("{}{}", "  ".repeat(summary.depth), summary.name);
                println!(
                    "{:<32} {:>14} {:<4} ({} entries)",
                    label, summary.formatted, summary.currency, summary.entries
                );
            }
        }
    }
    Ok(())
}

/// Opens a new account, top-level or under `parent`. It shares the
/// currency of its parent, or of the first commodity for top-level
/// accounts.
pub fn open(path: &Path, name: &str, parent: Option<&str>) -> Result<(), Box<dyn Error>> {
    info!("Opening account {:?} in {:?}", name, path);
    let ledger = LedgerFile::load(path)?;
    ledger.edit(|root| {
        let (list, currency) = match parent {
            Some(parent) => {
                let parent = find_account(root, parent)?;
                let currency = parent.reference(account::CURRENCY)?;
                (parent.list(account::SUBACCOUNTS)?, currency)
            }
            None => {
                let currency = root.list(session::COMMODITIES)?.iter()?.next().transpose()?;
                (root.list(session::ACCOUNTS)?, currency)
            }
        };
        let created = list.create(account::ACCOUNT)?;
        created.set(account::NAME, Value::text(name))?;
        created.set_reference(account::CURRENCY, currency.as_ref())?;
        Ok(())
    })?;
    println!("Opened account {name:?}");
    Ok(())
}

/// Renames an account.
pub fn rename(path: &Path, name: &str, to: &str) -> Result<(), Box<dyn Error>> {
    info!("Renaming account {:?} to {:?} in {:?}", name, to, path);
    let ledger = LedgerFile::load(path)?;
    ledger.edit(|root| {
        find_account(root, name)?.set(account::NAME, Value::text(to))?;
        Ok(())
    })?;
    println!("Renamed {name:?} to {to:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{entries, init};

    fn ledger(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("ledger.json");
        init::run(&path, "home", &["Checking".to_string()], "USD", 2).unwrap();
        path
    }

    #[test]
    fn test_summarize_nested_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger(&dir);
        open(&path, "Groceries", Some("Checking")).unwrap();
        entries::add(&path, "Checking", 1250, None).unwrap();
        entries::add(&path, "Groceries", -300, Some("market")).unwrap();

        let summaries = summarize(&LedgerFile::load(&path).unwrap()).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "Checking");
        assert_eq!(summaries[0].formatted, "12.50");
        assert_eq!(summaries[1].depth, 1);
        assert_eq!(summaries[1].currency, "USD");
        assert_eq!(summaries[1].balance, -300);
    }

    #[test]
    fn test_rename_account() {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger(&dir);
        rename(&path, "Checking", "Current").unwrap();
        assert!(rename(&path, "Checking", "Other").is_err());

        let summaries = summarize(&LedgerFile::load(&path).unwrap()).unwrap();
        assert_eq!(summaries[0].name, "Current");
    }

    #[test]
    fn test_open_top_level_account_uses_first_commodity() {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger(&dir);
        open(&path, "Savings", None).unwrap();

        let summaries = summarize(&LedgerFile::load(&path).unwrap()).unwrap();
        assert_eq!(summaries[1].name, "Savings");
        assert_eq!(summaries[1].currency, "USD");
    }
}
