//! LedgerGraph CLI
//!
//! Command-line tools for editing a LedgerGraph ledger file. Every
//! mutating command runs as one transaction: the file is rewritten only if
//! the whole edit commits.
//!
//! # Commands
//!
//! - `init` - Create a ledger with a session, a currency and accounts
//! - `accounts` - List accounts and their balances
//! - `open-account` - Open an account, optionally under a parent
//! - `rename-account` - Rename an account
//! - `add-entry` - Book an entry against an account
//! - `delete-entry` - Delete an entry
//! - `move-entry` - Move an entry to another account
//! - `transfer` - Book two linked entries between accounts
//! - `schema` - Print the entity schema

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// LedgerGraph command-line ledger tools.
#[derive(Parser)]
#[command(name = "ledgergraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the ledger file
    #[arg(global = true, short, long)]
    store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new ledger file
    Init {
        /// Session name
        #[arg(long, default_value = "ledger")]
        session: String,

        /// Top-level accounts to open (repeatable)
        #[arg(short, long = "account")]
        accounts: Vec<String>,

        /// Currency symbol
        #[arg(long, default_value = "USD")]
        currency: String,

        /// Decimal places of the currency
        #[arg(long, default_value = "2")]
        decimals: u32,
    },

    /// List accounts and their balances
    Accounts {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Open a new account
    OpenAccount {
        /// Account name
        #[arg(short, long)]
        name: String,

        /// Parent account
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Rename an account
    RenameAccount {
        /// Current account name
        #[arg(short, long)]
        account: String,

        /// New account name
        #[arg(short, long)]
        to: String,
    },

    /// Book an entry against an account
    AddEntry {
        /// Account name
        #[arg(short, long)]
        account: String,

        /// Amount in minor units
        #[arg(long, allow_hyphen_values = true)]
        amount: i64,

        /// Free-text memo
        #[arg(short, long)]
        memo: Option<String>,
    },

    /// Delete an entry
    DeleteEntry {
        /// Account name
        #[arg(short, long)]
        account: String,

        /// Position of the entry in the account
        #[arg(short, long)]
        index: usize,
    },

    /// Move an entry to another account
    MoveEntry {
        /// Account name
        #[arg(short, long)]
        account: String,

        /// Position of the entry in the account
        #[arg(short, long)]
        index: usize,

        /// Target account name
        #[arg(short, long)]
        to: String,
    },

    /// Book two linked entries moving an amount between accounts
    Transfer {
        /// Source account
        #[arg(long)]
        from: String,

        /// Target account
        #[arg(long)]
        to: String,

        /// Amount in minor units
        #[arg(long)]
        amount: i64,

        /// Free-text memo for both legs
        #[arg(short, long)]
        memo: Option<String>,
    },

    /// Print the entity schema
    Schema,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Init {
            session,
            accounts,
            currency,
            decimals,
        } => {
            let path = cli.store.ok_or("Ledger path required for init")?;
            commands::init::run(&path, &session, &accounts, &currency, decimals)?;
        }
        Commands::Accounts { format } => {
            let path = cli.store.ok_or("Ledger path required for accounts")?;
            commands::accounts::run(&path, &format)?;
        }
        Commands::OpenAccount { name, parent } => {
            let path = cli.store.ok_or("Ledger path required for open-account")?;
            commands::accounts::open(&path, &name, parent.as_deref())?;
        }
        Commands::RenameAccount { account, to } => {
            let path = cli.store.ok_or("Ledger path required for rename-account")?;
            commands::accounts::rename(&path, &account, &to)?;
        }
        Commands::AddEntry {
            account,
            amount,
            memo,
        } => {
            let path = cli.store.ok_or("Ledger path required for add-entry")?;
            commands::entries::add(&path, &account, amount, memo.as_deref())?;
        }
        Commands::DeleteEntry { account, index } => {
            let path = cli.store.ok_or("Ledger path required for delete-entry")?;
            commands::entries::delete(&path, &account, index)?;
        }
        Commands::MoveEntry { account, index, to } => {
            let path = cli.store.ok_or("Ledger path required for move-entry")?;
            commands::entries::relocate(&path, &account, index, &to)?;
        }
        Commands::Transfer {
            from,
            to,
            amount,
            memo,
        } => {
            let path = cli.store.ok_or("Ledger path required for transfer")?;
            commands::entries::transfer(&path, &from, &to, amount, memo.as_deref())?;
        }
        Commands::Schema => commands::schema::run()?,
        Commands::Version => {
            println!("LedgerGraph CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
