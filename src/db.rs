//! Database setup and access to the shared connection.

use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    Error,
    ledger::create_balance_tables,
    sources::{create_donation_table, create_fund_usage_tables, create_tuition_table},
};

/// Create the tables for the source transactions and the balance ledger.
///
/// Existing tables are left untouched, so this is safe to call on every start.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_tuition_table(&transaction)?;
    create_donation_table(&transaction)?;
    create_fund_usage_tables(&transaction)?;
    create_balance_tables(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Lock the shared database connection.
///
/// # Errors
/// Returns [Error::DatabaseLockError] if another thread panicked while holding the lock.
pub fn lock_connection(connection: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, Error> {
    connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}
