//! Implements a struct that holds the state of the REST server.

use std::sync::Arc;

use rusqlite::Connection;

use crate::{Error, config::LedgerConfig, ledger::Ledger};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The balance ledger and the database it derives balances from.
    pub ledger: Arc<Ledger>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the source
    /// transactions and balance records. The ledger reads the time from the system clock in
    /// `config.local_timezone`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or the timezone is not valid.
    pub fn new(db_connection: Connection, config: LedgerConfig) -> Result<Self, Error> {
        Ok(Self::from_ledger(Ledger::open(db_connection, config)?))
    }

    /// Create a new [AppState] around an existing ledger.
    pub fn from_ledger(ledger: Ledger) -> Self {
        Self {
            ledger: Arc::new(ledger),
        }
    }
}
