//! JSON route handlers over the ledger.
//!
//! Ledger operations block on SQLite and on the bucket locks, so every handler runs them on the
//! blocking thread pool.

mod balances;
mod fund_usage;
mod health;
mod maintenance;
mod sources;

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{AppState, Error, ledger::Ledger};

pub use balances::{
    get_balance_endpoint, get_balance_summary_endpoint, get_balances_endpoint,
    get_latest_balance_endpoint,
};
pub use fund_usage::{
    delete_fund_usage_endpoint, edit_fund_usage_endpoint, get_fund_usage_summary_endpoint,
    list_fund_usage_endpoint, submit_fund_usage_endpoint,
};
pub use health::get_health_endpoint;
pub use maintenance::{
    repair_endpoint, seed_opening_balances_endpoint, sync_all_endpoint, verify_integrity_endpoint,
};
pub use sources::{
    create_tuition_endpoint, delete_donation_endpoint, record_donation_endpoint,
    set_tuition_status_endpoint,
};

/// The state needed by the ledger route handlers.
#[derive(Debug, Clone)]
pub struct LedgerState {
    ledger: Arc<Ledger>,
}

impl FromRef<AppState> for LedgerState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            ledger: state.ledger.clone(),
        }
    }
}

impl LedgerState {
    /// Run `operation` against the ledger on the blocking thread pool.
    async fn run<T, F>(&self, operation: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&Ledger) -> Result<T, Error> + Send + 'static,
    {
        let ledger = self.ledger.clone();

        tokio::task::spawn_blocking(move || operation(&ledger))
            .await
            .map_err(|error| {
                tracing::error!("ledger task did not finish: {error}");
                Error::BackgroundTaskFailed(error.to_string())
            })?
    }
}
