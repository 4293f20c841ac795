//! The balance recapitulation engine.
//!
//! Balances are kept as one record per bucket per month. A change to a source transaction
//! recomputes its month and carries the new closing balance forward, month by month, up to the
//! current month.

mod aggregate;
mod engine;
mod guard;
mod integrity;
mod lanes;
mod recompute;
mod record;
mod store;
mod summary;

pub use engine::Ledger;
pub use guard::Reservation;
pub use integrity::{IntegrityIssue, IntegrityReport};
pub use recompute::WalkReport;
pub use record::{BalanceRecord, PeriodTotals};
pub use store::{OpeningSeed, create_balance_tables};
pub use summary::BalanceSummary;
