//! The source transactions that balances are derived from.
//!
//! These modules only read and write their own tables. Writes that change a balance go
//! through [crate::ledger::Ledger] so the affected periods are recomputed.

mod donation;
mod fund_usage;
mod tuition;

pub use donation::{
    ANONYMOUS_DONOR, Donation, DonationId, NewDonation, create_donation_table, delete_donation,
    earliest_donation_period, get_donation, insert_donation, sum_donations,
};
pub use fund_usage::{
    Allocation, FundUsage, FundUsageId, FundUsageSummary, NewFundUsage, ResolvedAllocation,
    UsageCategory, UsageFilter, UsageSource, create_fund_usage_tables, delete_fund_usage,
    earliest_usage_period, get_fund_usage, insert_fund_usage, list_fund_usage,
    sum_bucket_usage, sum_total_usage, summarize_fund_usage, update_fund_usage,
};
pub use tuition::{
    DEFAULT_TUITION_AMOUNT, NewTuitionDue, TuitionDue, TuitionId, TuitionStatus,
    create_tuition_due, create_tuition_table, earliest_paid_period, get_tuition_due,
    sum_paid_tuition, update_tuition_status,
};
