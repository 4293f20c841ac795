//! Route handlers for rebuilding and checking the ledger.

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use serde::Deserialize;

use crate::{
    Error,
    api::LedgerState,
    bucket::FundBucket,
    ledger::{IntegrityReport, OpeningSeed, WalkReport},
    money::Money,
    period::Period,
};

/// The body of a request to seed opening balances.
#[derive(Debug, Deserialize)]
pub struct SeedForm {
    period: Period,
    balances: BTreeMap<FundBucket, Money>,
}

/// The body of a request to repair a bucket.
#[derive(Debug, Deserialize)]
pub struct RepairForm {
    bucket: FundBucket,
    from: Period,
}

/// A route handler that recomputes every bucket from the start of its history.
pub async fn sync_all_endpoint(
    State(state): State<LedgerState>,
) -> Result<Json<Vec<WalkReport>>, Error> {
    state.run(|ledger| ledger.sync_all()).await.map(Json)
}

/// A route handler for setting explicit opening balances.
pub async fn seed_opening_balances_endpoint(
    State(state): State<LedgerState>,
    Json(form): Json<SeedForm>,
) -> Result<Json<Vec<OpeningSeed>>, Error> {
    state
        .run(move |ledger| ledger.seed_opening_balances(form.period, &form.balances))
        .await
        .map(Json)
}

/// A route handler that recomputes a bucket, overwriting corrupt records.
pub async fn repair_endpoint(
    State(state): State<LedgerState>,
    Json(form): Json<RepairForm>,
) -> Result<Json<WalkReport>, Error> {
    state
        .run(move |ledger| ledger.repair(form.bucket, form.from))
        .await
        .map(Json)
}

/// A route handler that scans every balance record for inconsistencies.
pub async fn verify_integrity_endpoint(
    State(state): State<LedgerState>,
) -> Result<Json<IntegrityReport>, Error> {
    state.run(|ledger| ledger.verify_integrity()).await.map(Json)
}
