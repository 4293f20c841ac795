use axum::{Json, extract::State};
use serde::Serialize;

use crate::{Error, api::LedgerState, period::Period};

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    current_period: Period,
}

/// A route handler for liveness checks. Reports the period balances are materialized up to.
pub async fn get_health_endpoint(State(state): State<LedgerState>) -> Result<Json<Health>, Error> {
    Ok(Json(Health {
        status: "ok",
        current_period: state.ledger.current_period()?,
    }))
}
