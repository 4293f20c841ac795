//! Application router configuration.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde_json::json;

use crate::{
    AppState,
    api::{
        create_tuition_endpoint, delete_donation_endpoint, delete_fund_usage_endpoint,
        edit_fund_usage_endpoint, get_balance_endpoint, get_balance_summary_endpoint,
        get_balances_endpoint, get_fund_usage_summary_endpoint, get_health_endpoint,
        get_latest_balance_endpoint, list_fund_usage_endpoint, record_donation_endpoint,
        repair_endpoint,
        seed_opening_balances_endpoint, set_tuition_status_endpoint, submit_fund_usage_endpoint,
        sync_all_endpoint, verify_integrity_endpoint,
    },
    endpoints,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let balance_routes = Router::new()
        .route(endpoints::BALANCES, get(get_balances_endpoint))
        .route(endpoints::LATEST_BALANCE, get(get_latest_balance_endpoint))
        .route(endpoints::BALANCE_SUMMARY, get(get_balance_summary_endpoint))
        .route(endpoints::PERIOD_BALANCE, get(get_balance_endpoint));

    let source_routes = Router::new()
        .route(
            endpoints::FUND_USAGE,
            get(list_fund_usage_endpoint).post(submit_fund_usage_endpoint),
        )
        .route(
            endpoints::FUND_USAGE_SUMMARY,
            get(get_fund_usage_summary_endpoint),
        )
        .route(
            endpoints::FUND_USAGE_ITEM,
            put(edit_fund_usage_endpoint).delete(delete_fund_usage_endpoint),
        )
        .route(endpoints::TUITION, post(create_tuition_endpoint))
        .route(endpoints::TUITION_STATUS, put(set_tuition_status_endpoint))
        .route(endpoints::DONATIONS, post(record_donation_endpoint))
        .route(endpoints::DONATION, delete(delete_donation_endpoint));

    let maintenance_routes = Router::new()
        .route(endpoints::LEDGER_SYNC, post(sync_all_endpoint))
        .route(endpoints::LEDGER_SEED, post(seed_opening_balances_endpoint))
        .route(endpoints::LEDGER_REPAIR, post(repair_endpoint))
        .route(endpoints::LEDGER_INTEGRITY, get(verify_integrity_endpoint));

    Router::new()
        .route(endpoints::HEALTH, get(get_health_endpoint))
        .merge(balance_routes)
        .merge(source_routes)
        .merge(maintenance_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "no route matches this path" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use time::macros::datetime;

    use crate::test_utils::get_test_server;

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let (server, _) = get_test_server(datetime!(2024-05-20 10:00 +07:00));

        let response = server.get("/api/nothing_here").await;

        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&serde_json::json!({ "error": "no route matches this path" }));
    }

    #[tokio::test]
    async fn unknown_bucket_is_rejected() {
        let (server, _) = get_test_server(datetime!(2024-05-20 10:00 +07:00));

        let response = server.get("/api/balances/savings").await;

        assert!(response.status_code().is_client_error());
    }
}
