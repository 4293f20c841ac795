//! Read-only balance queries.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::{
    Error,
    api::LedgerState,
    bucket::FundBucket,
    ledger::{BalanceRecord, BalanceSummary},
    period::Period,
};

/// An optional inclusive range of periods.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    start: Option<Period>,
    end: Option<Period>,
}

/// A route handler for listing a bucket's balance records in chronological order.
pub async fn get_balances_endpoint(
    State(state): State<LedgerState>,
    Path(bucket): Path<FundBucket>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Vec<BalanceRecord>>, Error> {
    state
        .run(move |ledger| ledger.list_balances(bucket, range.start, range.end))
        .await
        .map(Json)
}

/// A route handler for the most recent balance record of a bucket.
pub async fn get_latest_balance_endpoint(
    State(state): State<LedgerState>,
    Path(bucket): Path<FundBucket>,
) -> Result<Json<BalanceRecord>, Error> {
    state
        .run(move |ledger| ledger.get_latest_balance(bucket))
        .await
        .map(Json)
}

/// A route handler for the balance record of a bucket in one period.
pub async fn get_balance_endpoint(
    State(state): State<LedgerState>,
    Path((bucket, period)): Path<(FundBucket, Period)>,
) -> Result<Json<BalanceRecord>, Error> {
    state
        .run(move |ledger| ledger.get_balance(bucket, period))
        .await
        .map(Json)
}

/// A route handler for totals over a bucket's balance records.
pub async fn get_balance_summary_endpoint(
    State(state): State<LedgerState>,
    Path(bucket): Path<FundBucket>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<BalanceSummary>, Error> {
    state
        .run(move |ledger| ledger.get_summary(bucket, range.start, range.end))
        .await
        .map(Json)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::Value;
    use time::macros::datetime;

    use crate::{
        endpoints::{self, format_endpoint},
        period::Period,
        sources::{NewTuitionDue, TuitionStatus},
        test_utils::get_test_server,
    };

    fn balance_path(endpoint: &str, bucket: &str) -> String {
        format_endpoint(endpoint, bucket)
    }

    #[tokio::test]
    async fn paid_tuition_shows_up_in_the_balance() {
        let (server, ledger) = get_test_server(datetime!(2024-05-20 10:00 +07:00));
        ledger
            .create_tuition_due(&NewTuitionDue {
                student: "Hasan".to_owned(),
                period: Period::new(2024, 5).unwrap(),
                amount: None,
                status: TuitionStatus::Paid,
            })
            .unwrap();

        let path = format_endpoint(&balance_path(endpoints::PERIOD_BALANCE, "tuition"), "2024-05");
        let response = server.get(&path).await;

        response.assert_status_ok();
        let record: Value = response.json();
        assert_eq!(record["bucket"], "tuition");
        assert_eq!(record["period"], "2024-05");
        assert_eq!(record["opening"], "0.00");
        assert_eq!(record["income"], "110000.00");
        assert_eq!(record["expense"], "0.00");
        assert_eq!(record["closing"], "110000.00");
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let (server, _) = get_test_server(datetime!(2024-05-20 10:00 +07:00));

        let path = format_endpoint(&balance_path(endpoints::PERIOD_BALANCE, "donation"), "2024-01");

        server
            .get(&path)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .get(&balance_path(endpoints::LATEST_BALANCE, "donation"))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lists_and_summarizes_a_range() {
        let (server, ledger) = get_test_server(datetime!(2024-04-20 10:00 +07:00));
        for month in [1, 3] {
            ledger
                .create_tuition_due(&NewTuitionDue {
                    student: "Hasan".to_owned(),
                    period: Period::new(2024, month).unwrap(),
                    amount: None,
                    status: TuitionStatus::Paid,
                })
                .unwrap();
        }

        let records: Vec<Value> = server
            .get(&balance_path(endpoints::BALANCES, "combined"))
            .add_query_param("start", "2024-02")
            .await
            .json();
        let summary: Value = server
            .get(&balance_path(endpoints::BALANCE_SUMMARY, "combined"))
            .add_query_param("start", "2024-02")
            .add_query_param("end", "2024-04")
            .await
            .json();

        let periods: Vec<&str> = records
            .iter()
            .filter_map(|record| record["period"].as_str())
            .collect();
        assert_eq!(periods, ["2024-02", "2024-03", "2024-04"]);
        assert_eq!(summary["periods"], 3);
        assert_eq!(summary["total_income"], "110000.00");
        assert_eq!(summary["opening"], "110000.00");
        assert_eq!(summary["closing"], "220000.00");
    }

    #[tokio::test]
    async fn reversed_range_is_rejected() {
        let (server, _) = get_test_server(datetime!(2024-04-20 10:00 +07:00));

        server
            .get(&balance_path(endpoints::BALANCES, "tuition"))
            .add_query_param("start", "2024-03")
            .add_query_param("end", "2024-01")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
