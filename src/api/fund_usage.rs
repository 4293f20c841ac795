//! Route handlers for fund usage. Every write goes through the balance guard.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::{
    Error,
    api::LedgerState,
    period::Period,
    sources::{FundUsage, FundUsageId, FundUsageSummary, NewFundUsage, UsageFilter},
};

#[derive(Debug, Default, Deserialize)]
pub struct FundUsageQuery {
    period: Option<Period>,
}

/// A route handler for submitting fund usage.
///
/// Responds with 201 and the stored usage, or 409 if a bucket cannot pay its share.
pub async fn submit_fund_usage_endpoint(
    State(state): State<LedgerState>,
    Json(new_usage): Json<NewFundUsage>,
) -> Result<(StatusCode, Json<FundUsage>), Error> {
    state
        .run(move |ledger| ledger.submit_fund_usage(&new_usage))
        .await
        .map(|usage| (StatusCode::CREATED, Json(usage)))
}

/// A route handler for listing fund usage, optionally for a single period.
pub async fn list_fund_usage_endpoint(
    State(state): State<LedgerState>,
    Query(query): Query<FundUsageQuery>,
) -> Result<Json<Vec<FundUsage>>, Error> {
    state
        .run(move |ledger| ledger.list_fund_usage(query.period))
        .await
        .map(Json)
}

/// A route handler for totals over fund usage, e.g.
/// `?start=2024-05-01&end=2024-05-31&category=operational`. Every parameter is optional.
pub async fn get_fund_usage_summary_endpoint(
    State(state): State<LedgerState>,
    Query(filter): Query<UsageFilter>,
) -> Result<Json<FundUsageSummary>, Error> {
    state
        .run(move |ledger| ledger.summarize_fund_usage(&filter))
        .await
        .map(Json)
}

/// A route handler for replacing a fund usage.
pub async fn edit_fund_usage_endpoint(
    State(state): State<LedgerState>,
    Path(usage_id): Path<FundUsageId>,
    Json(new_usage): Json<NewFundUsage>,
) -> Result<Json<FundUsage>, Error> {
    state
        .run(move |ledger| ledger.edit_fund_usage(usage_id, &new_usage))
        .await
        .map(Json)
}

/// A route handler for deleting a fund usage, responds with the deleted usage.
pub async fn delete_fund_usage_endpoint(
    State(state): State<LedgerState>,
    Path(usage_id): Path<FundUsageId>,
) -> Result<Json<FundUsage>, Error> {
    state
        .run(move |ledger| ledger.delete_fund_usage(usage_id))
        .await
        .map(Json)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use time::macros::datetime;

    use crate::{
        bucket::FundBucket,
        endpoints::{self, format_endpoint},
        money::Money,
        period::Period,
        sources::{NewTuitionDue, TuitionStatus},
        test_utils::get_test_server,
    };

    fn usage_body(amount: &str, used_on: &str) -> Value {
        json!({
            "title": "Roof repair",
            "category": "operational",
            "used_on": used_on,
            "allocation": { "kind": "single", "bucket": "tuition", "amount": amount }
        })
    }

    fn may() -> Period {
        Period::new(2024, 5).unwrap()
    }

    #[tokio::test]
    async fn submit_checks_the_balance() {
        let (server, ledger) = get_test_server(datetime!(2024-05-20 10:00 +07:00));
        ledger
            .create_tuition_due(&NewTuitionDue {
                student: "Zaid".to_owned(),
                period: may(),
                amount: Some(Money::from_major(100)),
                status: TuitionStatus::Paid,
            })
            .unwrap();

        let created = server
            .post(endpoints::FUND_USAGE)
            .json(&usage_body("60.00", "2024-05-02"))
            .await;
        let rejected = server
            .post(endpoints::FUND_USAGE)
            .json(&usage_body("60.00", "2024-05-03"))
            .await;

        created.assert_status(StatusCode::CREATED);
        let usage: Value = created.json();
        assert_eq!(usage["amount"], "60.00");
        assert_eq!(usage["source"], "tuition");
        rejected.assert_status(StatusCode::CONFLICT);
        assert_eq!(
            ledger
                .get_balance(FundBucket::Tuition, may())
                .unwrap()
                .closing,
            Money::from_major(40)
        );
    }

    #[tokio::test]
    async fn edit_and_delete_recompute_the_balance() {
        let (server, ledger) = get_test_server(datetime!(2024-05-20 10:00 +07:00));
        ledger
            .create_tuition_due(&NewTuitionDue {
                student: "Zaid".to_owned(),
                period: may(),
                amount: Some(Money::from_major(100)),
                status: TuitionStatus::Paid,
            })
            .unwrap();
        let usage: Value = server
            .post(endpoints::FUND_USAGE)
            .json(&usage_body("60.00", "2024-05-02"))
            .await
            .json();
        let path = format_endpoint(endpoints::FUND_USAGE_ITEM, &usage["id"]);

        server
            .put(&path)
            .json(&usage_body("100.00", "2024-05-02"))
            .await
            .assert_status_ok();
        assert_eq!(
            ledger.get_balance(FundBucket::Tuition, may()).unwrap().closing,
            Money::ZERO
        );

        server.delete(&path).await.assert_status_ok();
        assert_eq!(
            ledger.get_balance(FundBucket::Tuition, may()).unwrap().closing,
            Money::from_major(100)
        );
        server.delete(&path).await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lists_usage_for_a_period() {
        let (server, ledger) = get_test_server(datetime!(2024-05-20 10:00 +07:00));
        ledger
            .create_tuition_due(&NewTuitionDue {
                student: "Zaid".to_owned(),
                period: Period::new(2024, 4).unwrap(),
                amount: Some(Money::from_major(100)),
                status: TuitionStatus::Paid,
            })
            .unwrap();
        for used_on in ["2024-04-10", "2024-05-10"] {
            server
                .post(endpoints::FUND_USAGE)
                .json(&usage_body("1.00", used_on))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let usage: Vec<Value> = server
            .get(endpoints::FUND_USAGE)
            .add_query_param("period", "2024-05")
            .await
            .json();

        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0]["used_on"], "2024-05-10");
    }

    #[tokio::test]
    async fn summarizes_usage_by_day_and_category() {
        let (server, ledger) = get_test_server(datetime!(2024-05-20 10:00 +07:00));
        ledger
            .create_tuition_due(&NewTuitionDue {
                student: "Zaid".to_owned(),
                period: Period::new(2024, 4).unwrap(),
                amount: Some(Money::from_major(100)),
                status: TuitionStatus::Paid,
            })
            .unwrap();
        for (amount, used_on) in [
            ("40.00", "2024-04-10"),
            ("1.00", "2024-05-10"),
            ("2.50", "2024-05-11"),
        ] {
            server
                .post(endpoints::FUND_USAGE)
                .json(&usage_body(amount, used_on))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let summary: Value = server
            .get(endpoints::FUND_USAGE_SUMMARY)
            .add_query_param("start", "2024-05-01")
            .add_query_param("category", "operational")
            .await
            .json();
        let investment: Value = server
            .get(endpoints::FUND_USAGE_SUMMARY)
            .add_query_param("category", "investment")
            .await
            .json();

        assert_eq!(
            summary,
            json!({
                "start": "2024-05-01",
                "end": null,
                "category": "operational",
                "count": 2,
                "total": "3.50",
                "average": "1.75",
                "largest": "2.50"
            })
        );
        assert_eq!(investment["count"], 0);
        assert_eq!(investment["total"], "0.00");
    }

    #[tokio::test]
    async fn summary_rejects_a_backwards_range() {
        let (server, _) = get_test_server(datetime!(2024-05-20 10:00 +07:00));

        server
            .get(endpoints::FUND_USAGE_SUMMARY)
            .add_query_param("start", "2024-05-31")
            .add_query_param("end", "2024-05-01")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejects_invalid_allocations() {
        let (server, _) = get_test_server(datetime!(2024-05-20 10:00 +07:00));

        server
            .post(endpoints::FUND_USAGE)
            .json(&usage_body("0", "2024-05-02"))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
