//! Route handlers for tuition dues and donations.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::{
    Error,
    api::LedgerState,
    sources::{
        Donation, DonationId, NewDonation, NewTuitionDue, TuitionDue, TuitionId, TuitionStatus,
    },
};

/// The body of a request to change a tuition due's status.
#[derive(Debug, Deserialize)]
pub struct TuitionStatusForm {
    status: TuitionStatus,
}

/// A route handler for creating a tuition due, responds with 201 and the stored due.
pub async fn create_tuition_endpoint(
    State(state): State<LedgerState>,
    Json(new_due): Json<NewTuitionDue>,
) -> Result<(StatusCode, Json<TuitionDue>), Error> {
    state
        .run(move |ledger| ledger.create_tuition_due(&new_due))
        .await
        .map(|due| (StatusCode::CREATED, Json(due)))
}

/// A route handler for marking a tuition due as paid or unpaid.
pub async fn set_tuition_status_endpoint(
    State(state): State<LedgerState>,
    Path(tuition_id): Path<TuitionId>,
    Json(form): Json<TuitionStatusForm>,
) -> Result<Json<TuitionDue>, Error> {
    state
        .run(move |ledger| ledger.set_tuition_status(tuition_id, form.status))
        .await
        .map(Json)
}

/// A route handler for recording a donation, responds with 201 and the stored donation.
pub async fn record_donation_endpoint(
    State(state): State<LedgerState>,
    Json(new_donation): Json<NewDonation>,
) -> Result<(StatusCode, Json<Donation>), Error> {
    state
        .run(move |ledger| ledger.record_donation(&new_donation))
        .await
        .map(|donation| (StatusCode::CREATED, Json(donation)))
}

/// A route handler for deleting a donation, responds with the deleted donation.
pub async fn delete_donation_endpoint(
    State(state): State<LedgerState>,
    Path(donation_id): Path<DonationId>,
) -> Result<Json<Donation>, Error> {
    state
        .run(move |ledger| ledger.delete_donation(donation_id))
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
        test_utils::get_test_server,
    };

    #[tokio::test]
    async fn paying_tuition_updates_tuition_and_combined() {
        let (server, ledger) = get_test_server(datetime!(2024-05-20 10:00 +07:00));

        let due: Value = server
            .post(endpoints::TUITION)
            .json(&json!({ "student": "Maryam", "period": "2024-05" }))
            .await
            .json();
        assert_eq!(due["status"], "unpaid");
        assert_eq!(due["amount"], "110000.00");

        server
            .put(&format_endpoint(endpoints::TUITION_STATUS, &due["id"]))
            .json(&json!({ "status": "paid" }))
            .await
            .assert_status_ok();

        let may = Period::new(2024, 5).unwrap();
        for bucket in [FundBucket::Tuition, FundBucket::Combined] {
            let record = ledger.get_balance(bucket, may).unwrap();
            assert_eq!(record.opening, Money::ZERO);
            assert_eq!(record.income, Money::from_major(110_000));
            assert_eq!(record.expense, Money::ZERO);
            assert_eq!(record.closing, Money::from_major(110_000));
        }
    }

    #[tokio::test]
    async fn missing_tuition_due_is_not_found() {
        let (server, _) = get_test_server(datetime!(2024-05-20 10:00 +07:00));

        server
            .put(&format_endpoint(endpoints::TUITION_STATUS, 42))
            .json(&json!({ "status": "paid" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn donations_use_the_local_month() {
        let (server, ledger) = get_test_server(datetime!(2024-05-20 10:00 +07:00));

        let donation: Value = server
            .post(endpoints::DONATIONS)
            .json(&json!({ "amount": "250.00", "recorded_at": "2024-04-30T18:30:00Z" }))
            .await
            .json();

        assert_eq!(donation["period"], "2024-05");
        assert_eq!(donation["donor"], "Anonymous");
        assert_eq!(
            ledger
                .get_balance(FundBucket::Donation, Period::new(2024, 5).unwrap())
                .unwrap()
                .income,
            Money::from_major(250)
        );

        server
            .delete(&format_endpoint(endpoints::DONATION, &donation["id"]))
            .await
            .assert_status_ok();
        assert_eq!(
            ledger
                .get_balance(FundBucket::Donation, Period::new(2024, 5).unwrap())
                .unwrap()
                .income,
            Money::ZERO
        );
    }

    #[tokio::test]
    async fn rejects_non_positive_donations() {
        let (server, _) = get_test_server(datetime!(2024-05-20 10:00 +07:00));

        server
            .post(endpoints::DONATIONS)
            .json(&json!({ "amount": "-5" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
