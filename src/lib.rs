//! Fund ledger keeps monthly balance records for the money an institution holds.
//!
//! Tuition dues, donations and fund usage are recorded as source transactions. The balance
//! recapitulation engine in [ledger] derives an opening balance, income, expenses and a
//! closing balance for every fund bucket and month from them, and keeps those records
//! consistent when transactions are added, edited or deleted after the fact.
//!
//! This library also provides a JSON API over the ledger.

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

pub mod bucket;
pub mod clock;
pub mod config;
pub mod ledger;
pub mod money;
pub mod period;
pub mod sources;

mod api;
mod app_state;
mod database_id;
mod db;
mod endpoints;
mod logging;
mod routing;
mod timezone;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use routing::build_router;

use time::Date;

use crate::{bucket::FundBucket, money::Money, period::Period};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A money amount could not be parsed or is not allowed where it was used.
    #[error("invalid amount \"{0}\"")]
    InvalidAmount(String),

    /// Money arithmetic gave an amount too large to store.
    #[error("the amount {0} is too large to store")]
    AmountOverflow(String),

    /// A period was not a valid `YYYY-MM` month.
    #[error("invalid period \"{0}\", expected YYYY-MM")]
    InvalidPeriod(String),

    /// The name did not match any fund bucket.
    #[error("unknown fund bucket \"{0}\"")]
    UnknownBucket(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// The weights for splitting derived bucket amounts are not usable.
    #[error("invalid split policy: {0}")]
    InvalidSplitPolicy(String),

    /// A fund usage could not be divided into bucket shares.
    #[error("invalid fund usage: {0}")]
    InvalidAllocation(String),

    /// Opening balances could not be seeded.
    #[error("cannot seed opening balances: {0}")]
    InvalidSeed(String),

    /// A range of periods ends before it starts.
    #[error("the range {start} to {end} ends before it starts")]
    InvalidRange {
        /// The first period of the range.
        start: Period,
        /// The last period of the range.
        end: Period,
    },

    /// A range of days ends before it starts.
    #[error("the range {start} to {end} ends before it starts")]
    InvalidDateRange { start: Date, end: Date },

    /// Balances only exist up to the current period.
    #[error("{0} is in the future")]
    FuturePeriod(Period),

    /// A fund usage would take a bucket's balance below zero.
    ///
    /// This is an expected outcome of submitting fund usage rather than a fault.
    #[error("insufficient funds in {bucket} for {period}: requested {requested}, available {available}")]
    InsufficientFunds {
        /// The bucket that cannot pay.
        bucket: FundBucket,
        /// The period the money would be drawn in.
        period: Period,
        /// The amount the bucket was asked to pay.
        requested: Money,
        /// The most the bucket can pay.
        available: Money,
    },

    /// A stored balance record has a closing balance that is not `opening + income - expense`.
    ///
    /// The record is not fixed automatically, see [ledger::Ledger::repair].
    #[error("the {bucket} balance for {period} is corrupt: closing {closing}, expected {expected}")]
    IntegrityViolation {
        /// The bucket of the corrupt record.
        bucket: FundBucket,
        /// The period of the corrupt record.
        period: Period,
        /// The stored closing balance.
        closing: Money,
        /// The closing balance implied by the other amounts.
        expected: Money,
    },

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to update a tuition due that does not exist
    #[error("tried to update a tuition due that is not in the database")]
    UpdateMissingTuition,

    /// Tried to delete a donation that does not exist
    #[error("tried to delete a donation that is not in the database")]
    DeleteMissingDonation,

    /// Tried to update a fund usage that does not exist
    #[error("tried to update a fund usage that is not in the database")]
    UpdateMissingFundUsage,

    /// Tried to delete a fund usage that does not exist
    #[error("tried to delete a fund usage that is not in the database")]
    DeleteMissingFundUsage,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A blocking ledger task panicked or was cancelled.
    #[error("a background task failed: {0}")]
    BackgroundTaskFailed(String),
}

impl Error {
    /// Whether the same operation may succeed if it is tried again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::SqlError(_) | Error::DatabaseLockError)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidAmount(_)
            | Error::InvalidPeriod(_)
            | Error::UnknownBucket(_)
            | Error::InvalidAllocation(_)
            | Error::InvalidRange { .. }
            | Error::InvalidDateRange { .. }
            | Error::FuturePeriod(_) => StatusCode::BAD_REQUEST,
            Error::InsufficientFunds { .. }
            | Error::InvalidSeed(_)
            | Error::AmountOverflow(_) => StatusCode::CONFLICT,
            Error::NotFound
            | Error::UpdateMissingTuition
            | Error::DeleteMissingDonation
            | Error::UpdateMissingFundUsage
            | Error::DeleteMissingFundUsage => StatusCode::NOT_FOUND,
            Error::DatabaseLockError => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidTimezoneError(_)
            | Error::InvalidSplitPolicy(_)
            | Error::IntegrityViolation { .. }
            | Error::SqlError(_)
            | Error::BackgroundTaskFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match self {
            Error::SqlError(_) | Error::BackgroundTaskFailed(_) => {
                // Not intended to be shown to the client.
                tracing::error!("An unexpected error occurred: {}", self);
                "An unexpected error occurred, check the server logs for more details.".to_owned()
            }
            error => error.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::{Error, bucket::FundBucket, money::Money};

    #[test]
    fn missing_rows_map_to_not_found() {
        assert_eq!(
            Error::from(rusqlite::Error::QueryReturnedNoRows),
            Error::NotFound
        );
    }

    #[test]
    fn insufficient_funds_is_a_conflict() {
        let error = Error::InsufficientFunds {
            bucket: FundBucket::Tuition,
            period: "2024-05".parse().unwrap(),
            requested: Money::from_major(150),
            available: Money::from_major(100),
        };

        assert!(!error.is_retryable());
        assert_eq!(error.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn lock_errors_can_be_retried() {
        assert!(Error::DatabaseLockError.is_retryable());
        assert_eq!(
            Error::DatabaseLockError.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
