//! Donations: income for the donation bucket in the month they were received.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, database_id::DatabaseId, money::Money, period::Period};

pub type DonationId = DatabaseId;

/// The donor name recorded when none is given.
pub const ANONYMOUS_DONOR: &str = "Anonymous";

/// Money given to the institution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Donation {
    pub id: DonationId,
    pub donor: String,
    pub amount: Money,
    /// When the donation was received.
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
    /// The calendar month containing `recorded_at` in the institution's local time.
    pub period: Period,
}

/// The data needed to record a [Donation].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewDonation {
    #[serde(default)]
    pub donor: Option<String>,
    pub amount: Money,
    /// Defaults to the current time.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub recorded_at: Option<OffsetDateTime>,
}

pub fn create_donation_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS donation (
            id INTEGER PRIMARY KEY,
            donor TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount > 0),
            recorded_at TEXT NOT NULL,
            period TEXT NOT NULL
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_donation_period ON donation(period)",
        (),
    )?;

    Ok(())
}

fn map_donation_row(row: &Row) -> Result<Donation, rusqlite::Error> {
    Ok(Donation {
        id: row.get(0)?,
        donor: row.get(1)?,
        amount: row.get(2)?,
        recorded_at: row.get(3)?,
        period: row.get(4)?,
    })
}

/// Insert a donation.
///
/// `recorded_at` should already be in local time: the period is taken from its calendar date.
///
/// # Errors
/// Returns [Error::InvalidAmount] if `amount` is not positive or over [Money::MAX_INPUT], and
/// [Error::InvalidPeriod] if `recorded_at` is outside the four-digit years. Nothing is written
/// in either case.
pub fn insert_donation(
    donor: &str,
    amount: Money,
    recorded_at: OffsetDateTime,
    connection: &Connection,
) -> Result<Donation, Error> {
    if !amount.is_positive() {
        return Err(Error::InvalidAmount(amount.to_string()));
    }
    let amount = amount.within_input_limit()?;
    let period = Period::containing_timestamp(recorded_at)?;

    let donor = if donor.trim().is_empty() {
        ANONYMOUS_DONOR
    } else {
        donor.trim()
    };

    connection
        .prepare(
            "INSERT INTO donation (donor, amount, recorded_at, period)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, donor, amount, recorded_at, period",
        )?
        .query_row(
            (donor, amount, recorded_at, period),
            map_donation_row,
        )
        .map_err(Error::from)
}

/// # Errors
/// Returns [Error::NotFound] if there is no donation with `id`.
pub fn get_donation(id: DonationId, connection: &Connection) -> Result<Donation, Error> {
    connection
        .prepare("SELECT id, donor, amount, recorded_at, period FROM donation WHERE id = ?1")?
        .query_row([id], map_donation_row)
        .map_err(Error::from)
}

/// Delete a donation and return it.
///
/// # Errors
/// Returns [Error::DeleteMissingDonation] if there is no donation with `id`.
pub fn delete_donation(id: DonationId, connection: &Connection) -> Result<Donation, Error> {
    connection
        .prepare(
            "DELETE FROM donation WHERE id = ?1
             RETURNING id, donor, amount, recorded_at, period",
        )?
        .query_row([id], map_donation_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::DeleteMissingDonation,
            error => error.into(),
        })
}

/// The total of the donations received in `period`.
pub fn sum_donations(period: Period, connection: &Connection) -> Result<Money, Error> {
    connection
        .prepare("SELECT COALESCE(SUM(amount), 0) FROM donation WHERE period = ?1")?
        .query_row([period], |row| row.get(0))
        .map_err(Error::from)
}

/// The earliest period with a donation, if any.
pub fn earliest_donation_period(connection: &Connection) -> Result<Option<Period>, Error> {
    connection
        .prepare("SELECT MIN(period) FROM donation")?
        .query_row([], |row| row.get(0))
        .map_err(Error::from)
}
