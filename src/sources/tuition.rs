//! Tuition dues: one row per student per month, income once marked paid.

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, database_id::DatabaseId, money::Money, period::Period};

pub type TuitionId = DatabaseId;

/// The monthly tuition charged when no amount is given.
pub const DEFAULT_TUITION_AMOUNT: Money = Money::from_major(110_000);

/// Whether a tuition due has been paid.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuitionStatus {
    #[default]
    Unpaid,
    Paid,
}

impl TuitionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TuitionStatus::Unpaid => "unpaid",
            TuitionStatus::Paid => "paid",
        }
    }
}

impl ToSql for TuitionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TuitionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "unpaid" => Ok(TuitionStatus::Unpaid),
            "paid" => Ok(TuitionStatus::Paid),
            other => Err(FromSqlError::Other(
                format!("invalid tuition status \"{other}\"").into(),
            )),
        }
    }
}

/// A tuition charge for one student for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuitionDue {
    pub id: TuitionId,
    /// The name or external ID of the student being charged.
    pub student: String,
    pub period: Period,
    pub amount: Money,
    pub status: TuitionStatus,
}

/// The data needed to create a [TuitionDue].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewTuitionDue {
    pub student: String,
    pub period: Period,
    /// Defaults to [DEFAULT_TUITION_AMOUNT].
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub status: TuitionStatus,
}

pub fn create_tuition_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS tuition_due (
            id INTEGER PRIMARY KEY,
            student TEXT NOT NULL,
            period TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount >= 0),
            status TEXT NOT NULL CHECK (status IN ('unpaid', 'paid'))
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_tuition_due_period ON tuition_due(period, status)",
        (),
    )?;

    Ok(())
}

fn map_tuition_row(row: &Row) -> Result<TuitionDue, rusqlite::Error> {
    Ok(TuitionDue {
        id: row.get(0)?,
        student: row.get(1)?,
        period: row.get(2)?,
        amount: row.get(3)?,
        status: row.get(4)?,
    })
}

/// Create a tuition due.
///
/// # Errors
/// Returns [Error::InvalidAmount] for a negative amount or one over [Money::MAX_INPUT], or
/// [Error::SqlError] if the insert fails.
pub fn create_tuition_due(
    new_due: &NewTuitionDue,
    connection: &Connection,
) -> Result<TuitionDue, Error> {
    let amount = new_due.amount.unwrap_or(DEFAULT_TUITION_AMOUNT);
    if amount.is_negative() {
        return Err(Error::InvalidAmount(amount.to_string()));
    }
    let amount = amount.within_input_limit()?;

    connection
        .prepare(
            "INSERT INTO tuition_due (student, period, amount, status)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, student, period, amount, status",
        )?
        .query_row(
            (&new_due.student, new_due.period, amount, new_due.status),
            map_tuition_row,
        )
        .map_err(Error::from)
}

/// # Errors
/// Returns [Error::NotFound] if there is no tuition due with `id`.
pub fn get_tuition_due(id: TuitionId, connection: &Connection) -> Result<TuitionDue, Error> {
    connection
        .prepare("SELECT id, student, period, amount, status FROM tuition_due WHERE id = ?1")?
        .query_row([id], map_tuition_row)
        .map_err(Error::from)
}

/// Change the paid status of a tuition due and return the updated row.
///
/// # Errors
/// Returns [Error::UpdateMissingTuition] if there is no tuition due with `id`.
pub fn update_tuition_status(
    id: TuitionId,
    status: TuitionStatus,
    connection: &Connection,
) -> Result<TuitionDue, Error> {
    connection
        .prepare(
            "UPDATE tuition_due SET status = ?1 WHERE id = ?2
             RETURNING id, student, period, amount, status",
        )?
        .query_row((status, id), map_tuition_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UpdateMissingTuition,
            error => error.into(),
        })
}

/// The total of the paid tuition dues for `period`.
pub fn sum_paid_tuition(period: Period, connection: &Connection) -> Result<Money, Error> {
    connection
        .prepare(
            "SELECT COALESCE(SUM(amount), 0) FROM tuition_due
             WHERE period = ?1 AND status = 'paid'",
        )?
        .query_row([period], |row| row.get(0))
        .map_err(Error::from)
}

/// The earliest period with a paid tuition due, if any.
pub fn earliest_paid_period(connection: &Connection) -> Result<Option<Period>, Error> {
    connection
        .prepare("SELECT MIN(period) FROM tuition_due WHERE status = 'paid'")?
        .query_row([], |row| row.get(0))
        .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use crate::{Error, money::Money, period::Period};

    use super::{
        DEFAULT_TUITION_AMOUNT, NewTuitionDue, TuitionStatus, create_tuition_due,
        create_tuition_table, earliest_paid_period, get_tuition_due, sum_paid_tuition,
        update_tuition_status,
    };

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        create_tuition_table(&connection).unwrap();
        connection
    }

    fn new_due(period: &str, amount: Option<Money>, status: TuitionStatus) -> NewTuitionDue {
        NewTuitionDue {
            student: "Aisyah".to_owned(),
            period: period.parse().unwrap(),
            amount,
            status,
        }
    }

    #[test]
    fn create_uses_default_amount() {
        let connection = get_test_connection();

        let due = create_tuition_due(&new_due("2024-05", None, TuitionStatus::Unpaid), &connection)
            .unwrap();

        assert_eq!(due.amount, DEFAULT_TUITION_AMOUNT);
        assert_eq!(get_tuition_due(due.id, &connection), Ok(due));
    }

    #[test]
    fn only_paid_dues_count_as_income() {
        let connection = get_test_connection();
        let may: Period = "2024-05".parse().unwrap();
        create_tuition_due(
            &new_due("2024-05", Some(Money::from_major(100)), TuitionStatus::Paid),
            &connection,
        )
        .unwrap();
        create_tuition_due(
            &new_due("2024-05", Some(Money::from_major(40)), TuitionStatus::Unpaid),
            &connection,
        )
        .unwrap();
        create_tuition_due(
            &new_due("2024-06", Some(Money::from_major(7)), TuitionStatus::Paid),
            &connection,
        )
        .unwrap();

        assert_eq!(sum_paid_tuition(may, &connection), Ok(Money::from_major(100)));
        assert_eq!(earliest_paid_period(&connection), Ok(Some(may)));
    }

    #[test]
    fn sum_is_zero_without_dues() {
        let connection = get_test_connection();

        assert_eq!(
            sum_paid_tuition("2024-01".parse().unwrap(), &connection),
            Ok(Money::ZERO)
        );
        assert_eq!(earliest_paid_period(&connection), Ok(None));
    }

    #[test]
    fn update_status_marks_paid() {
        let connection = get_test_connection();
        let due = create_tuition_due(&new_due("2024-05", None, TuitionStatus::Unpaid), &connection)
            .unwrap();

        let updated = update_tuition_status(due.id, TuitionStatus::Paid, &connection).unwrap();

        assert_eq!(updated.status, TuitionStatus::Paid);
        assert_eq!(
            update_tuition_status(due.id + 1, TuitionStatus::Paid, &connection),
            Err(Error::UpdateMissingTuition)
        );
    }

    #[test]
    fn rejects_negative_amounts() {
        let connection = get_test_connection();

        let result = create_tuition_due(
            &new_due("2024-05", Some(Money::from_minor(-1)), TuitionStatus::Paid),
            &connection,
        );

        assert_eq!(result, Err(Error::InvalidAmount("-0.01".to_owned())));
    }
}
