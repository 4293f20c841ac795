use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use time::Duration;

use fund_ledger::{
    bucket::FundBucket,
    config::LedgerConfig,
    ledger::Ledger,
    money::Money,
    sources::{Allocation, NewDonation, NewFundUsage, NewTuitionDue, TuitionStatus, UsageCategory},
};

/// A utility for creating a test database for the REST API server of fund_ledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,

    /// How many months of history to generate, ending with the current month.
    #[arg(long, short, default_value_t = 6)]
    months: u32,
}

const STUDENTS: [&str; 4] = ["Aisyah", "Budi", "Citra", "Dimas"];

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;
    let ledger = Ledger::open(conn, LedgerConfig::default())?;

    let current = ledger.current_period()?;
    let mut period = current;
    for _ in 1..args.months {
        period = period.previous().ok_or("Too many months of history requested")?;
    }

    println!("Creating source transactions from {period} to {current}...");

    for (month, period) in period.through(current).enumerate() {
        for (index, student) in STUDENTS.iter().enumerate() {
            // The last student is always a month behind on payments.
            let status = if index + 1 == STUDENTS.len() && period == current {
                TuitionStatus::Unpaid
            } else {
                TuitionStatus::Paid
            };

            ledger.create_tuition_due(&NewTuitionDue {
                student: (*student).to_owned(),
                period,
                amount: None,
                status,
            })?;
        }

        let first_day = period.first_day()?;
        let received = first_day.with_hms(9, 30, 0)?.assume_offset(time::macros::offset!(+7));
        ledger.record_donation(&NewDonation {
            donor: (month % 2 == 0).then(|| "Yayasan Pelita".to_owned()),
            amount: Money::from_major(50_000 + 10_000 * month as i64),
            recorded_at: Some(received + Duration::days(3)),
        })?;

        ledger.submit_fund_usage(&NewFundUsage {
            title: "Electricity".to_owned(),
            description: String::new(),
            category: UsageCategory::Operational,
            used_on: first_day + Duration::days(14),
            allocation: Allocation::Single {
                bucket: FundBucket::Tuition,
                amount: Money::from_major(150_000),
            },
        })?;

        ledger.submit_fund_usage(&NewFundUsage {
            title: "Classroom supplies".to_owned(),
            description: "Shared between tuition and donations.".to_owned(),
            category: UsageCategory::Other,
            used_on: first_day + Duration::days(20),
            allocation: Allocation::Single {
                bucket: FundBucket::Combined,
                amount: Money::from_major(60_000),
            },
        })?;
    }

    let report = ledger.verify_integrity()?;
    println!("Checked {} balance records.", report.checked);

    println!("Success!");

    Ok(())
}
