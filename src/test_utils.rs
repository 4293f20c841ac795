use std::sync::{Arc, Mutex};

use axum_test::TestServer;
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    AppState, build_router, clock::FixedClock, config::LedgerConfig, db::initialize,
    ledger::Ledger,
};

/// A ledger over an in-memory database whose clock always reads `now`.
pub(crate) fn get_test_ledger(now: OffsetDateTime) -> Ledger {
    let connection =
        Connection::open_in_memory().expect("Could not open in-memory SQLite database");
    initialize(&connection).expect("Could not initialize the database");

    Ledger::new(
        Arc::new(Mutex::new(connection)),
        Arc::new(FixedClock(now)),
        LedgerConfig::default(),
    )
}

/// A test server for the full router, and the ledger behind it.
pub(crate) fn get_test_server(now: OffsetDateTime) -> (TestServer, Arc<Ledger>) {
    let state = AppState::from_ledger(get_test_ledger(now));
    let ledger = state.ledger.clone();
    let server = TestServer::try_new(build_router(state)).expect("Could not create test server.");

    (server, ledger)
}
