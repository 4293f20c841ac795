use std::{fs::OpenOptions, net::SocketAddr, process::exit, sync::Arc};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use fund_ledger::{
    AppState, build_router,
    config::{DEFAULT_TIMEZONE, LedgerConfig, SplitPolicy},
    graceful_shutdown, logging_middleware,
};

/// The REST API server for fund_ledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The canonical timezone used to assign timestamps to months, e.g. "Asia/Jakarta".
    #[arg(long, default_value = DEFAULT_TIMEZONE)]
    timezone: String,

    /// How fund usage paid from the combined bucket is split, e.g. "tuition=50,donation=50".
    #[arg(long, default_value = "tuition=50,donation=50")]
    combined_split: SplitPolicy,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let conn = match Connection::open(&args.db_path) {
        Ok(conn) => conn,
        Err(error) => {
            tracing::error!("Could not open database at {}: {error}", args.db_path);
            exit(1);
        }
    };

    let config = LedgerConfig {
        local_timezone: args.timezone,
        split_policy: args.combined_split,
    };

    let state = match AppState::new(conn, config) {
        Ok(state) => state,
        Err(error) => {
            tracing::error!("Could not start the ledger: {error}");
            exit(1);
        }
    };

    // Balances may be behind if the server was stopped before the current month started.
    let ledger = state.ledger.clone();
    match tokio::task::spawn_blocking(move || ledger.sync_all()).await {
        Ok(Ok(reports)) => tracing::info!("synced {} buckets on startup", reports.len()),
        Ok(Err(error)) => tracing::error!("Could not sync balances on startup: {error}"),
        Err(error) => tracing::error!("Startup sync did not finish: {error}"),
    }

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(
        build_router(state).layer(middleware::from_fn(logging_middleware)),
    );

    tracing::info!("HTTP server listening on {}", addr);
    if let Err(error) = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
    {
        tracing::error!("Server stopped with an error: {error}");
        exit(1);
    }
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Ledger errors are logged where they happen.
        .on_failure(());

    router.layer(tracing_layer)
}
