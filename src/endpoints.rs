//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/donations/{donation_id}', use
//! [format_endpoint].

/// The route for checking that the server is up.
pub const HEALTH: &str = "/api/health";

/// The route for listing the balance records of a bucket.
pub const BALANCES: &str = "/api/balances/{bucket}";
/// The route for the most recent balance record of a bucket.
pub const LATEST_BALANCE: &str = "/api/balances/{bucket}/latest";
/// The route for totals over a range of a bucket's balance records.
pub const BALANCE_SUMMARY: &str = "/api/balances/{bucket}/summary";
/// The route for the balance record of a bucket in one period.
pub const PERIOD_BALANCE: &str = "/api/balances/{bucket}/{period}";

/// The route to submit and list fund usage.
pub const FUND_USAGE: &str = "/api/fund_usage";
/// The route for totals over fund usage filtered by day and category.
pub const FUND_USAGE_SUMMARY: &str = "/api/fund_usage/summary";
/// The route to edit or delete a single fund usage.
pub const FUND_USAGE_ITEM: &str = "/api/fund_usage/{usage_id}";

/// The route to create tuition dues.
pub const TUITION: &str = "/api/tuition";
/// The route to mark a tuition due as paid or unpaid.
pub const TUITION_STATUS: &str = "/api/tuition/{tuition_id}/status";

/// The route to record donations.
pub const DONATIONS: &str = "/api/donations";
/// The route to delete a single donation.
pub const DONATION: &str = "/api/donations/{donation_id}";

/// The route to recompute every bucket from the start of its history.
pub const LEDGER_SYNC: &str = "/api/ledger/sync";
/// The route to set explicit opening balances.
pub const LEDGER_SEED: &str = "/api/ledger/seed";
/// The route to recompute a bucket over corrupt records.
pub const LEDGER_REPAIR: &str = "/api/ledger/repair";
/// The route to scan the balance records for inconsistencies.
pub const LEDGER_INTEGRITY: &str = "/api/ledger/integrity";

/// Replace the first parameter in `endpoint_path` with `value`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/api/donations/{donation_id}', '{donation_id}' is the
/// parameter. Call this once per parameter for paths with several.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, value: impl std::fmt::Display) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |end| param_start + end + 1);

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        value,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::HEALTH);
        assert_endpoint_is_valid_uri(endpoints::BALANCES);
        assert_endpoint_is_valid_uri(endpoints::LATEST_BALANCE);
        assert_endpoint_is_valid_uri(endpoints::BALANCE_SUMMARY);
        assert_endpoint_is_valid_uri(endpoints::PERIOD_BALANCE);
        assert_endpoint_is_valid_uri(endpoints::FUND_USAGE);
        assert_endpoint_is_valid_uri(endpoints::FUND_USAGE_ITEM);
        assert_endpoint_is_valid_uri(endpoints::TUITION);
        assert_endpoint_is_valid_uri(endpoints::TUITION_STATUS);
        assert_endpoint_is_valid_uri(endpoints::DONATIONS);
        assert_endpoint_is_valid_uri(endpoints::DONATION);
        assert_endpoint_is_valid_uri(endpoints::LEDGER_SYNC);
        assert_endpoint_is_valid_uri(endpoints::LEDGER_SEED);
        assert_endpoint_is_valid_uri(endpoints::LEDGER_REPAIR);
        assert_endpoint_is_valid_uri(endpoints::LEDGER_INTEGRITY);
    }

    #[test]
    fn produces_valid_uri() {
        let formatted_path = format_endpoint("/hello/{world_id}", 1);

        assert_eq!(formatted_path, "/hello/1");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint("/hello/world", 1);

        assert_eq!(formatted_path, "/hello/world");
    }

    #[test]
    fn replaces_one_parameter_at_a_time() {
        let bucket = format_endpoint(endpoints::PERIOD_BALANCE, "tuition");
        let formatted_path = format_endpoint(&bucket, "2024-05");

        assert_eq!(formatted_path, "/api/balances/tuition/2024-05");
        assert!(formatted_path.parse::<Uri>().is_ok());
    }
}
