//! The API endpoint URIs.

/// The root route which redirects to the balances page.
pub const ROOT: &str = "/";
/// The page displaying the current balance and recent balance history.
pub const BALANCES_VIEW: &str = "/balances";
/// The page for importing transactions from CSV statement exports.
pub const IMPORT_VIEW: &str = "/import";
/// The page for managing stored data.
pub const SETTINGS_VIEW: &str = "/settings";

/// The route to upload CSV files for importing transactions.
pub const IMPORT: &str = "/api/import";
/// The route serving an on-demand balance series for a date range.
pub const BALANCES_API: &str = "/api/balances";
/// The route serving the materialized daily balance snapshots for a date range.
pub const BALANCES_DAILY_API: &str = "/api/balances/daily";
/// The route that soft deletes all stored data of the user.
pub const DELETE_DATA: &str = "/api/settings/delete_data";
/// The route that physically deletes the user and all their data.
pub const DELETE_ACCOUNT: &str = "/api/settings/delete_account";
