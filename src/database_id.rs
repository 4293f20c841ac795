//! Row IDs of the source tables.

/// The SQLite `INTEGER PRIMARY KEY` of a tuition due, donation or fund usage.
pub type DatabaseId = i64;
