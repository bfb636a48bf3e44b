//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// The ID of a row in the transaction table.
pub type TransactionId = i64;

/// The ID of a row in the statement artifact table.
pub type ArtifactId = i64;

/// The ID of a row in the user table.
pub type UserId = i64;
