//! Importing transactions from bank statement CSV exports.

mod csv;
mod dedup;
mod fingerprint;
mod import_endpoint;
mod import_page;
mod service;
mod text;

pub use csv::{ParsedStatement, parse_statement};
pub use dedup::{BatchMerge, merge_batch, sample_description};
pub use fingerprint::{builder_fingerprint, transaction_fingerprint};
pub use import_endpoint::{ImportState, import_statement_endpoint};
pub use import_page::get_import_page;
pub use service::{ImportOutcome, MAX_UPLOAD_BYTES, import_statement};
