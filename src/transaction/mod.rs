//! The transaction ledger: models and database queries.

mod core;

pub use core::{
    RecordStatus, Transaction, TransactionBuilder, count_active_transactions,
    create_transaction_table, hard_delete_transactions_for_user, insert_transactions,
    list_active_transactions, map_transaction_row, soft_delete_transactions_for_user,
};
