//! Reconstructing and serving the daily account balance history.

mod anchor;
mod api;
mod balances_page;
mod service;
mod snapshot;
mod walker;

pub use anchor::{BalanceAnchor, resolve_anchor};
pub use api::{BalanceApiState, get_balance_range, get_materialized_range};
pub use balances_page::get_balances_page;
pub use service::{balance_range, current_balance, materialized_range};
pub use snapshot::{
    DailyBalance, create_balance_daily_table, delete_balances_for_user, list_balance_range,
    materialize_series,
};
pub use walker::{BalancePoint, balance_at, last_30_days, sum_by_date, walk_range};
