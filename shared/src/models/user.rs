//! User and point models

use serde::{Deserialize, Serialize};

/// User account with its point balance
///
/// `point_balance >= 0` always; mutated only by the point charge operation
/// and the settlement engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub user_name: String,
    pub point_balance: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Point transaction type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Charge,
    Use,
}

/// Append-only point movement record
///
/// `balance_after` equals the user's running balance at write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointHistory {
    pub history_id: i64,
    pub user_id: i64,
    pub tx_type: TransactionType,
    pub amount: i64,
    pub balance_after: i64,
    pub order_id: Option<i64>,
    pub created_at: i64,
}
