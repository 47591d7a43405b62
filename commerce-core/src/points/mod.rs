//! Point ledger
//!
//! Charges go through a bounded per-user lock and one write transaction
//! that moves the balance and appends the CHARGE history row together.
//! Debits happen only inside settlement, under the same discipline.

use crate::core::locks::{LockDomain, LockRegistry};
use crate::ledger::{LedgerStore, StorageError};
use crate::money;
use shared::error::{AppError, ErrorCode};
use shared::models::{PointHistory, TransactionType};
use shared::util;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Point errors
#[derive(Debug, Error)]
pub enum PointError {
    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Invalid point amount: {0}")]
    InvalidAmount(i64),

    #[error("Lock wait timed out for user {0}")]
    LockTimeout(i64),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type PointResult<T> = Result<T, PointError>;

impl From<PointError> for AppError {
    fn from(err: PointError) -> Self {
        let message = err.to_string();
        match err {
            PointError::UserNotFound(id) => {
                AppError::with_message(ErrorCode::UserNotFound, message).with_detail("user_id", id)
            }
            PointError::InvalidAmount(amount) => {
                AppError::with_message(ErrorCode::InvalidPointAmount, message)
                    .with_detail("amount", amount)
            }
            PointError::LockTimeout(_) => AppError::with_message(ErrorCode::LockTimeout, message),
            PointError::Storage(e) => {
                tracing::error!(error = %e, "Storage error in point operation");
                AppError::database(message)
            }
        }
    }
}

/// Point balance service
pub struct PointService {
    ledger: Arc<LedgerStore>,
    locks: Arc<LockRegistry>,
    lock_wait: Duration,
}

impl PointService {
    pub(crate) fn new(
        ledger: Arc<LedgerStore>,
        locks: Arc<LockRegistry>,
        lock_wait: Duration,
    ) -> Self {
        Self {
            ledger,
            locks,
            lock_wait,
        }
    }

    /// Charge points onto a user's balance
    pub async fn charge(&self, user_id: i64, amount: i64) -> PointResult<PointHistory> {
        if !(money::MIN_CHARGE_AMOUNT..=money::MAX_CHARGE_AMOUNT).contains(&amount) {
            return Err(PointError::InvalidAmount(amount));
        }

        let _guard = self
            .locks
            .acquire(LockDomain::User, user_id, self.lock_wait)
            .await
            .ok_or(PointError::LockTimeout(user_id))?;

        let txn = self.ledger.begin_write()?;
        let mut user = self
            .ledger
            .get_user_txn(&txn, user_id)?
            .ok_or(PointError::UserNotFound(user_id))?;

        let now = util::now_millis();
        user.point_balance += amount;
        user.updated_at = now;
        self.ledger.put_user(&txn, &user)?;

        let history = PointHistory {
            history_id: util::snowflake_id(),
            user_id,
            tx_type: TransactionType::Charge,
            amount,
            balance_after: user.point_balance,
            order_id: None,
            created_at: now,
        };
        self.ledger.append_point_history(&txn, &history)?;
        self.ledger.commit(txn)?;

        tracing::info!(user_id, amount, balance_after = history.balance_after, "Points charged");
        Ok(history)
    }

    /// Current point balance
    pub async fn balance(&self, user_id: i64) -> PointResult<i64> {
        Ok(self
            .ledger
            .get_user(user_id)?
            .ok_or(PointError::UserNotFound(user_id))?
            .point_balance)
    }

    /// All point movements of one user, in append order
    pub async fn histories(&self, user_id: i64) -> PointResult<Vec<PointHistory>> {
        if self.ledger.get_user(user_id)?.is_none() {
            return Err(PointError::UserNotFound(user_id));
        }
        Ok(self.ledger.point_histories(user_id)?)
    }
}
