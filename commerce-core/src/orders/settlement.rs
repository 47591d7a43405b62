//! Settlement engine
//!
//! Payment applies every side effect — point debit with its history row,
//! coupon redemption, PENDING→PAID — in one ledger write transaction. When
//! any sub-step fails, the transaction is dropped, the order stays PENDING
//! and the caller is told why; no partial effect is ever observable.

use crate::core::locks::{LockDomain, LockRegistry};
use crate::ledger::{LedgerStore, StorageError};
use crate::stock::{self, StockError, StockLine};
use shared::error::{AppError, ErrorCode};
use shared::models::{
    Order, OrderStatus, PointHistory, TransactionType, UserCouponStatus,
};
use shared::util;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use shared::models::PaymentResult;

/// Payment errors
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Order not found: {0}")]
    OrderNotFound(i64),

    #[error("Order {order_id} is {status:?}, only PENDING orders can be settled")]
    InvalidOrderStatus { order_id: i64, status: OrderStatus },

    #[error("Insufficient points: required {required}, balance {balance}")]
    PointInsufficient { required: i64, balance: i64 },

    #[error("Coupon already used: user_coupon {0}")]
    CouponAlreadyUsed(i64),

    #[error("Lock wait timed out for order {0}")]
    LockTimeout(i64),

    #[error("Consistency failure: {0}")]
    Consistency(String),

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type SettlementResult<T> = Result<T, PaymentError>;

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        let message = err.to_string();
        match err {
            PaymentError::OrderNotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, message)
                    .with_detail("order_id", id)
            }
            PaymentError::InvalidOrderStatus { order_id, .. } => {
                AppError::with_message(ErrorCode::InvalidOrderStatus, message)
                    .with_detail("order_id", order_id)
            }
            PaymentError::PointInsufficient { required, balance } => {
                AppError::with_message(ErrorCode::PointInsufficient, message)
                    .with_detail("required", required)
                    .with_detail("balance", balance)
            }
            PaymentError::CouponAlreadyUsed(id) => {
                AppError::with_message(ErrorCode::CouponAlreadyUsed, message)
                    .with_detail("user_coupon_id", id)
            }
            PaymentError::LockTimeout(_) => {
                AppError::with_message(ErrorCode::LockTimeout, message)
            }
            PaymentError::Consistency(_) => {
                tracing::error!(error = %message, "Consistency failure during settlement");
                AppError::with_message(ErrorCode::ConsistencyFailure, message)
            }
            PaymentError::Stock(e) => AppError::from(e),
            PaymentError::Storage(e) => {
                tracing::error!(error = %e, "Storage error in settlement");
                AppError::database(message)
            }
        }
    }
}

/// Settlement service
pub struct PaymentService {
    ledger: Arc<LedgerStore>,
    locks: Arc<LockRegistry>,
    lock_wait: Duration,
}

impl PaymentService {
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

    /// Settle a PENDING order
    pub async fn pay(&self, order_id: i64) -> SettlementResult<PaymentResult> {
        // Lock order is always order → user, so pay and cancel never deadlock
        let _order_guard = self
            .locks
            .acquire(LockDomain::Order, order_id, self.lock_wait)
            .await
            .ok_or(PaymentError::LockTimeout(order_id))?;

        let peek = self
            .ledger
            .get_order(order_id)?
            .ok_or(PaymentError::OrderNotFound(order_id))?;
        let _user_guard = if peek.used_points > 0 {
            Some(
                self.locks
                    .acquire(LockDomain::User, peek.user_id, self.lock_wait)
                    .await
                    .ok_or(PaymentError::LockTimeout(order_id))?,
            )
        } else {
            None
        };

        let txn = self.ledger.begin_write()?;
        let mut order = self
            .ledger
            .get_order_txn(&txn, order_id)?
            .ok_or(PaymentError::OrderNotFound(order_id))?;

        // Double payment and cancelled orders are rejected, never absorbed
        if !order.can_pay() {
            return Err(PaymentError::InvalidOrderStatus {
                order_id,
                status: order.status,
            });
        }

        let now = util::now_millis();

        // 1. Point debit + USE history
        if order.used_points > 0 {
            let mut user = self
                .ledger
                .get_user_txn(&txn, order.user_id)?
                .ok_or_else(|| {
                    PaymentError::Consistency(format!(
                        "order {} references missing user {}",
                        order_id, order.user_id
                    ))
                })?;
            if user.point_balance < order.used_points {
                return Err(PaymentError::PointInsufficient {
                    required: order.used_points,
                    balance: user.point_balance,
                });
            }
            user.point_balance -= order.used_points;
            user.updated_at = now;
            self.ledger.put_user(&txn, &user)?;
            self.ledger.append_point_history(
                &txn,
                &PointHistory {
                    history_id: util::snowflake_id(),
                    user_id: user.user_id,
                    tx_type: TransactionType::Use,
                    amount: order.used_points,
                    balance_after: user.point_balance,
                    order_id: Some(order_id),
                    created_at: now,
                },
            )?;
        }

        // 2. Coupon redemption (monotonic ACTIVE → USED)
        if let Some(coupon_id) = order.coupon_id {
            let mut user_coupon = self
                .ledger
                .find_user_coupon_txn(&txn, coupon_id, order.user_id)?
                .ok_or_else(|| {
                    PaymentError::Consistency(format!(
                        "order {} references coupon {} never issued to user {}",
                        order_id, coupon_id, order.user_id
                    ))
                })?;
            if user_coupon.status == UserCouponStatus::Used {
                return Err(PaymentError::CouponAlreadyUsed(user_coupon.user_coupon_id));
            }
            user_coupon.status = UserCouponStatus::Used;
            user_coupon.used_at = Some(now);
            user_coupon.order_id = Some(order_id);
            self.ledger.put_user_coupon(&txn, &user_coupon)?;
        }

        // 3. Status transition
        order.status = OrderStatus::Paid;
        order.paid_at = Some(now);
        order.updated_at = now;
        self.ledger.put_order(&txn, &order)?;

        self.ledger.commit(txn)?;
        tracing::info!(
            order_id,
            order_number = %order.order_number,
            final_amount = order.final_amount,
            used_points = order.used_points,
            "Order settled"
        );

        Ok(PaymentResult {
            order_id,
            order_number: order.order_number,
            status: order.status,
            final_amount: order.final_amount,
            paid_at: now,
        })
    }

    /// Cancel a PENDING order, restoring its stock
    pub async fn cancel(&self, order_id: i64) -> SettlementResult<Order> {
        let _order_guard = self
            .locks
            .acquire(LockDomain::Order, order_id, self.lock_wait)
            .await
            .ok_or(PaymentError::LockTimeout(order_id))?;

        let txn = self.ledger.begin_write()?;
        let mut order = self
            .ledger
            .get_order_txn(&txn, order_id)?
            .ok_or(PaymentError::OrderNotFound(order_id))?;

        if order.status != OrderStatus::Pending {
            return Err(PaymentError::InvalidOrderStatus {
                order_id,
                status: order.status,
            });
        }

        // 补偿: 恢复库存
        let lines: Vec<StockLine> = order
            .items
            .iter()
            .map(|item| StockLine {
                product_option_id: item.product_option_id,
                quantity: item.quantity,
            })
            .collect();
        stock::release_all(&self.ledger, &txn, &lines, Some(order_id))?;

        order.status = OrderStatus::Cancelled;
        order.updated_at = util::now_millis();
        self.ledger.put_order(&txn, &order)?;
        self.ledger.commit(txn)?;

        tracing::info!(order_id, order_number = %order.order_number, "Order cancelled");
        Ok(order)
    }
}
