//! Order assembly
//!
//! `create_order` resolves line items, computes totals and discount,
//! validates the point spend and commits the stock reservation — all inside
//! one ledger write transaction. A failure anywhere leaves no order record
//! and no stock decrement behind.

mod settlement;

pub use settlement::{PaymentError, PaymentResult, PaymentService};

use crate::ledger::{LedgerStore, ORDER_COUNT_KEY, StorageError};
use crate::money;
use crate::stock::{self, StockError, StockLine};
use redb::WriteTransaction;
use shared::error::{AppError, ErrorCode};
use shared::models::{CreateOrderInput, Order, OrderItem, OrderStatus};
use shared::util;
use std::sync::Arc;
use thiserror::Error;
use validator::Validate;

/// Order errors
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    #[error("Order not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Coupon cannot be applied: {0}")]
    CouponNotApplicable(String),

    #[error("Used points {used_points} exceed payable amount {payable}")]
    PointsExceedPayable { used_points: i64, payable: i64 },

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type OrderResult<T> = Result<T, OrderError>;

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err {
            OrderError::UserNotFound(id) => {
                AppError::with_message(ErrorCode::UserNotFound, message).with_detail("user_id", id)
            }
            OrderError::ProductNotFound(id) => {
                AppError::with_message(ErrorCode::ProductNotFound, message)
                    .with_detail("product_id", id)
            }
            OrderError::NotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, message)
                    .with_detail("order_id", id)
            }
            OrderError::Validation(_) => AppError::validation(message),
            OrderError::CouponNotApplicable(_) => {
                AppError::with_message(ErrorCode::CouponNotApplicable, message)
            }
            OrderError::PointsExceedPayable { .. } => {
                AppError::with_message(ErrorCode::InvalidPointAmount, message)
            }
            OrderError::Stock(e) => AppError::from(e),
            OrderError::Storage(e) => {
                tracing::error!(error = %e, "Storage error in order operation");
                AppError::database(message)
            }
        }
    }
}

/// Order assembly service
pub struct OrderService {
    ledger: Arc<LedgerStore>,
}

impl OrderService {
    pub(crate) fn new(ledger: Arc<LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Create an order in PENDING status
    ///
    /// Stock is committed in the same transaction; when any step fails the
    /// transaction is dropped and nothing is observable.
    pub async fn create_order(&self, input: CreateOrderInput) -> OrderResult<Order> {
        input
            .validate()
            .map_err(|e| OrderError::Validation(e.to_string()))?;

        let txn = self.ledger.begin_write()?;

        // User must exist
        self.ledger
            .get_user_txn(&txn, input.user_id)?
            .ok_or(OrderError::UserNotFound(input.user_id))?;

        // Resolve lines and sum the total
        let mut items = Vec::with_capacity(input.items.len());
        let mut total_amount: i64 = 0;
        for line in &input.items {
            let option = self
                .ledger
                .get_option_txn(&txn, line.product_option_id)?
                .ok_or(StockError::OptionNotFound(line.product_option_id))?;
            let product = self
                .ledger
                .get_product_txn(&txn, option.product_id)?
                .ok_or(OrderError::ProductNotFound(option.product_id))?;

            let unit_price = product.price + option.price_adjustment;
            if !(0..=money::MAX_UNIT_PRICE).contains(&unit_price) {
                return Err(OrderError::Validation(format!(
                    "unit price out of range for option {}",
                    option.product_option_id
                )));
            }
            let subtotal = unit_price * line.quantity;
            total_amount += subtotal;

            items.push(OrderItem {
                product_id: product.product_id,
                product_option_id: option.product_option_id,
                product_name: product.product_name,
                option_name: option.option_name,
                unit_price,
                quantity: line.quantity,
                subtotal,
            });
        }

        // Discount applies only when the caller holds a redeemable coupon;
        // a missing or spent user coupon is ignored, not an error
        let now = util::now_millis();
        let mut discount_amount: i64 = 0;
        let mut applied_coupon = None;
        if let Some(coupon_id) = input.coupon_id
            && let Some(user_coupon) =
                self.ledger.find_user_coupon_txn(&txn, coupon_id, input.user_id)?
            && user_coupon.can_use()
        {
            let coupon = self
                .ledger
                .get_coupon_txn(&txn, coupon_id)?
                .ok_or(OrderError::CouponNotApplicable(format!(
                    "coupon {} no longer exists",
                    coupon_id
                )))?;
            if !coupon.is_valid_at(now) {
                return Err(OrderError::CouponNotApplicable(
                    "coupon is outside its validity window".into(),
                ));
            }
            if total_amount < coupon.min_order_amount {
                return Err(OrderError::CouponNotApplicable(format!(
                    "order total {} is below the coupon minimum {}",
                    total_amount, coupon.min_order_amount
                )));
            }
            discount_amount = money::coupon_discount(&coupon, total_amount);
            applied_coupon = Some(coupon_id);
        }

        // Points beyond the payable amount are rejected, not clamped
        let payable = total_amount - discount_amount;
        if input.used_points > payable {
            return Err(OrderError::PointsExceedPayable {
                used_points: input.used_points,
                payable,
            });
        }
        let final_amount = payable - input.used_points;

        // Commit the stock reservation as part of this transaction
        let order_id = util::snowflake_id();
        let lines: Vec<StockLine> = input
            .items
            .iter()
            .map(|line| StockLine {
                product_option_id: line.product_option_id,
                quantity: line.quantity,
            })
            .collect();
        stock::reserve_all(&self.ledger, &txn, &lines, Some(order_id))?;

        let order = Order {
            order_id,
            order_number: self.next_order_number(&txn)?,
            user_id: input.user_id,
            items,
            total_amount,
            discount_amount,
            used_points: input.used_points,
            final_amount,
            coupon_id: applied_coupon,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            paid_at: None,
        };
        self.ledger.put_order(&txn, &order)?;
        self.ledger.commit(txn)?;

        tracing::info!(
            order_id,
            order_number = %order.order_number,
            total_amount,
            discount_amount,
            used_points = order.used_points,
            "Order created"
        );
        Ok(order)
    }

    /// Get an order by ID
    pub async fn get_order(&self, order_id: i64) -> OrderResult<Order> {
        self.ledger
            .get_order(order_id)?
            .ok_or(OrderError::NotFound(order_id))
    }

    /// All orders of one user, oldest first
    pub async fn orders_of_user(&self, user_id: i64) -> OrderResult<Vec<Order>> {
        Ok(self.ledger.orders_of_user(user_id)?)
    }

    /// Generate the next order number (crash-safe via the ledger counter)
    fn next_order_number(&self, txn: &WriteTransaction) -> OrderResult<String> {
        let count = self.ledger.next_sequence(txn, ORDER_COUNT_KEY)?;
        let date = chrono::Utc::now().format("%Y%m%d");
        Ok(format!("ORD{}{:06}", date, count))
    }
}
