//! Order models

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Order lifecycle
///
/// Transitions are PENDING → PAID and PENDING → CANCELLED only. A failed
/// settlement leaves the order PENDING for retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
}

/// Resolved order line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: i64,
    pub product_option_id: i64,
    pub product_name: String,
    pub option_name: String,
    /// Product base price plus option adjustment, in minor units
    pub unit_price: i64,
    pub quantity: i64,
    pub subtotal: i64,
}

/// Order entity
///
/// `final_amount = total_amount - discount_amount - used_points`, never
/// negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: i64,
    pub order_number: String,
    pub user_id: i64,
    pub items: Vec<OrderItem>,
    pub total_amount: i64,
    pub discount_amount: i64,
    pub used_points: i64,
    pub final_amount: i64,
    /// Set only when a redeemable user coupon was actually applied
    pub coupon_id: Option<i64>,
    pub status: OrderStatus,
    pub created_at: i64,
    pub updated_at: i64,
    pub paid_at: Option<i64>,
}

impl Order {
    /// Whether the order can still be paid
    pub fn can_pay(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}

/// Requested order line
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderItemInput {
    pub product_option_id: i64,
    #[validate(range(min = 1, max = 9999))]
    pub quantity: i64,
}

/// Create order payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub user_id: i64,
    #[validate(length(min = 1), nested)]
    pub items: Vec<OrderItemInput>,
    pub coupon_id: Option<i64>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub used_points: i64,
}

/// Settlement result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    pub order_id: i64,
    pub order_number: String,
    pub status: OrderStatus,
    pub final_amount: i64,
    pub paid_at: i64,
}
