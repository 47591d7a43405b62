//! Product and stock models

use serde::{Deserialize, Serialize};

/// Product entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_id: i64,
    pub product_name: String,
    /// Base price in minor units
    pub price: i64,
    pub created_at: i64,
}

/// Product option — the unit stock is tracked against
///
/// `stock_quantity >= 0` always; `sold_out` mirrors `stock_quantity == 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductOption {
    pub product_option_id: i64,
    pub product_id: i64,
    pub option_name: String,
    /// Added to the product base price to form the unit price
    pub price_adjustment: i64,
    pub stock_quantity: i64,
    pub sold_out: bool,
    pub updated_at: i64,
}

/// Stock movement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockChange {
    Increase,
    Decrease,
}

/// Append-only stock movement record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockHistory {
    pub history_id: i64,
    pub product_option_id: i64,
    pub change: StockChange,
    pub amount: i64,
    /// Option stock right after this movement was applied
    pub stock_after: i64,
    pub order_id: Option<i64>,
    pub created_at: i64,
}
