//! Data models
//!
//! Plain serde records. Every mutable counter (issued_count, stock_quantity,
//! point_balance) is owned by the ledger store; models never mutate
//! themselves outside a ledger write transaction.

pub mod coupon;
pub mod order;
pub mod product;
pub mod user;

pub use coupon::{Coupon, CouponCreate, DiscountType, IssuedCoupon, UserCoupon, UserCouponStatus};
pub use order::{
    CreateOrderInput, Order, OrderItem, OrderItemInput, OrderStatus, PaymentResult,
};
pub use product::{Product, ProductOption, StockChange, StockHistory};
pub use user::{PointHistory, TransactionType, User};
