//! End-to-end scenario and concurrency suites
//!
//! Both issuance strategies run the same contract scenarios; the strategy
//! under test is selected per case through the shared helpers.


use crate::Commerce;
use crate::core::config::{Config, IssuanceStrategyKind};
use shared::models::{CouponCreate, DiscountType};

pub(crate) const BOTH_STRATEGIES: [IssuanceStrategyKind; 2] = [
    IssuanceStrategyKind::Pessimistic,
    IssuanceStrategyKind::FastCache,
];

pub(crate) fn commerce(kind: IssuanceStrategyKind) -> Commerce {
    let mut config = Config::with_strategy(kind);
    config.lock_wait_ms = 5000;
    Commerce::open_in_memory(config).unwrap()
}

pub(crate) async fn seed_coupon(
    app: &Commerce,
    discount_type: DiscountType,
    discount_value: i64,
    max_issue_count: u32,
) -> i64 {
    app.coupons
        .create_coupon(CouponCreate {
            coupon_name: "launch coupon".into(),
            discount_type,
            discount_value,
            min_order_amount: 0,
            max_issue_count,
            valid_from: 0,
            valid_to: i64::MAX,
        })
        .await
        .unwrap()
        .coupon_id
}

/// One product with one option; returns the option id
pub(crate) fn seed_catalog(app: &Commerce, price: i64, stock: i64) -> i64 {
    let product = app.create_product("americano", price).unwrap();
    app.create_product_option(product.product_id, "tall", 0, stock)
        .unwrap()
        .product_option_id
}
