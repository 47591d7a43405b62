//! Money calculation helpers
//!
//! All amounts are integer minor units. Percentage discounts go through
//! `Decimal` and floor to whole units, so no float drift ever reaches a
//! stored balance.

use rust_decimal::prelude::*;
use shared::models::{Coupon, DiscountType};

/// Maximum unit price accepted from the catalog
pub const MAX_UNIT_PRICE: i64 = 100_000_000;
/// Maximum quantity per order line
pub const MAX_QUANTITY: i64 = 9_999;
/// Minimum single point charge
pub const MIN_CHARGE_AMOUNT: i64 = 1_000;
/// Maximum single point charge
pub const MAX_CHARGE_AMOUNT: i64 = 100_000_000;

/// Discount a coupon yields on an order total.
///
/// FIXED is clamped to the total; PERCENTAGE is floored. The result is
/// always within `0..=total_amount`.
pub fn coupon_discount(coupon: &Coupon, total_amount: i64) -> i64 {
    match coupon.discount_type {
        DiscountType::Fixed => coupon.discount_value.min(total_amount),
        DiscountType::Percentage => {
            let discount = Decimal::from(total_amount) * Decimal::from(coupon.discount_value)
                / Decimal::from(100);
            discount.floor().to_i64().unwrap_or(0).min(total_amount)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::DiscountType;

    fn coupon(discount_type: DiscountType, discount_value: i64) -> Coupon {
        Coupon {
            coupon_id: 1,
            coupon_name: "test".into(),
            discount_type,
            discount_value,
            min_order_amount: 0,
            max_issue_count: 1,
            issued_count: 0,
            valid_from: 0,
            valid_to: i64::MAX,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_fixed_discount() {
        assert_eq!(coupon_discount(&coupon(DiscountType::Fixed, 2000), 10000), 2000);
    }

    #[test]
    fn test_fixed_discount_clamped_to_total() {
        assert_eq!(coupon_discount(&coupon(DiscountType::Fixed, 2000), 1500), 1500);
    }

    #[test]
    fn test_percentage_discount_floors() {
        // 15% of 10050 = 1507.5 → 1507
        assert_eq!(coupon_discount(&coupon(DiscountType::Percentage, 15), 10050), 1507);
        // 10% of 10000 = 1000 exactly
        assert_eq!(coupon_discount(&coupon(DiscountType::Percentage, 10), 10000), 1000);
    }

    #[test]
    fn test_full_percentage_discount() {
        assert_eq!(coupon_discount(&coupon(DiscountType::Percentage, 100), 7777), 7777);
    }

    #[test]
    fn test_zero_total() {
        assert_eq!(coupon_discount(&coupon(DiscountType::Fixed, 2000), 0), 0);
        assert_eq!(coupon_discount(&coupon(DiscountType::Percentage, 50), 0), 0);
    }
}
