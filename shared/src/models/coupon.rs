//! Coupon models

use crate::util;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Discount type (定额 / 定率)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    /// Flat amount off the order total
    Fixed,
    /// Percentage of the order total, floored to whole minor units
    Percentage,
}

/// Coupon entity — a fixed-quantity issuance pool
///
/// `issued_count` never exceeds `max_issue_count`; it is mutated only by the
/// issuance gate inside a ledger write transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub coupon_id: i64,
    pub coupon_name: String,
    pub discount_type: DiscountType,
    /// Amount in minor units for FIXED, percent (0-100) for PERCENTAGE
    pub discount_value: i64,
    /// Minimum order total required to apply this coupon
    pub min_order_amount: i64,
    pub max_issue_count: u32,
    pub issued_count: u32,
    /// Validity window, millisecond timestamps
    pub valid_from: i64,
    pub valid_to: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Coupon {
    /// Whether the issuance cap still has room
    pub fn can_issue(&self) -> bool {
        self.issued_count < self.max_issue_count
    }

    /// Whether the coupon is inside its validity window at `now`
    pub fn is_valid_at(&self, now: i64) -> bool {
        now >= self.valid_from && now <= self.valid_to
    }
}

/// Create coupon payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CouponCreate {
    #[validate(length(min = 1, max = 100))]
    pub coupon_name: String,
    pub discount_type: DiscountType,
    #[validate(range(min = 0))]
    pub discount_value: i64,
    #[validate(range(min = 0))]
    pub min_order_amount: i64,
    #[validate(range(min = 1))]
    pub max_issue_count: u32,
    pub valid_from: i64,
    pub valid_to: i64,
}

/// Per-user issuance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserCouponStatus {
    Active,
    Used,
}

/// Per-user issuance record
///
/// Unique per (user_id, coupon_id); status moves ACTIVE → USED exactly once,
/// at settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCoupon {
    pub user_coupon_id: i64,
    pub user_id: i64,
    pub coupon_id: i64,
    pub status: UserCouponStatus,
    pub used_at: Option<i64>,
    pub order_id: Option<i64>,
    pub issued_at: i64,
}

/// Issuance response handed to callers, carrying the discount terms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCoupon {
    pub user_coupon_id: i64,
    pub user_id: i64,
    pub coupon_id: i64,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub issued_at: i64,
}

impl UserCoupon {
    /// Build a freshly issued record
    pub fn issue(user_id: i64, coupon_id: i64) -> Self {
        Self {
            user_coupon_id: util::snowflake_id(),
            user_id,
            coupon_id,
            status: UserCouponStatus::Active,
            used_at: None,
            order_id: None,
            issued_at: util::now_millis(),
        }
    }

    /// Whether the coupon is still redeemable
    pub fn can_use(&self) -> bool {
        self.status == UserCouponStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_issue_respects_cap() {
        let mut coupon = Coupon {
            coupon_id: 1,
            coupon_name: "launch".into(),
            discount_type: DiscountType::Fixed,
            discount_value: 2000,
            min_order_amount: 0,
            max_issue_count: 2,
            issued_count: 1,
            valid_from: 0,
            valid_to: i64::MAX,
            created_at: 0,
            updated_at: 0,
        };
        assert!(coupon.can_issue());
        coupon.issued_count = 2;
        assert!(!coupon.can_issue());
    }

    #[test]
    fn test_validity_window_is_inclusive() {
        let coupon = Coupon {
            coupon_id: 1,
            coupon_name: "window".into(),
            discount_type: DiscountType::Percentage,
            discount_value: 10,
            min_order_amount: 0,
            max_issue_count: 1,
            issued_count: 0,
            valid_from: 100,
            valid_to: 200,
            created_at: 0,
            updated_at: 0,
        };
        assert!(!coupon.is_valid_at(99));
        assert!(coupon.is_valid_at(100));
        assert!(coupon.is_valid_at(200));
        assert!(!coupon.is_valid_at(201));
    }
}
