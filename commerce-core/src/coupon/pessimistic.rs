//! Pessimistic-lock issuance strategy
//!
//! An exclusive per-coupon lock is taken before the store is read, so the
//! dedup check, the cap check and the write form one critical section. The
//! guard is RAII-released on every exit path.

use super::{CouponError, CouponResult, IssuanceStrategy};
use crate::core::locks::{LockDomain, LockRegistry};
use crate::ledger::LedgerStore;
use async_trait::async_trait;
use shared::models::UserCoupon;
use shared::util;
use std::sync::Arc;
use std::time::Duration;

pub struct PessimisticStrategy {
    ledger: Arc<LedgerStore>,
    locks: Arc<LockRegistry>,
    lock_wait: Duration,
}

impl PessimisticStrategy {
    pub fn new(ledger: Arc<LedgerStore>, locks: Arc<LockRegistry>, lock_wait: Duration) -> Self {
        Self {
            ledger,
            locks,
            lock_wait,
        }
    }
}

#[async_trait]
impl IssuanceStrategy for PessimisticStrategy {
    async fn issue(&self, coupon_id: i64, user_id: i64) -> CouponResult<UserCoupon> {
        // 先到先得: the lock serializes all issuance attempts on this coupon
        let _guard = self
            .locks
            .acquire(LockDomain::Coupon, coupon_id, self.lock_wait)
            .await
            .ok_or(CouponError::LockTimeout(coupon_id))?;

        let txn = self.ledger.begin_write()?;

        let mut coupon = self
            .ledger
            .get_coupon_txn(&txn, coupon_id)?
            .ok_or(CouponError::NotFound(coupon_id))?;

        // Dedup check inside the lock scope
        if self
            .ledger
            .find_user_coupon_txn(&txn, coupon_id, user_id)?
            .is_some()
        {
            return Err(CouponError::AlreadyIssued { coupon_id, user_id });
        }

        // Cap check inside the lock scope
        if !coupon.can_issue() {
            return Err(CouponError::Exhausted(coupon_id));
        }

        let user_coupon = UserCoupon::issue(user_id, coupon_id);
        coupon.issued_count += 1;
        coupon.updated_at = util::now_millis();

        self.ledger.put_user_coupon(&txn, &user_coupon)?;
        self.ledger.put_coupon(&txn, &coupon)?;
        self.ledger.commit(txn)?;

        tracing::debug!(coupon_id, user_id, issued = coupon.issued_count, "Coupon issued");
        Ok(user_coupon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{Coupon, DiscountType};

    fn strategy_with(max_issue_count: u32) -> (PessimisticStrategy, i64) {
        let ledger = Arc::new(LedgerStore::open_in_memory().unwrap());
        let coupon = Coupon {
            coupon_id: 1,
            coupon_name: "launch".into(),
            discount_type: DiscountType::Fixed,
            discount_value: 2000,
            min_order_amount: 0,
            max_issue_count,
            issued_count: 0,
            valid_from: 0,
            valid_to: i64::MAX,
            created_at: 0,
            updated_at: 0,
        };
        let txn = ledger.begin_write().unwrap();
        ledger.put_coupon(&txn, &coupon).unwrap();
        ledger.commit(txn).unwrap();

        let strategy = PessimisticStrategy::new(
            ledger,
            Arc::new(LockRegistry::new()),
            Duration::from_millis(5000),
        );
        (strategy, 1)
    }

    #[tokio::test]
    async fn test_issue_success_increments_count() {
        let (strategy, coupon_id) = strategy_with(3);

        let issued = strategy.issue(coupon_id, 7).await.unwrap();
        assert_eq!(issued.user_id, 7);
        assert_eq!(issued.coupon_id, coupon_id);

        let coupon = strategy.ledger.get_coupon(coupon_id).unwrap().unwrap();
        assert_eq!(coupon.issued_count, 1);
        assert!(strategy.ledger.find_user_coupon(coupon_id, 7).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_issue_twice_is_rejected() {
        let (strategy, coupon_id) = strategy_with(3);

        strategy.issue(coupon_id, 7).await.unwrap();
        let result = strategy.issue(coupon_id, 7).await;
        assert!(matches!(result, Err(CouponError::AlreadyIssued { .. })));

        // Nothing changed on the failed attempt
        let coupon = strategy.ledger.get_coupon(coupon_id).unwrap().unwrap();
        assert_eq!(coupon.issued_count, 1);
    }

    #[tokio::test]
    async fn test_exhausted_coupon_rejected() {
        let (strategy, coupon_id) = strategy_with(2);

        strategy.issue(coupon_id, 1).await.unwrap();
        strategy.issue(coupon_id, 2).await.unwrap();
        let result = strategy.issue(coupon_id, 3).await;
        assert!(matches!(result, Err(CouponError::Exhausted(_))));

        let coupon = strategy.ledger.get_coupon(coupon_id).unwrap().unwrap();
        assert_eq!(coupon.issued_count, 2);
        assert_eq!(strategy.ledger.count_user_coupons(coupon_id).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_coupon_rejected() {
        let (strategy, _) = strategy_with(1);
        let result = strategy.issue(999, 7).await;
        assert!(matches!(result, Err(CouponError::NotFound(999))));
    }

    #[tokio::test]
    async fn test_held_lock_times_out() {
        let ledger = Arc::new(LedgerStore::open_in_memory().unwrap());
        let locks = Arc::new(LockRegistry::new());
        let strategy =
            PessimisticStrategy::new(ledger, locks.clone(), Duration::from_millis(20));

        let _held = locks
            .acquire(LockDomain::Coupon, 5, Duration::from_millis(100))
            .await
            .unwrap();

        let result = strategy.issue(5, 7).await;
        assert!(matches!(result, Err(CouponError::LockTimeout(5))));
    }
}
