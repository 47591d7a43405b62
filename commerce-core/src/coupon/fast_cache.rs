//! Fast-cache issuance strategy
//!
//! An in-process atomic layer sits in front of the ledger: a member set
//! answers the per-user dedup in one test-and-set, and a remaining-count
//! cell bounds the total with a decrement-if-positive. A provisional win is
//! only reported as success after the durable record is written; a failed
//! write rolls both cells back so the slot is not lost.
//!
//! The cache is never authoritative on its own. Cells are warmed from the
//! ledger on first touch, which doubles as the restart reconciliation: after
//! a crash the next request rebuilds membership and remaining count from the
//! persisted records.

use super::{CouponError, CouponResult, IssuanceStrategy};
use crate::ledger::LedgerStore;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use shared::models::{Coupon, UserCoupon};
use shared::util;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Per-coupon cache cell
struct CouponCell {
    /// Users holding this coupon (issued or provisionally winning)
    members: DashSet<i64>,
    /// Issuance slots left; never goes below zero
    remaining: AtomicI64,
}

pub struct FastCacheStrategy {
    ledger: Arc<LedgerStore>,
    cells: DashMap<i64, Arc<CouponCell>>,
}

impl FastCacheStrategy {
    pub fn new(ledger: Arc<LedgerStore>) -> Self {
        Self {
            ledger,
            cells: DashMap::new(),
        }
    }

    /// Fetch the cell for a coupon, warming it from the ledger on first touch
    ///
    /// 首次接触时从账本回填已发放成员与剩余额度
    fn cell(&self, coupon: &Coupon) -> CouponResult<Arc<CouponCell>> {
        if let Some(cell) = self.cells.get(&coupon.coupon_id) {
            return Ok(cell.value().clone());
        }

        let issued = self.ledger.user_coupons_for_coupon(coupon.coupon_id)?;
        let members: DashSet<i64> = issued.iter().map(|uc| uc.user_id).collect();
        let remaining = coupon.max_issue_count as i64 - issued.len() as i64;
        let cell = Arc::new(CouponCell {
            members,
            remaining: AtomicI64::new(remaining.max(0)),
        });

        // A concurrent first touch may have won the insert; use whichever
        // cell landed. Both were built before any issuance could proceed.
        Ok(self
            .cells
            .entry(coupon.coupon_id)
            .or_insert(cell)
            .value()
            .clone())
    }

    /// Persist the issuance record and counted issuance in one transaction
    fn persist(&self, coupon_id: i64, user_id: i64) -> CouponResult<UserCoupon> {
        let txn = self.ledger.begin_write()?;
        let mut coupon = self
            .ledger
            .get_coupon_txn(&txn, coupon_id)?
            .ok_or(CouponError::NotFound(coupon_id))?;

        let user_coupon = UserCoupon::issue(user_id, coupon_id);
        coupon.issued_count += 1;
        coupon.updated_at = util::now_millis();

        self.ledger.put_user_coupon(&txn, &user_coupon)?;
        self.ledger.put_coupon(&txn, &coupon)?;
        self.ledger.commit(txn)?;
        Ok(user_coupon)
    }

    /// Undo a provisional win so a later legitimate request is not blocked
    ///
    /// 补偿处理: 回滚集合成员与剩余额度
    fn rollback(cell: &CouponCell, user_id: i64) {
        cell.members.remove(&user_id);
        cell.remaining.fetch_add(1, Ordering::AcqRel);
    }
}

#[async_trait]
impl IssuanceStrategy for FastCacheStrategy {
    async fn issue(&self, coupon_id: i64, user_id: i64) -> CouponResult<UserCoupon> {
        let coupon = self
            .ledger
            .get_coupon(coupon_id)?
            .ok_or(CouponError::NotFound(coupon_id))?;
        let cell = self.cell(&coupon)?;

        // Atomic add-to-set: concurrent requests by the same user race here
        // and exactly one passes
        if !cell.members.insert(user_id) {
            return Err(CouponError::AlreadyIssued { coupon_id, user_id });
        }

        // Decrement-if-positive bounds the provisional wins by the cap
        let won = cell
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                (v > 0).then(|| v - 1)
            })
            .is_ok();
        if !won {
            cell.members.remove(&user_id);
            return Err(CouponError::Exhausted(coupon_id));
        }

        // Provisional win → durable record before success is reported
        match self.persist(coupon_id, user_id) {
            Ok(user_coupon) => {
                tracing::debug!(coupon_id, user_id, "Coupon issued (fast cache)");
                Ok(user_coupon)
            }
            Err(err) => {
                tracing::warn!(coupon_id, user_id, error = %err, "Issuance persist failed, rolling back cache");
                Self::rollback(&cell, user_id);
                Err(err)
            }
        }
    }
}
