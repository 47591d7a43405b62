//! Coupon issuance gate
//!
//! Enforces "at most N issuances, at most one per user, ever" for each
//! coupon under any number of concurrent callers. Two interchangeable
//! strategies implement [`IssuanceStrategy`] and satisfy the same contract;
//! selection is a configuration option, not a code fork.
//!
//! Both strategies keep the cap check AND the dedup check inside the same
//! enforcement boundary (lock scope or atomic primitive) — moving either
//! outside would let two racing callers both observe the last free slot.

mod fast_cache;
mod pessimistic;

pub use fast_cache::FastCacheStrategy;
pub use pessimistic::PessimisticStrategy;

use crate::core::config::{Config, IssuanceStrategyKind};
use crate::core::locks::LockRegistry;
use crate::ledger::{LedgerStore, StorageError};
use async_trait::async_trait;
use shared::error::{AppError, ErrorCode};
use shared::models::{Coupon, CouponCreate, DiscountType, IssuedCoupon, UserCoupon};
use shared::util;
use std::sync::Arc;
use thiserror::Error;
use validator::Validate;

/// Coupon errors
#[derive(Debug, Error)]
pub enum CouponError {
    #[error("Coupon not found: {0}")]
    NotFound(i64),

    #[error("Coupon issuance limit exhausted: {0}")]
    Exhausted(i64),

    #[error("Coupon {coupon_id} already issued to user {user_id}")]
    AlreadyIssued { coupon_id: i64, user_id: i64 },

    #[error("Lock wait timed out for coupon {0}")]
    LockTimeout(i64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type CouponResult<T> = Result<T, CouponError>;

impl From<CouponError> for AppError {
    fn from(err: CouponError) -> Self {
        match &err {
            CouponError::NotFound(id) => {
                AppError::with_message(ErrorCode::CouponNotFound, err.to_string())
                    .with_detail("coupon_id", *id)
            }
            CouponError::Exhausted(id) => {
                AppError::with_message(ErrorCode::CouponExhausted, err.to_string())
                    .with_detail("coupon_id", *id)
            }
            CouponError::AlreadyIssued { coupon_id, user_id } => {
                AppError::with_message(ErrorCode::CouponAlreadyIssued, err.to_string())
                    .with_detail("coupon_id", *coupon_id)
                    .with_detail("user_id", *user_id)
            }
            CouponError::LockTimeout(_) => {
                AppError::with_message(ErrorCode::LockTimeout, err.to_string())
            }
            CouponError::Validation(_) => AppError::validation(err.to_string()),
            CouponError::Storage(e) => {
                tracing::error!(error = %e, "Storage error in coupon operation");
                AppError::database(err.to_string())
            }
            CouponError::Internal(_) => AppError::internal(err.to_string()),
        }
    }
}

/// Strategy seam for issuance
///
/// Implementations must linearize all attempts for one (coupon_id, user_id)
/// pair: exactly one succeeds, and no interleaving may push issued_count
/// past the cap.
#[async_trait]
pub trait IssuanceStrategy: Send + Sync {
    async fn issue(&self, coupon_id: i64, user_id: i64) -> CouponResult<UserCoupon>;
}

/// Coupon issuance gate and administration
pub struct CouponGate {
    ledger: Arc<LedgerStore>,
    strategy: Arc<dyn IssuanceStrategy>,
}

impl CouponGate {
    pub fn new(config: &Config, ledger: Arc<LedgerStore>, locks: Arc<LockRegistry>) -> Self {
        let strategy: Arc<dyn IssuanceStrategy> = match config.issuance_strategy {
            IssuanceStrategyKind::Pessimistic => Arc::new(PessimisticStrategy::new(
                ledger.clone(),
                locks,
                config.lock_wait(),
            )),
            IssuanceStrategyKind::FastCache => Arc::new(FastCacheStrategy::new(ledger.clone())),
        };
        Self { ledger, strategy }
    }

    /// Issue the coupon to the user through the configured strategy
    ///
    /// The response carries the discount terms alongside the issuance record.
    pub async fn issue(&self, coupon_id: i64, user_id: i64) -> CouponResult<IssuedCoupon> {
        let coupon = self.get_coupon(coupon_id).await?;
        let user_coupon = self.strategy.issue(coupon_id, user_id).await?;
        Ok(IssuedCoupon {
            user_coupon_id: user_coupon.user_coupon_id,
            user_id: user_coupon.user_id,
            coupon_id: user_coupon.coupon_id,
            discount_type: coupon.discount_type,
            discount_value: coupon.discount_value,
            issued_at: user_coupon.issued_at,
        })
    }

    /// Create a coupon (administrative, out of the issuance hot path)
    pub async fn create_coupon(&self, input: CouponCreate) -> CouponResult<Coupon> {
        input
            .validate()
            .map_err(|e| CouponError::Validation(e.to_string()))?;
        if input.valid_from >= input.valid_to {
            return Err(CouponError::Validation(
                "valid_from must precede valid_to".into(),
            ));
        }
        if input.discount_type == DiscountType::Percentage && input.discount_value > 100 {
            return Err(CouponError::Validation(
                "percentage discount cannot exceed 100".into(),
            ));
        }

        let now = util::now_millis();
        let coupon = Coupon {
            coupon_id: util::snowflake_id(),
            coupon_name: input.coupon_name.trim().to_string(),
            discount_type: input.discount_type,
            discount_value: input.discount_value,
            min_order_amount: input.min_order_amount,
            max_issue_count: input.max_issue_count,
            issued_count: 0,
            valid_from: input.valid_from,
            valid_to: input.valid_to,
            created_at: now,
            updated_at: now,
        };

        let txn = self.ledger.begin_write()?;
        self.ledger.put_coupon(&txn, &coupon)?;
        self.ledger.commit(txn)?;
        tracing::info!(coupon_id = coupon.coupon_id, name = %coupon.coupon_name, "Coupon created");
        Ok(coupon)
    }

    /// Get a coupon by ID
    pub async fn get_coupon(&self, coupon_id: i64) -> CouponResult<Coupon> {
        self.ledger
            .get_coupon(coupon_id)?
            .ok_or(CouponError::NotFound(coupon_id))
    }

    /// Number of persisted issuance records for a coupon
    pub async fn issued_count(&self, coupon_id: i64) -> CouponResult<u64> {
        if self.ledger.get_coupon(coupon_id)?.is_none() {
            return Err(CouponError::NotFound(coupon_id));
        }
        Ok(self.ledger.count_user_coupons(coupon_id)?)
    }

    /// All coupons held by one user
    pub async fn user_coupons(&self, user_id: i64) -> CouponResult<Vec<UserCoupon>> {
        Ok(self.ledger.user_coupons_of_user(user_id)?)
    }
}
