//! Unified error codes for the commerce core
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Order errors
//! - 5xxx: Payment / point errors
//! - 6xxx: Product / stock errors
//! - 7xxx: Coupon errors
//! - 8xxx: User errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order has already been paid
    OrderAlreadyPaid = 4002,
    /// Order has already been cancelled
    OrderAlreadyCancelled = 4003,
    /// Order status does not allow this operation
    InvalidOrderStatus = 4004,
    /// Order has no line items
    OrderItemsEmpty = 4005,

    // ==================== 5xxx: Payment / Points ====================
    /// Payment failed
    PaymentFailed = 5001,
    /// Point balance is insufficient
    PointInsufficient = 5002,
    /// Point amount is invalid
    InvalidPointAmount = 5003,

    // ==================== 6xxx: Product / Stock ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Product option not found
    ProductOptionNotFound = 6002,
    /// Stock is insufficient
    StockInsufficient = 6003,

    // ==================== 7xxx: Coupon ====================
    /// Coupon not found
    CouponNotFound = 7001,
    /// Coupon issuance limit exhausted
    CouponExhausted = 7002,
    /// Coupon already issued to this user
    CouponAlreadyIssued = 7003,
    /// Coupon has already been used
    CouponAlreadyUsed = 7004,
    /// Coupon cannot be applied to this order
    CouponNotApplicable = 7005,

    // ==================== 8xxx: User ====================
    /// User not found
    UserNotFound = 8001,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Lock or atomic-primitive wait exceeded the bound
    LockTimeout = 9003,
    /// An invariant could not be restored atomically
    ConsistencyFailure = 9004,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Whether a caller may retry the same request after this failure.
    ///
    /// Only contention timeouts are retryable; business-rule failures and
    /// missing resources will fail again identically.
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::LockTimeout)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderAlreadyPaid => "Order has already been paid",
            ErrorCode::OrderAlreadyCancelled => "Order has already been cancelled",
            ErrorCode::InvalidOrderStatus => "Order status does not allow this operation",
            ErrorCode::OrderItemsEmpty => "Order has no line items",

            // Payment / Points
            ErrorCode::PaymentFailed => "Payment failed",
            ErrorCode::PointInsufficient => "Point balance is insufficient",
            ErrorCode::InvalidPointAmount => "Point amount is invalid",

            // Product / Stock
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::ProductOptionNotFound => "Product option not found",
            ErrorCode::StockInsufficient => "Stock is insufficient",

            // Coupon
            ErrorCode::CouponNotFound => "Coupon not found",
            ErrorCode::CouponExhausted => "Coupon issuance limit exhausted",
            ErrorCode::CouponAlreadyIssued => "Coupon already issued to this user",
            ErrorCode::CouponAlreadyUsed => "Coupon has already been used",
            ErrorCode::CouponNotApplicable => "Coupon cannot be applied to this order",

            // User
            ErrorCode::UserNotFound => "User not found",

            // System
            ErrorCode::InternalError => "Internal error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::LockTimeout => "Resource is busy, please retry",
            ErrorCode::ConsistencyFailure => "State could not be updated consistently",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code as u16
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0 => ErrorCode::Success,
            1 => ErrorCode::Unknown,
            2 => ErrorCode::ValidationFailed,
            3 => ErrorCode::NotFound,
            4 => ErrorCode::AlreadyExists,
            5 => ErrorCode::InvalidRequest,
            8 => ErrorCode::ValueOutOfRange,
            4001 => ErrorCode::OrderNotFound,
            4002 => ErrorCode::OrderAlreadyPaid,
            4003 => ErrorCode::OrderAlreadyCancelled,
            4004 => ErrorCode::InvalidOrderStatus,
            4005 => ErrorCode::OrderItemsEmpty,
            5001 => ErrorCode::PaymentFailed,
            5002 => ErrorCode::PointInsufficient,
            5003 => ErrorCode::InvalidPointAmount,
            6001 => ErrorCode::ProductNotFound,
            6002 => ErrorCode::ProductOptionNotFound,
            6003 => ErrorCode::StockInsufficient,
            7001 => ErrorCode::CouponNotFound,
            7002 => ErrorCode::CouponExhausted,
            7003 => ErrorCode::CouponAlreadyIssued,
            7004 => ErrorCode::CouponAlreadyUsed,
            7005 => ErrorCode::CouponNotApplicable,
            8001 => ErrorCode::UserNotFound,
            9001 => ErrorCode::InternalError,
            9002 => ErrorCode::DatabaseError,
            9003 => ErrorCode::LockTimeout,
            9004 => ErrorCode::ConsistencyFailure,
            other => return Err(format!("unknown error code: {}", other)),
        };
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for code in [
            ErrorCode::Success,
            ErrorCode::CouponExhausted,
            ErrorCode::StockInsufficient,
            ErrorCode::LockTimeout,
        ] {
            let raw: u16 = code.into();
            assert_eq!(ErrorCode::try_from(raw).unwrap(), code);
        }
        assert!(ErrorCode::try_from(12345).is_err());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ErrorCode::LockTimeout.is_retryable());
        assert!(!ErrorCode::CouponExhausted.is_retryable());
        assert!(!ErrorCode::StockInsufficient.is_retryable());
        assert!(!ErrorCode::PointInsufficient.is_retryable());
    }
}
