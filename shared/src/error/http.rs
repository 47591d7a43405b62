//! HTTP status code mapping for error codes
//!
//! The engine never depends on this mapping; it exists for the transport
//! layers that translate typed failures into responses.

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::OrderNotFound
            | Self::ProductNotFound
            | Self::ProductOptionNotFound
            | Self::CouponNotFound
            | Self::UserNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists
            | Self::OrderAlreadyPaid
            | Self::OrderAlreadyCancelled
            | Self::CouponExhausted => StatusCode::CONFLICT,

            // 400 Bad Request
            Self::ValidationFailed
            | Self::InvalidRequest
            | Self::ValueOutOfRange
            | Self::InvalidOrderStatus
            | Self::OrderItemsEmpty
            | Self::PaymentFailed
            | Self::PointInsufficient
            | Self::InvalidPointAmount
            | Self::StockInsufficient
            | Self::CouponAlreadyIssued
            | Self::CouponAlreadyUsed
            | Self::CouponNotApplicable => StatusCode::BAD_REQUEST,

            // 503 Service Unavailable (retryable contention)
            Self::LockTimeout => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::Unknown
            | Self::InternalError
            | Self::DatabaseError
            | Self::ConsistencyFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_mappings() {
        assert_eq!(ErrorCode::CouponNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::CouponExhausted.http_status(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::CouponAlreadyIssued.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorCode::LockTimeout.http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
