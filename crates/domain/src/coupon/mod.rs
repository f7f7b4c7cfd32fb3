//! Coupon model and discount engine.

mod engine;
mod model;

pub use engine::{CouponEngine, CouponQuote};
pub use model::{Coupon, CouponKind, CouponType, NewCoupon};

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while defining or redeeming a coupon.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CouponError {
    /// The code is blank or malformed.
    #[error("Invalid coupon code")]
    InvalidCouponCode,

    /// No coupon carries this code.
    #[error("Coupon {code} not found")]
    CouponNotFound { code: String },

    /// The coupon's expiry is in the past.
    #[error("Coupon {code} has expired")]
    CouponExpired { code: String },

    /// The coupon has been redeemed as many times as it allows overall.
    #[error("Coupon {code} has reached its usage limit")]
    CouponUsageLimitExceeded { code: String },

    /// This user has redeemed the coupon as many times as it allows per user.
    #[error("Coupon {code} has reached its per-user usage limit")]
    UserLimitExceeded { code: String },

    /// A coupon with this code already exists.
    #[error("Coupon code {code} is already taken")]
    CouponCodeTaken { code: String },

    /// Unrecognized coupon type name.
    #[error("Unknown coupon type: {0}")]
    UnknownType(String),

    /// Percentage outside (0, 100].
    #[error("Percentage must be greater than 0 and at most 100, got {0}")]
    InvalidPercentage(Decimal),

    /// Percentage coupons must carry a positive cap.
    #[error("Percentage coupons require a positive max discount")]
    MissingMaxDiscount,

    /// Fixed coupons must not carry a cap.
    #[error("Fixed coupons must not define a max discount")]
    UnexpectedMaxDiscount,

    /// Fixed amount is not a positive money value.
    #[error("Fixed discount amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    /// Usage limits must allow at least one redemption.
    #[error("Usage limits must be at least 1")]
    InvalidUsageLimit,
}

impl CouponError {
    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            CouponError::InvalidCouponCode => "INVALID_COUPON_CODE",
            CouponError::CouponNotFound { .. } => "COUPON_NOT_FOUND",
            CouponError::CouponExpired { .. } => "COUPON_EXPIRED",
            CouponError::CouponUsageLimitExceeded { .. } => "COUPON_USAGE_LIMIT_EXCEEDED",
            CouponError::UserLimitExceeded { .. } => "USER_LIMIT_EXCEEDED",
            CouponError::CouponCodeTaken { .. } => "COUPON_CODE_TAKEN",
            CouponError::UnknownType(_)
            | CouponError::InvalidPercentage(_)
            | CouponError::MissingMaxDiscount
            | CouponError::UnexpectedMaxDiscount
            | CouponError::InvalidAmount(_)
            | CouponError::InvalidUsageLimit => "INVALID_COUPON",
        }
    }
}
