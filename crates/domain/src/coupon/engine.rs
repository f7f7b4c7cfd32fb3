//! Coupon validation and discount calculation.

use chrono::{DateTime, Utc};
use common::CouponId;

use super::{Coupon, CouponError};
use crate::money::Money;

/// Result of a successful coupon evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CouponQuote {
    pub coupon_id: CouponId,
    pub discount: Money,
}

/// Read-only coupon evaluation.
///
/// The engine never touches usage counters; the caller records the
/// redemption in the same unit of work that creates the order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CouponEngine;

impl CouponEngine {
    /// Validates a coupon for a user and computes its discount on `subtotal`.
    ///
    /// `coupon` is the lookup result for `code`, and `user_redemptions` is how
    /// many times this user has already redeemed it. Checks run in a fixed
    /// order and the first failure is returned.
    pub fn evaluate(
        code: &str,
        coupon: Option<&Coupon>,
        user_redemptions: u32,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<CouponQuote, CouponError> {
        let coupon = coupon.ok_or_else(|| CouponError::CouponNotFound {
            code: code.to_string(),
        })?;

        if coupon.is_expired(now) {
            return Err(CouponError::CouponExpired {
                code: coupon.code.clone(),
            });
        }

        if coupon.remaining_uses() == 0 {
            return Err(CouponError::CouponUsageLimitExceeded {
                code: coupon.code.clone(),
            });
        }

        if user_redemptions >= coupon.per_user_limit {
            return Err(CouponError::UserLimitExceeded {
                code: coupon.code.clone(),
            });
        }

        Ok(CouponQuote {
            coupon_id: coupon.id,
            discount: coupon.kind.discount_on(subtotal),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupon::{CouponKind, CouponType, NewCoupon};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn coupon(kind: CouponKind, usage_limit: u32, per_user_limit: u32) -> Coupon {
        Coupon::create(NewCoupon {
            code: "SAVE".into(),
            kind,
            expires_at: Utc::now() + Duration::days(7),
            usage_limit,
            per_user_limit,
        })
        .unwrap()
    }

    fn twenty_percent_capped_at_fifty() -> CouponKind {
        CouponKind::from_parts(
            CouponType::Percentage,
            dec!(20),
            Some(Money::from_cents(5_000)),
        )
        .unwrap()
    }

    #[test]
    fn test_percentage_discount_is_capped() {
        let coupon = coupon(twenty_percent_capped_at_fifty(), 10, 1);
        let quote = CouponEngine::evaluate(
            "SAVE",
            Some(&coupon),
            0,
            Money::from_cents(100_000),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(quote.discount, Money::from_cents(5_000));
        assert_eq!(quote.coupon_id, coupon.id);
    }

    #[test]
    fn test_fixed_discount() {
        let coupon = coupon(
            CouponKind::Fixed {
                amount: Money::from_cents(1_000),
            },
            1,
            1,
        );
        let quote = CouponEngine::evaluate(
            "SAVE",
            Some(&coupon),
            0,
            Money::from_cents(20_000),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(quote.discount, Money::from_cents(1_000));
    }

    #[test]
    fn test_missing_coupon() {
        let result =
            CouponEngine::evaluate("NOPE", None, 0, Money::from_cents(1_000), Utc::now());
        assert_eq!(
            result,
            Err(CouponError::CouponNotFound {
                code: "NOPE".into()
            })
        );
    }

    #[test]
    fn test_expired_coupon() {
        let mut coupon = coupon(twenty_percent_capped_at_fifty(), 10, 1);
        coupon.expires_at = Utc::now() - Duration::seconds(1);

        let result = CouponEngine::evaluate(
            "SAVE",
            Some(&coupon),
            0,
            Money::from_cents(1_000),
            Utc::now(),
        );
        assert!(matches!(result, Err(CouponError::CouponExpired { .. })));
    }

    #[test]
    fn test_expiry_boundary_is_still_valid() {
        let coupon = coupon(twenty_percent_capped_at_fifty(), 10, 1);
        let at_expiry = coupon.expires_at;

        let result =
            CouponEngine::evaluate("SAVE", Some(&coupon), 0, Money::from_cents(1_000), at_expiry);
        assert!(result.is_ok());
    }

    #[test]
    fn test_global_limit_checked_before_user_limit() {
        let mut coupon = coupon(twenty_percent_capped_at_fifty(), 1, 1);
        coupon.used_count = 1;

        let result = CouponEngine::evaluate(
            "SAVE",
            Some(&coupon),
            1,
            Money::from_cents(1_000),
            Utc::now(),
        );
        assert!(matches!(
            result,
            Err(CouponError::CouponUsageLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_user_limit() {
        let coupon = coupon(twenty_percent_capped_at_fifty(), 10, 2);

        assert!(
            CouponEngine::evaluate(
                "SAVE",
                Some(&coupon),
                1,
                Money::from_cents(1_000),
                Utc::now()
            )
            .is_ok()
        );
        assert!(matches!(
            CouponEngine::evaluate(
                "SAVE",
                Some(&coupon),
                2,
                Money::from_cents(1_000),
                Utc::now()
            ),
            Err(CouponError::UserLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_expired_checked_before_usage() {
        let mut coupon = coupon(twenty_percent_capped_at_fifty(), 1, 1);
        coupon.used_count = 1;
        coupon.expires_at = Utc::now() - Duration::days(1);

        let result = CouponEngine::evaluate(
            "SAVE",
            Some(&coupon),
            5,
            Money::from_cents(1_000),
            Utc::now(),
        );
        assert!(matches!(result, Err(CouponError::CouponExpired { .. })));
    }
}
