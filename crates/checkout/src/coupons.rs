//! Coupon step of checkout.

use chrono::{DateTime, Utc};
use common::UserId;
use domain::{Coupon, CouponEngine, CouponQuote, Money};
use store::StoreTx;

use crate::error::Result;

/// Validates `code` for `user_id` and computes its discount on `subtotal`.
///
/// The coupon row stays locked until `tx` ends, so the usage counts read
/// here cannot change before the redemption is recorded.
pub async fn validate_and_calculate_discount(
    tx: &mut dyn StoreTx,
    user_id: UserId,
    code: &str,
    subtotal: Money,
    now: DateTime<Utc>,
) -> Result<CouponQuote> {
    let normalized = Coupon::normalize_code(code)?;
    let coupon = tx.coupon_by_code_for_update(&normalized).await?;

    let user_redemptions = match &coupon {
        Some(coupon) => tx.user_redemptions(coupon.id, user_id).await?,
        None => 0,
    };

    let quote = CouponEngine::evaluate(
        &normalized,
        coupon.as_ref(),
        user_redemptions,
        subtotal,
        now,
    )?;
    tracing::debug!(code = %normalized, discount = %quote.discount, "coupon accepted");
    Ok(quote)
}
