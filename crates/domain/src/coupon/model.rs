//! Coupon definitions.

use chrono::{DateTime, Utc};
use common::CouponId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::CouponError;
use crate::money::Money;

/// Coupon type name as it appears on the wire and in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CouponType {
    Percentage,
    Fixed,
}

impl CouponType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponType::Percentage => "Percentage",
            CouponType::Fixed => "Fixed",
        }
    }
}

impl std::fmt::Display for CouponType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CouponType {
    type Err = CouponError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percentage" => Ok(CouponType::Percentage),
            "fixed" => Ok(CouponType::Fixed),
            _ => Err(CouponError::UnknownType(s.to_string())),
        }
    }
}

/// How a coupon discounts a subtotal.
///
/// The cap only exists on the percentage variant, so a fixed coupon with a
/// cap or a percentage coupon without one cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CouponKind {
    /// `percent`% of the subtotal, never more than `max_discount`.
    Percentage { percent: Decimal, max_discount: Money },
    /// A flat amount, never more than the subtotal.
    Fixed { amount: Money },
}

impl CouponKind {
    /// Builds a kind from its flat storage representation.
    ///
    /// `value` is a percentage for `Percentage` coupons and an amount in whole
    /// currency units for `Fixed` ones.
    pub fn from_parts(
        coupon_type: CouponType,
        value: Decimal,
        max_discount: Option<Money>,
    ) -> Result<Self, CouponError> {
        match coupon_type {
            CouponType::Percentage => {
                if value <= Decimal::ZERO || value > Decimal::ONE_HUNDRED {
                    return Err(CouponError::InvalidPercentage(value));
                }
                match max_discount {
                    Some(cap) if cap.is_positive() => Ok(CouponKind::Percentage {
                        percent: value,
                        max_discount: cap,
                    }),
                    _ => Err(CouponError::MissingMaxDiscount),
                }
            }
            CouponType::Fixed => {
                if max_discount.is_some() {
                    return Err(CouponError::UnexpectedMaxDiscount);
                }
                match Money::from_decimal(value) {
                    Some(amount) if amount.is_positive() => Ok(CouponKind::Fixed { amount }),
                    _ => Err(CouponError::InvalidAmount(value)),
                }
            }
        }
    }

    pub fn coupon_type(&self) -> CouponType {
        match self {
            CouponKind::Percentage { .. } => CouponType::Percentage,
            CouponKind::Fixed { .. } => CouponType::Fixed,
        }
    }

    /// Returns the flat `value` column: percent, or amount in currency units.
    pub fn value(&self) -> Decimal {
        match self {
            CouponKind::Percentage { percent, .. } => *percent,
            CouponKind::Fixed { amount } => amount.to_decimal(),
        }
    }

    pub fn max_discount(&self) -> Option<Money> {
        match self {
            CouponKind::Percentage { max_discount, .. } => Some(*max_discount),
            CouponKind::Fixed { .. } => None,
        }
    }

    /// Computes the discount this kind grants on `subtotal`.
    ///
    /// The result is never negative and never exceeds the subtotal.
    pub fn discount_on(&self, subtotal: Money) -> Money {
        if !subtotal.is_positive() {
            return Money::zero();
        }

        let discount = match self {
            CouponKind::Percentage {
                percent,
                max_discount,
            } => subtotal
                .percentage(*percent)
                .map_or(*max_discount, |amount| amount.min(*max_discount)),
            CouponKind::Fixed { amount } => *amount,
        };

        discount.min(subtotal).max(Money::zero())
    }
}

/// Input for defining a new coupon.
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: String,
    pub kind: CouponKind,
    pub expires_at: DateTime<Utc>,
    pub usage_limit: u32,
    pub per_user_limit: u32,
}

/// A redeemable coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    /// Normalized (trimmed, upper-case) code.
    pub code: String,
    pub kind: CouponKind,
    pub expires_at: DateTime<Utc>,
    pub usage_limit: u32,
    pub per_user_limit: u32,
    pub used_count: u32,
}

impl Coupon {
    /// Defines a new, unused coupon.
    pub fn create(new: NewCoupon) -> Result<Self, CouponError> {
        let code = Self::normalize_code(&new.code)?;
        if new.usage_limit == 0 || new.per_user_limit == 0 {
            return Err(CouponError::InvalidUsageLimit);
        }

        Ok(Self {
            id: CouponId::new(),
            code,
            kind: new.kind,
            expires_at: new.expires_at,
            usage_limit: new.usage_limit,
            per_user_limit: new.per_user_limit,
            used_count: 0,
        })
    }

    /// Normalizes a user-supplied code for case-insensitive lookup.
    pub fn normalize_code(code: &str) -> Result<String, CouponError> {
        let trimmed = code.trim();
        if trimmed.is_empty()
            || !trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CouponError::InvalidCouponCode);
        }
        Ok(trimmed.to_ascii_uppercase())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Redemptions left before the global limit is hit.
    pub fn remaining_uses(&self) -> u32 {
        self.usage_limit.saturating_sub(self.used_count)
    }
}
