//! Money value object.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
///
/// Amounts are always in the store's single configured currency.
/// Arithmetic saturates at the bounds of `i64` instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = 10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a Money amount from a decimal value in whole currency units.
    ///
    /// The value is rounded to two decimal places, half away from zero.
    /// Returns `None` if the value does not fit in an `i64` of cents.
    pub fn from_decimal(value: Decimal) -> Option<Self> {
        let cents = value
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()?;
        Some(Self { cents })
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the amount as a decimal in whole currency units.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.cents, 2)
    }

    /// Returns the whole-unit portion.
    pub fn units(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after whole units).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents.saturating_mul(i64::from(quantity)),
        }
    }

    /// Returns `percent`% of this amount, rounded to the cent half away from zero.
    ///
    /// Returns `None` on overflow.
    pub fn percentage(&self, percent: Decimal) -> Option<Money> {
        let applied = Decimal::from(self.cents)
            .checked_mul(percent)?
            .checked_div(Decimal::ONE_HUNDRED)?;
        let cents = applied
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()?;
        Some(Money { cents })
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-{}.{:02}", self.units().abs(), self.cents_part())
        } else {
            write!(f, "{}.{:02}", self.units(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_add(rhs.cents),
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_sub(rhs.cents),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents = self.cents.saturating_add(rhs.cents);
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.cents = self.cents.saturating_sub(rhs.cents);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_from_cents() {
        let money = Money::from_cents(1234);
        assert_eq!(money.cents(), 1234);
        assert_eq!(money.units(), 12);
        assert_eq!(money.cents_part(), 34);
    }

    #[test]
    fn test_money_from_decimal_rounds_half_away_from_zero() {
        assert_eq!(Money::from_decimal(dec!(10.00)).unwrap().cents(), 1000);
        assert_eq!(Money::from_decimal(dec!(0.125)).unwrap().cents(), 13);
        assert_eq!(Money::from_decimal(dec!(-0.125)).unwrap().cents(), -13);
        assert_eq!(Money::from_decimal(dec!(0.124)).unwrap().cents(), 12);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "12.34");
        assert_eq!(Money::from_cents(100).to_string(), "1.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-12.34");
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.multiply(3).cents(), 3000);
        assert_eq!([a, b, b].into_iter().sum::<Money>().cents(), 2000);
    }

    #[test]
    fn test_money_arithmetic_saturates() {
        let max = Money::from_cents(i64::MAX);
        assert_eq!(max + Money::from_cents(1), max);
        assert_eq!(max.multiply(u32::MAX), max);
        assert_eq!(
            Money::from_cents(i64::MIN) - Money::from_cents(1),
            Money::from_cents(i64::MIN)
        );

        let mut total = max;
        total += Money::from_cents(100);
        assert_eq!(total, max);
    }

    #[test]
    fn test_percentage_rounds_to_cent() {
        // 15% of 0.33 = 0.0495 -> 0.05
        assert_eq!(
            Money::from_cents(33).percentage(dec!(15)).unwrap().cents(),
            5
        );
        // 20% of 1000.00 = 200.00
        assert_eq!(
            Money::from_cents(100_000).percentage(dec!(20)).unwrap().cents(),
            20_000
        );
        // 12.5% of 0.20 = 0.025 -> 0.03 (half away from zero)
        assert_eq!(
            Money::from_cents(20).percentage(dec!(12.5)).unwrap().cents(),
            3
        );
    }

    #[test]
    fn test_to_decimal() {
        assert_eq!(Money::from_cents(19_050).to_decimal(), dec!(190.50));
    }

    #[test]
    fn test_money_comparison() {
        assert!(Money::from_cents(100).is_positive());
        assert!(Money::from_cents(0).is_zero());
        assert!(Money::from_cents(-100).is_negative());
        assert_eq!(Money::from_cents(100).min(Money::from_cents(50)).cents(), 50);
    }
}
