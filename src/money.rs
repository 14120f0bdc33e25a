use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// Total significant digits the ledger's fixed-point decimal supports.
pub const MAX_DIGITS: u32 = 20;
/// Fractional digits the ledger's fixed-point decimal is scaled to.
pub const SCALE: u32 = 8;

/// Fixed-point monetary amount: 20 significant digits, 8 fractional.
///
/// Why a newtype over `rust_decimal::Decimal` instead of using it bare?
/// - `Decimal` alone allows scales and digit counts the ledger never wants
///   persisted (e.g. a `push`ed literal with 29 significant digits).
/// - Wrapping it lets every constructor enforce the digit budget once,
///   instead of scattering `assert`s through the engine.
/// - Never a binary float: all arithmetic stays exact, matching the
///   no-`f64` rule for money throughout this codebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Build a `Money` from a `Decimal` already known to be in range,
    /// rescaling to the canonical 8-fractional-digit representation.
    pub fn from_decimal(value: Decimal) -> Result<Self, EngineError> {
        let mut scaled = value;
        scaled.rescale(SCALE);
        if count_digits(&scaled) > MAX_DIGITS {
            return Err(EngineError::ValidationError(format!(
                "amount {value} exceeds {MAX_DIGITS} significant digits"
            )));
        }
        Ok(Money(scaled))
    }

    /// Parse a decimal string, rejecting anything that isn't a plain,
    /// finite number (no NaN/Infinity forms exist in `Decimal`; malformed
    /// strings fail to parse at all and surface as `ValidationError`).
    pub fn parse(input: &str) -> Result<Self, EngineError> {
        let decimal = Decimal::from_str(input.trim())
            .map_err(|e| EngineError::ValidationError(format!("invalid amount '{input}': {e}")))?;
        Self::from_decimal(decimal)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.is_zero() && !self.is_negative()
    }

    pub fn negate(&self) -> Money {
        Money(-self.0)
    }

    /// Checked addition: fails with `ValidationError` (overflow) rather than
    /// panicking or silently wrapping if the result would exceed the digit
    /// budget.
    pub fn checked_add(&self, other: Money) -> Result<Money, EngineError> {
        let sum = self
            .0
            .checked_add(other.0)
            .ok_or_else(|| EngineError::ValidationError("amount overflow".to_string()))?;
        Self::from_decimal(sum).map_err(|_| EngineError::ValidationError("amount overflow".to_string()))
    }

    pub fn checked_sub(&self, other: Money) -> Result<Money, EngineError> {
        self.checked_add(other.negate())
    }
}

fn count_digits(value: &Decimal) -> u32 {
    // `Decimal`'s internal representation doesn't expose digit count
    // directly; the canonical string form (sans sign and decimal point)
    // is the simplest faithful way to count significant digits after
    // rescaling to a fixed scale.
    value
        .abs()
        .to_string()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .count() as u32
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.*}", SCALE as usize, self.0)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::from_decimal(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> sqlx::encode::IsNull {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let decimal = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Money::from_decimal(decimal)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_and_formats_with_exactly_eight_fractional_digits() {
        let m = Money::parse("100").unwrap();
        assert_eq!(m.to_string(), "100.00000000");

        let m = Money::parse("0.1").unwrap();
        assert_eq!(m.to_string(), "0.10000000");
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!(Money::parse("not-a-number").is_err());
        assert!(Money::parse("").is_err());
    }

    #[test]
    fn rejects_amounts_exceeding_twenty_significant_digits() {
        // 13 integer digits + 8 fractional (after rescale) = 21 significant
        // digits, one over the 20 budget.
        let over_budget = dec!(1234567890123.123456789);
        assert!(Money::from_decimal(over_budget).is_err());
    }

    #[test]
    fn accepts_amounts_at_exactly_twenty_significant_digits() {
        // 12 integer digits + 8 fractional = 20, exactly at the budget.
        let at_budget = dec!(123456789012.12345678);
        assert!(Money::from_decimal(at_budget).is_ok());
    }

    #[test]
    fn checked_add_and_sub_are_exact() {
        let a = Money::parse("100.00000001").unwrap();
        let b = Money::parse("0.00000001").unwrap();
        let sum = a.checked_add(b).unwrap();
        assert_eq!(sum.to_string(), "100.00000002");

        let diff = sum.checked_sub(b).unwrap();
        assert_eq!(diff, a);
    }

    #[test]
    fn checked_sub_can_go_negative_callers_must_check_explicitly() {
        let a = Money::parse("1").unwrap();
        let b = Money::parse("2").unwrap();
        let diff = a.checked_sub(b).unwrap();
        assert!(diff.is_negative());
    }

    #[test]
    fn zero_and_sign_predicates() {
        assert!(Money::ZERO.is_zero());
        assert!(!Money::ZERO.is_negative());
        assert!(!Money::ZERO.is_positive());

        let positive = Money::parse("0.00000001").unwrap();
        assert!(positive.is_positive());
        assert!(!positive.is_negative());

        let negative = positive.negate();
        assert!(negative.is_negative());
        assert!(!negative.is_positive());
    }
}
