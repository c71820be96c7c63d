//! Arbitrary-precision decimal numbers for balances and prices.
//!
//! All balance/price arithmetic goes through [`DecimalNumber`], a thin
//! wrapper over `bigdecimal::BigDecimal`. Values serialize as canonical
//! decimal strings (normalized, plain notation) and never as binary
//! floats, so amounts round-trip exactly across the API boundary.

use std::fmt;
use std::ops::{Add, Mul};
use std::str::FromStr;

use alloy_primitives::U256;
use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, RoundingMode, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValuationError;

/// Fixed-precision decimal wrapping an arbitrary-precision value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct DecimalNumber(BigDecimal);

impl DecimalNumber {
    pub fn zero() -> Self {
        DecimalNumber(BigDecimal::zero())
    }

    pub fn one() -> Self {
        DecimalNumber(BigDecimal::from(1))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Convert a raw on-chain integer amount to a decimal using the token's
    /// declared precision. Exact: `1234` at 3 decimals is `1.234`.
    pub fn from_base_units(raw: U256, decimals: u8) -> Self {
        // U256 exceeds any fixed-width integer; go through the decimal
        // string representation.
        let digits = BigInt::from_str(&raw.to_string())
            .unwrap_or_else(|_| BigInt::from(0));
        DecimalNumber(BigDecimal::new(digits, i64::from(decimals)))
    }

    /// Truncate toward zero to `decimals` fractional digits.
    ///
    /// This must match on-chain dust accounting: `1.2359999` truncated to
    /// 6 decimals is `1.235999`, never `1.236`.
    pub fn truncated(&self, decimals: u8) -> Self {
        DecimalNumber(self.0.with_scale_round(i64::from(decimals), RoundingMode::Down))
    }

    /// Division with an explicit failure on a zero divisor.
    ///
    /// BigDecimal division by zero panics; price-per-share ratios can
    /// legitimately hit a zero total supply, so the engine treats it as a
    /// defined valuation failure instead.
    pub fn checked_div(&self, divisor: &DecimalNumber) -> Result<Self, ValuationError> {
        if divisor.is_zero() {
            return Err(ValuationError::DivisionByZero);
        }
        Ok(DecimalNumber(&self.0 / &divisor.0))
    }

    /// Canonical serialized form: normalized plain decimal string.
    ///
    /// `Display` on `BigDecimal` switches to scientific notation for small
    /// magnitudes; `to_plain_string` keeps dust amounts like one base unit
    /// at 18 decimals in plain `0.000...001` form.
    pub fn to_serialized(&self) -> String {
        self.0.normalized().to_plain_string()
    }
}

impl fmt::Display for DecimalNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_serialized())
    }
}

impl FromStr for DecimalNumber {
    type Err = bigdecimal::ParseBigDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DecimalNumber(BigDecimal::from_str(s)?))
    }
}

impl From<u64> for DecimalNumber {
    fn from(value: u64) -> Self {
        DecimalNumber(BigDecimal::from(value))
    }
}

impl From<BigDecimal> for DecimalNumber {
    fn from(value: BigDecimal) -> Self {
        DecimalNumber(value)
    }
}

impl Add for &DecimalNumber {
    type Output = DecimalNumber;

    fn add(self, rhs: &DecimalNumber) -> DecimalNumber {
        DecimalNumber(&self.0 + &rhs.0)
    }
}

impl Mul for &DecimalNumber {
    type Output = DecimalNumber;

    fn mul(self, rhs: &DecimalNumber) -> DecimalNumber {
        DecimalNumber(&self.0 * &rhs.0)
    }
}

impl Serialize for DecimalNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_serialized())
    }
}

impl<'de> Deserialize<'de> for DecimalNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DecimalNumber::from_str(&s).map_err(serde::de::Error::custom)
    }
}
