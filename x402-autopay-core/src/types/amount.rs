//! [`AmountValue`] represents a monetary amount in the token's smallest unit.
//!
//! This module holds its type definition, its wire encoding and the conversion
//! between human decimal prices (e.g. `"9.99"`) and integer token units.

use std::fmt::Display;

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize, de::Visitor};

/// Decimal precision assumed for a token with no entry in a decimals table (USDC-like).
pub const DEFAULT_TOKEN_DECIMALS: u32 = 6;

/// Largest precision a [`Decimal`] scale factor can represent.
const MAX_DECIMALS: u32 = 28;

/// Represents a monetary amount in the token's smallest unit.
///
/// Uses a `u128` internally to support large values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AmountValue(pub u128);

impl From<u8> for AmountValue {
    fn from(value: u8) -> Self {
        AmountValue(value as u128)
    }
}

impl From<u16> for AmountValue {
    fn from(value: u16) -> Self {
        AmountValue(value as u128)
    }
}

impl From<u32> for AmountValue {
    fn from(value: u32) -> Self {
        AmountValue(value as u128)
    }
}

impl From<u64> for AmountValue {
    fn from(value: u64) -> Self {
        AmountValue(value as u128)
    }
}

impl From<u128> for AmountValue {
    fn from(value: u128) -> Self {
        AmountValue(value)
    }
}

impl Display for AmountValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for AmountValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Resources encode the amount either as a decimal string (`"10000"`) or a JSON integer.
impl<'de> Deserialize<'de> for AmountValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = AmountValue;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "a non-negative integer or an integer string")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.trim().parse::<u128>().map(AmountValue).map_err(E::custom)
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(AmountValue(v as u128))
            }

            fn visit_u128<E: serde::de::Error>(self, v: u128) -> Result<Self::Value, E> {
                Ok(AmountValue(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u128::try_from(v).map(AmountValue).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Reasons a decimal price cannot be expressed in token units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount {0} is negative")]
    Negative(Decimal),
    #[error("Amount {0} overflows token units at {1} decimals")]
    Overflow(Decimal, u32),
    #[error("Token precision of {0} decimals is not supported")]
    UnsupportedPrecision(u32),
}

/// Result of converting a decimal price into token units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitConversion {
    /// The amount in smallest token units, rounded to the nearest unit.
    pub value: AmountValue,
    /// `true` when the price had more fractional digits than the token supports.
    pub rounded: bool,
}

impl AmountValue {
    /// Convert a human decimal price into smallest token units.
    ///
    /// Rounds half away from zero to the nearest unit. The caller decides how to
    /// report a lossy conversion via [`UnitConversion::rounded`].
    ///
    /// ```
    /// use rust_decimal::Decimal;
    /// use x402_autopay_core::types::AmountValue;
    ///
    /// let price: Decimal = "9.99".parse().unwrap();
    /// let units = AmountValue::from_decimal(price, 6).unwrap();
    /// assert_eq!(units.value, AmountValue(9_990_000));
    /// assert!(!units.rounded);
    /// ```
    pub fn from_decimal(amount: Decimal, decimals: u32) -> Result<UnitConversion, AmountError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(AmountError::Negative(amount));
        }
        let factor = scale_factor(decimals)?;
        let scaled = amount
            .checked_mul(factor)
            .ok_or(AmountError::Overflow(amount, decimals))?;
        let whole = scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let value = whole
            .to_u128()
            .ok_or(AmountError::Overflow(amount, decimals))?;

        Ok(UnitConversion {
            value: AmountValue(value),
            rounded: whole != scaled,
        })
    }

    /// Convert token units back into a decimal price.
    ///
    /// Returns `None` when the value cannot be represented as a [`Decimal`].
    pub fn to_decimal(&self, decimals: u32) -> Option<Decimal> {
        if decimals > MAX_DECIMALS {
            return None;
        }
        let units = i128::try_from(self.0).ok()?;
        Decimal::try_from_i128_with_scale(units, decimals)
            .ok()
            .map(|d| d.normalize())
    }
}

fn scale_factor(decimals: u32) -> Result<Decimal, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::UnsupportedPrecision(decimals));
    }
    Ok(Decimal::from_i128_with_scale(10i128.pow(decimals), 0))
}
