//! Monetary amount type for mandate limits.
//!
//! Wraps `rust_decimal` so that equality is numeric while the scale the
//! source system wrote is kept for audit rendering.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A monetary limit as supplied by the source file.
///
/// Comparison is by numeric value, so `100.00` and `100.0` are equal, but
/// `Display` reproduces the representation that was parsed.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use mandate_reconciler::Amount;
///
/// let stored = Amount::from_str("100.00").unwrap();
/// let candidate = Amount::from_str("100.0").unwrap();
/// assert_eq!(stored, candidate);
/// assert_eq!(stored.to_string(), "100.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

/// Error returned when a value is not a plain decimal number.
#[derive(Debug, Error)]
pub enum AmountError {
    #[error("expected digits with an optional sign and decimal point")]
    NotPlainDecimal,

    #[error(transparent)]
    Decimal(#[from] rust_decimal::Error),
}

/// Optional sign, at least one digit, at most one `.`.
fn is_plain_decimal(s: &str) -> bool {
    let digits = s.strip_prefix(&['+', '-'][..]).unwrap_or(s);
    let mut dots = 0;
    let mut has_digit = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => has_digit = true,
            '.' => dots += 1,
            _ => return false,
        }
    }
    has_digit && dots <= 1
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if !is_plain_decimal(s) {
            return Err(AmountError::NotPlainDecimal);
        }
        Ok(Amount(Decimal::from_str(s)?))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}
