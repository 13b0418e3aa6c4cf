//! 18-decimal fixed point numbers used for reward ratios and slash fractions.

use std::{fmt, str::FromStr};

use ethnum::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coin::Amount;

/// Number of fractional digits.
pub const DECIMAL_PLACES: u32 = 18;

const SCALE: U256 = U256::new(1_000_000_000_000_000_000);

/// Errors when parsing a [`Decimal`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecimalParseError {
    /// The input was empty or contained something other than digits and one dot.
    #[error("invalid decimal literal: {0}")]
    Invalid(String),

    /// More than 18 fractional digits were given.
    #[error("too many fractional digits in {0}")]
    TooPrecise(String),

    /// The value does not fit.
    #[error("decimal out of range: {0}")]
    Overflow(String),
}

/// An unsigned fixed point number with 18 fractional digits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Decimal(U256);

impl Decimal {
    /// Zero.
    pub const ZERO: Self = Self(U256::ZERO);

    /// One.
    pub const ONE: Self = Self(SCALE);

    /// Builds a decimal from its raw representation, i.e. `value * 10^18`.
    pub const fn from_atomics(atomics: U256) -> Self {
        Self(atomics)
    }

    /// The raw representation.
    pub const fn atomics(&self) -> U256 {
        self.0
    }

    /// `numerator / denominator`, rounded down. `None` on a zero denominator or overflow.
    pub fn from_ratio(numerator: Amount, denominator: Amount) -> Option<Self> {
        if denominator == U256::ZERO {
            return None;
        }

        numerator.checked_mul(SCALE).map(|n| Self(n / denominator))
    }

    /// Whether the value is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == U256::ZERO
    }

    /// Checked addition.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// `floor(self * amount)`.
    ///
    /// # Panics
    ///
    /// If the intermediate product overflows 256 bits.
    pub fn mul_floor(self, amount: Amount) -> Amount {
        amount
            .checked_mul(self.0)
            .expect("decimal: product overflow")
            / SCALE
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let frac = self.0 % SCALE;
        if frac == U256::ZERO {
            return write!(f, "{whole}");
        }

        let digits = format!("{:0>18}", frac.to_string());
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for Decimal {
    type Err = DecimalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !is_digits(whole) || !is_digits(frac) {
            return Err(DecimalParseError::Invalid(s.to_owned()));
        }
        if frac.len() > DECIMAL_PLACES as usize {
            return Err(DecimalParseError::TooPrecise(s.to_owned()));
        }

        let overflow = || DecimalParseError::Overflow(s.to_owned());
        let whole: U256 = whole.parse().map_err(|_| overflow())?;
        let frac: U256 = if frac.is_empty() {
            U256::ZERO
        } else {
            let padded = format!("{frac:0<18}");
            padded.parse().map_err(|_| overflow())?
        };

        whole
            .checked_mul(SCALE)
            .and_then(|w| w.checked_add(frac))
            .map(Self)
            .ok_or_else(overflow)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parse_and_display() {
        let five_percent: Decimal = "0.05".parse().unwrap();
        assert_eq!(five_percent.atomics(), U256::new(50_000_000_000_000_000));
        assert_eq!(five_percent.to_string(), "0.05");
        assert_eq!("1".parse::<Decimal>().unwrap(), Decimal::ONE);
        assert_eq!(Decimal::ONE.to_string(), "1");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!("".parse::<Decimal>(), Err(DecimalParseError::Invalid(_))));
        assert!(matches!(".5".parse::<Decimal>(), Err(DecimalParseError::Invalid(_))));
        assert!(matches!("1.2.3".parse::<Decimal>(), Err(DecimalParseError::Invalid(_))));
        assert!(matches!(
            "0.1234567890123456789".parse::<Decimal>(),
            Err(DecimalParseError::TooPrecise(_))
        ));
    }

    #[test]
    fn slash_fraction_of_a_pool() {
        let fraction: Decimal = "0.05".parse().unwrap();
        assert_eq!(
            fraction.mul_floor(U256::new(1_000_000_000)),
            U256::new(50_000_000)
        );
    }

    #[test]
    fn ratio_by_zero_is_none() {
        assert_eq!(Decimal::from_ratio(U256::ONE, U256::ZERO), None);
    }

    proptest! {
        #[test]
        fn ratio_times_denominator_never_exceeds_numerator(num in 0u64.., den in 1u64..) {
            let num = U256::from(num);
            let den = U256::from(den);
            let ratio = Decimal::from_ratio(num, den).unwrap();
            prop_assert!(ratio.mul_floor(den) <= num);
        }
    }
}
