//! Exact conversion between display amounts (`0.01`) and on-chain base units.
//!
//! Everything here is integer arithmetic on [`BigUint`]; no floating point is
//! involved at any step.

use num_bigint::BigUint;
use num_traits::Zero;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    #[error("empty amount")]
    Empty,

    #[error("invalid decimal amount: {0:?}")]
    Invalid(String),

    #[error("negative amounts are not allowed")]
    Negative,
}

/// A non-negative decimal number held exactly as `digits * 10^-scale`.
///
/// Always normalized: `scale` carries no trailing zero digits, so two equal
/// values compare equal regardless of how they were written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Decimal {
    digits: BigUint,
    scale: u32,
}

impl Decimal {
    pub fn new(digits: BigUint, scale: u32) -> Self {
        let mut value = Self { digits, scale };
        value.normalize();
        value
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.digits.is_zero()
    }

    fn normalize(&mut self) {
        if self.digits.is_zero() {
            self.scale = 0;
            return;
        }
        let ten = BigUint::from(10u32);
        while self.scale > 0 && (&self.digits % &ten).is_zero() {
            self.digits /= &ten;
            self.scale -= 1;
        }
    }
}

impl FromStr for Decimal {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(UnitError::Empty);
        }
        if s.starts_with('-') {
            return Err(UnitError::Negative);
        }
        let unsigned = s.strip_prefix('+').unwrap_or(s);

        let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !all_digits(int_part)
            || !all_digits(frac_part)
        {
            return Err(UnitError::Invalid(s.to_string()));
        }

        let combined = format!("{int_part}{frac_part}");
        let digits = BigUint::parse_bytes(combined.as_bytes(), 10)
            .ok_or_else(|| UnitError::Invalid(s.to_string()))?;
        let scale =
            u32::try_from(frac_part.len()).map_err(|_| UnitError::Invalid(s.to_string()))?;

        Ok(Decimal::new(digits, scale))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.digits.to_str_radix(10);
        if self.scale == 0 {
            return f.write_str(&raw);
        }

        let scale = self.scale as usize;
        let padded = if raw.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - raw.len()), raw)
        } else {
            raw
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{int_part}.{frac_part}")
    }
}

fn pow10(exp: u32) -> BigUint {
    BigUint::from(10u32).pow(exp)
}

/// Scales `amount` up by `10^decimals`, truncating any digits beyond
/// `decimals` fractional places.
pub fn to_base_units(amount: &Decimal, decimals: u32) -> BigUint {
    if amount.scale <= decimals {
        &amount.digits * pow10(decimals - amount.scale)
    } else {
        &amount.digits / pow10(amount.scale - decimals)
    }
}

/// Parses a human-entered decimal string and converts it to base units.
pub fn parse_base_units(amount: &str, decimals: u32) -> Result<BigUint, UnitError> {
    let amount: Decimal = amount.parse()?;
    Ok(to_base_units(&amount, decimals))
}

/// Exact quotient `value / 10^decimals`.
pub fn to_display_units(value: &BigUint, decimals: u32) -> Decimal {
    Decimal::new(value.clone(), decimals)
}
