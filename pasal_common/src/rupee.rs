use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const NPR_CURRENCY_CODE: &str = "NPR";
pub const NPR_CURRENCY_CODE_LOWER: &str = "npr";

//--------------------------------------        Rupee        ---------------------------------------------------------
/// A monetary amount in Nepalese rupees, stored as an integer number of paisa (1 Re = 100 paisa).
///
/// All financial columns in the database use this representation. Floating point never enters the money path, so
/// repeated recomputation of order totals is exactly reproducible.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Rupee(i64);

op!(binary Rupee, Add, add);
op!(binary Rupee, Sub, sub);
op!(inplace Rupee, SubAssign, sub_assign);
op!(unary Rupee, Neg, neg);

impl Mul<i64> for Rupee {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Rupee {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in paisa: {0}")]
pub struct RupeeConversionError(String);

impl From<i64> for Rupee {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Rupee {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Rupee {}

impl TryFrom<u64> for Rupee {
    type Error = RupeeConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(RupeeConversionError(format!("Value {} is too large to convert to Rupee", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Rupee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rs {}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

impl Rupee {
    /// The amount in paisa.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_rupees(rupees: i64) -> Self {
        Self(rupees * 100)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiply by a percentage (in whole percent), rounding to the nearest paisa, half away from zero.
    pub fn percent(&self, pct: u32) -> Self {
        let raw = i128::from(self.0) * i128::from(pct);
        let rounded = (raw + if raw >= 0 { 50 } else { -50 }) / 100;
        #[allow(clippy::cast_possible_truncation)]
        Self(rounded as i64)
    }

    /// Multiply by a rate in basis points (1/100th of a percent), rounding to the nearest paisa.
    pub fn basis_points(&self, bp: u32) -> Self {
        let raw = i128::from(self.0) * i128::from(bp);
        let rounded = (raw + if raw >= 0 { 5_000 } else { -5_000 }) / 10_000;
        #[allow(clippy::cast_possible_truncation)]
        Self(rounded as i64)
    }

    /// Formats the amount as a plain decimal string with two decimals, e.g. "1280.00".
    /// This is the format the eSewa form fields and signature payloads use.
    pub fn to_decimal_string(&self) -> String {
        format!("{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

/// Parse a decimal string (e.g. "1280.00" or "1280") into paisa. Gateways report amounts as decimal strings.
impl FromStr for Rupee {
    type Err = RupeeConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(2, '.');
        let whole =
            parts.next().ok_or_else(|| RupeeConversionError(s.to_string()))?.parse::<i64>().map_err(|e| {
                RupeeConversionError(format!("Invalid amount: {s}. {e}"))
            })?;
        let paisa = match parts.next() {
            None => 0,
            Some(frac) => {
                let frac = format!("{:0<2}", frac);
                if frac.len() > 2 {
                    return Err(RupeeConversionError(format!("Too many decimal places: {s}")));
                }
                frac.parse::<i64>().map_err(|e| RupeeConversionError(format!("Invalid amount: {s}. {e}")))?
            },
        };
        let sign = if whole < 0 { -1 } else { 1 };
        Ok(Self(whole * 100 + sign * paisa))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Rupee::from(128_000).to_string(), "Rs 1280.00");
        assert_eq!(Rupee::from(50).to_string(), "Rs 0.50");
    }

    #[test]
    fn percent_rounds_to_nearest_paisa() {
        assert_eq!(Rupee::from_rupees(900).percent(13), Rupee::from_rupees(117));
        assert_eq!(Rupee::from(101).percent(50), Rupee::from(51));
    }

    #[test]
    fn parse_decimal_strings() {
        assert_eq!("1280.00".parse::<Rupee>().unwrap(), Rupee::from_rupees(1280));
        assert_eq!("1280.5".parse::<Rupee>().unwrap(), Rupee::from(128_050));
        assert_eq!("1280".parse::<Rupee>().unwrap(), Rupee::from_rupees(1280));
        assert!("12.345".parse::<Rupee>().is_err());
        assert!("abc".parse::<Rupee>().is_err());
    }

    #[test]
    fn round_trips_decimal_string() {
        let amount = Rupee::from(128_050);
        assert_eq!(amount.to_decimal_string().parse::<Rupee>().unwrap(), amount);
    }
}
