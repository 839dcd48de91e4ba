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

pub const CURRENCY_CODE: &str = "IDR";

//--------------------------------------       Rupiah        ---------------------------------------------------------
/// A monetary amount in whole rupiah. The storefront only trades in IDR, which has no minor unit in practice, so all
/// prices, discounts and gateway amounts are integers.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Rupiah(i64);

op!(binary Rupiah, Add, add);
op!(binary Rupiah, Sub, sub);
op!(inplace Rupiah, SubAssign, sub_assign);
op!(unary Rupiah, Neg, neg);

impl Mul<i64> for Rupiah {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Rupiah {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented in rupiah: {0}")]
pub struct RupiahConversionError(String);

impl From<i64> for Rupiah {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Rupiah {
    type Error = RupiahConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| RupiahConversionError(format!("Value {value} is too large to convert to Rupiah")))
    }
}

/// Parses amounts the way payment gateways render them, e.g. `"200000"` or `"200000.00"`. A non-zero fractional
/// part is rejected, since it cannot be represented.
impl FromStr for Rupiah {
    type Err = RupiahConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (whole, fraction) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if !fraction.chars().all(|c| c == '0') {
            return Err(RupiahConversionError(format!("{s} has a fractional rupiah component")));
        }
        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(RupiahConversionError(format!("{s} is not a valid amount")));
        }
        whole.parse::<i64>().map(Self).map_err(|e| RupiahConversionError(format!("{s}: {e}")))
    }
}

impl Display for Rupiah {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rp{}", self.0)
    }
}

impl Rupiah {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn zero() -> Self {
        Self(0)
    }

    /// `percent`% of this amount, rounded down to the nearest rupiah.
    pub fn percentage(&self, percent: i64) -> Self {
        let result = (i128::from(self.0) * i128::from(percent)) / 100;
        Self(i64::try_from(result).unwrap_or(i64::MAX))
    }
}
