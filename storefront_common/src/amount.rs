use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "THB";

//--------------------------------------       Amount        ---------------------------------------------------------
/// A monetary amount in the currency's minor unit (satang, cents). The payment processor reports all amounts this way,
/// so `150000` is `1500.00`.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Amount(i64);

op!(binary Amount, Add, add);
op!(binary Amount, Sub, sub);
op!(inplace Amount, SubAssign, sub_assign);
op!(unary Amount, Neg, neg);

impl Mul<i64> for Amount {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as an amount: {0}")]
pub struct AmountConversionError(String);

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Amount {
    type Error = AmountConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(AmountConversionError(format!("Value {} is too large to convert to an Amount", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Amount {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Builds an amount from whole currency units, e.g. `Amount::from_major(1500)` is `1500.00`.
    pub fn from_major(units: i64) -> Self {
        Self(units * 100)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_uses_two_decimals() {
        assert_eq!(Amount::from(150_000).to_string(), "1500.00");
        assert_eq!(Amount::from(5).to_string(), "0.05");
        assert_eq!(Amount::from(-1_234).to_string(), "-12.34");
        assert_eq!(Amount::from_major(20), Amount::from(2_000));
    }

    #[test]
    fn arithmetic() {
        let total: Amount = [Amount::from(100), Amount::from(250)].into_iter().sum();
        assert_eq!(total, Amount::from(350));
        assert_eq!(total - Amount::from(50), Amount::from(300));
        assert_eq!(Amount::from(25) * 4, Amount::from(100));
        assert!(Amount::try_from(u64::MAX).is_err());
    }
}
