use serde::{Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// Mojos per XCH.
pub const MOJO_PER_XCH: u64 = 1_000_000_000_000;
pub const DISPLAY_DECIMALS: usize = 12;

/// An amount kept in mojos and displayed in XCH with 12 decimal places.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct XchAmount(u128);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid xch amount {0:?}")]
pub struct AmountError(pub String);

impl XchAmount {
    pub const ZERO: XchAmount = XchAmount(0);

    pub const fn from_mojos(mojos: u128) -> Self {
        Self(mojos)
    }

    pub const fn mojos(&self) -> u128 {
        self.0
    }

    /// Lossy conversion to display units.
    pub fn as_xch(&self) -> f64 {
        self.0 as f64 / MOJO_PER_XCH as f64
    }
}

impl From<u64> for XchAmount {
    fn from(mojos: u64) -> Self {
        Self(mojos as u128)
    }
}

impl Add for XchAmount {
    type Output = XchAmount;

    fn add(self, rhs: Self) -> Self::Output {
        XchAmount(self.0 + rhs.0)
    }
}

impl AddAssign for XchAmount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for XchAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(XchAmount::ZERO, |acc, amount| acc + amount)
    }
}

impl fmt::Display for XchAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = MOJO_PER_XCH as u128;
        write!(
            f,
            "{}.{:0width$}",
            self.0 / scale,
            self.0 % scale,
            width = DISPLAY_DECIMALS
        )
    }
}

/// Parses a non-negative decimal with at most 12 fractional digits.
impl FromStr for XchAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || AmountError(s.to_string());
        let trimmed = s.trim();
        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };
        if (whole.is_empty() && fraction.is_empty())
            || fraction.len() > DISPLAY_DECIMALS
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(err());
        }
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| err())?
        };
        let fraction: u128 = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", fraction, width = DISPLAY_DECIMALS);
            padded.parse().map_err(|_| err())?
        };
        whole
            .checked_mul(MOJO_PER_XCH as u128)
            .and_then(|mojos| mojos.checked_add(fraction))
            .map(XchAmount)
            .ok_or_else(err)
    }
}

impl Serialize for XchAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
