//! Fixed-point money in minor units.
//!
//! Balances and stakes are stored as whole hundredths so accounting is exact.
//! Amounts cross the wire as doubles and are converted at the protocol edge.

use std::{fmt, iter::Sum, ops::Add};

/// Non-negative amount in hundredths of the currency unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(u64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Minor units per major unit.
    pub const SCALE: u64 = 100;

    /// Amount from minor units.
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Amount from whole major units.
    pub const fn from_major(major: u64) -> Self {
        Self(major * Self::SCALE)
    }

    /// Parse a client-supplied amount, rounding to the nearest hundredth.
    ///
    /// Returns `None` for negative, NaN, or infinite input.
    pub fn from_f64(amount: f64) -> Option<Self> {
        if !amount.is_finite() || amount < 0.0 {
            return None;
        }
        let minor = (amount * Self::SCALE as f64).round();
        if minor > u64::MAX as f64 {
            return None;
        }
        Some(Self(minor as u64))
    }

    /// Minor units.
    pub const fn minor(self) -> u64 {
        self.0
    }

    /// Value for the wire.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    /// True for zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtraction that refuses to go below zero.
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Subtraction clamped at zero.
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// `self × multiplier`, rounded down to the hundredth.
    ///
    /// Every payout goes through this, so the house-risk check and the
    /// credited amount agree to the last unit.
    pub fn scale(self, multiplier: f64) -> Self {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Self::ZERO;
        }
        let scaled = (self.0 as f64 * multiplier).floor();
        if scaled >= u64::MAX as f64 { Self(u64::MAX) } else { Self(scaled as u64) }
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / Self::SCALE, self.0 % Self::SCALE)
    }
}
