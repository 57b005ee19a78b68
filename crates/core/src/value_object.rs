//! Value objects: equality by value, not identity.

use serde::{Deserialize, Serialize};

/// A non-negative currency amount in the smallest currency unit (e.g. cents).
///
/// Integer minor units keep valuation sums exact. Arithmetic saturates
/// instead of wrapping.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> u64 {
        self.0
    }

    /// Value of `quantity` units at this unit price. Negative quantities value at zero.
    pub fn times(self, quantity: i64) -> Money {
        if quantity <= 0 {
            return Money::ZERO;
        }
        Money(self.0.saturating_mul(quantity as u64))
    }

    pub fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }
}

impl core::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.saturating_add(rhs);
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
