//! # Stake Amounts
//!
//! On-chain share totals routinely exceed the range a float can represent
//! exactly, so every stake value is an arbitrary-precision unsigned integer.
//! On the wire (JSON and postcard) a stake is a decimal string.

use crate::AtomlensError;
use num_bigint::BigUint;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// A non-negative stake amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stake(BigUint);

impl Stake {
    /// The zero stake.
    #[must_use]
    pub fn zero() -> Self {
        Self(BigUint::default())
    }

    /// Parse a decimal string, treating malformed input as zero.
    ///
    /// Used when aggregating remote data, where one bad record must not
    /// poison the whole sum.
    #[must_use]
    pub fn parse_or_zero(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == BigUint::default()
    }

    #[must_use]
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }
}

impl From<u64> for Stake {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<BigUint> for Stake {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl FromStr for Stake {
    type Err = AtomlensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AtomlensError::InvalidStake(s.to_string()));
        }
        BigUint::parse_bytes(trimmed.as_bytes(), 10)
            .map(Self)
            .ok_or_else(|| AtomlensError::InvalidStake(s.to_string()))
    }
}

impl fmt::Display for Stake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<&Stake> for Stake {
    type Output = Stake;

    fn add(self, rhs: &Stake) -> Stake {
        Stake(self.0 + &rhs.0)
    }
}

impl AddAssign<&Stake> for Stake {
    fn add_assign(&mut self, rhs: &Stake) {
        self.0 += &rhs.0;
    }
}

impl<'a> Sum<&'a Stake> for Stake {
    fn sum<I: Iterator<Item = &'a Stake>>(iter: I) -> Self {
        iter.fold(Stake::zero(), |acc, s| acc + s)
    }
}

impl Serialize for Stake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

struct StakeVisitor;

impl Visitor<'_> for StakeVisitor {
    type Value = Stake;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative decimal integer string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Stake, E> {
        v.parse().map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Stake, E> {
        Ok(Stake::from(v))
    }
}

impl<'de> Deserialize<'de> for Stake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(StakeVisitor)
    }
}

// =============================================================================
// TESTS
// =============================================================================
