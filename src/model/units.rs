use std::fmt;
use std::ops::{Add, Sub};

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// Decimal measure in key units with a fixed precision of 1/100.
///
/// Values are stored as a signed count of hundredths, so shifting and
/// comparing coordinates never accumulates floating point error. Conversions
/// from `f64` round to the nearest hundredth with ties away from zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Units(i64);

impl Units {
    /// Number of stored steps per key unit.
    pub const SCALE: i64 = 100;
    pub const ZERO: Units = Units(0);
    pub const ONE: Units = Units(Self::SCALE);

    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    pub const fn from_int(units: i64) -> Self {
        Self(units * Self::SCALE)
    }

    /// Round a floating point value to the nearest hundredth.
    ///
    /// Returns `None` for non-finite input or values outside the `i64` range.
    pub fn from_f64(value: f64) -> Option<Self> {
        let scaled = (value * Self::SCALE as f64).round();
        if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(Self(scaled as i64))
    }

    pub const fn hundredths(self) -> i64 {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_whole(self) -> bool {
        self.0 % Self::SCALE == 0
    }

    pub const fn checked_sub(self, rhs: Units) -> Option<Units> {
        match self.0.checked_sub(rhs.0) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }
}

impl Add for Units {
    type Output = Units;

    fn add(self, rhs: Units) -> Units {
        Units(self.0 + rhs.0)
    }
}

impl Sub for Units {
    type Output = Units;

    fn sub(self, rhs: Units) -> Units {
        Units(self.0 - rhs.0)
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / Self::SCALE as u64;
        let frac = abs % Self::SCALE as u64;
        match frac {
            0 => write!(f, "{sign}{whole}"),
            f2 if f2 % 10 == 0 => write!(f, "{sign}{whole}.{}", f2 / 10),
            f2 => write!(f, "{sign}{whole}.{f2:02}"),
        }
    }
}

impl Serialize for Units {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.is_whole() {
            serializer.serialize_i64(self.0 / Self::SCALE)
        } else {
            serializer.serialize_f64(self.to_f64())
        }
    }
}

struct UnitsVisitor;

impl Visitor<'_> for UnitsVisitor {
    type Value = Units;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a finite number")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Units, E> {
        value
            .checked_mul(Units::SCALE)
            .map(Units)
            .ok_or_else(|| E::custom(format!("number {value} is out of range")))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Units, E> {
        i64::try_from(value)
            .map_err(|_| E::custom(format!("number {value} is out of range")))
            .and_then(|v| self.visit_i64(v))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Units, E> {
        Units::from_f64(value).ok_or_else(|| E::custom(format!("number {value} is out of range")))
    }
}

impl<'de> Deserialize<'de> for Units {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(UnitsVisitor)
    }
}
