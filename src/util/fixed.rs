//! Fixed-point seconds for the match timer.
//! i64 with 16 fractional bits (65536 = 1.0). Simulation decisions never touch floats.

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};

pub const FRAC: u32 = 16;
const ONE_RAW: i64 = 1 << FRAC;

/// Deterministic fixed-point number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fixed(i64);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(ONE_RAW);

    /// Convert an integer to fixed-point
    pub const fn from_int(v: i64) -> Self {
        Self(v << FRAC)
    }

    /// `num / den` rounded toward zero
    pub const fn from_ratio(num: i64, den: i64) -> Self {
        Self((num << FRAC) / den)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Lossy conversion, display only
    pub fn to_secs_f32(self) -> f32 {
        self.0 as f32 / ONE_RAW as f32
    }
}

impl Add for Fixed {
    type Output = Fixed;

    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 + rhs.0)
    }
}

impl AddAssign for Fixed {
    fn add_assign(&mut self, rhs: Fixed) {
        self.0 += rhs.0;
    }
}

impl Sub for Fixed {
    type Output = Fixed;

    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0 - rhs.0)
    }
}

impl SubAssign for Fixed {
    fn sub_assign(&mut self, rhs: Fixed) {
        self.0 -= rhs.0;
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.to_secs_f32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixty_ticks_make_one_second() {
        let dt = Fixed::from_ratio(1, 60);
        let mut t = Fixed::ZERO;
        for _ in 0..60 {
            t += dt;
        }
        // Truncated ratio loses at most one raw unit per step
        assert!(Fixed::ONE.raw() - t.raw() < 60);
        assert!(t.raw() <= Fixed::ONE.raw());
    }

    #[test]
    fn displays_seconds() {
        assert_eq!(Fixed::from_int(3).to_string(), "3.000");
        assert_eq!((Fixed::ONE - Fixed::from_ratio(1, 2)).to_string(), "0.500");
    }
}
