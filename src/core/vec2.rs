//! Fixed-Point Ground-Plane Vector
//!
//! Deterministic 2D vector on the world XZ plane.
//! Height is owned by the movement collaborator and never enters hit logic.

use std::fmt;
use std::ops::{Add, Sub, Neg};
use serde::{Serialize, Deserialize};

use super::fixed::{
    Fixed, Wide, FIXED_ONE, FIXED_SCALE,
    fixed_mul, fixed_div, wide_mul, wide_sqrt,
};

/// Ground-plane vector with fixed-point components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FixedVec2 {
    /// World X component (Q16.16 fixed-point)
    pub x: Fixed,
    /// World Z component (Q16.16 fixed-point)
    pub z: Fixed,
}

impl FixedVec2 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0, z: 0 };

    /// Unit vector along +X
    pub const RIGHT: Self = Self { x: FIXED_ONE, z: 0 };

    /// Unit vector along +Z
    pub const FORWARD: Self = Self { x: 0, z: FIXED_ONE };

    /// Create a new vector from fixed-point components.
    #[inline]
    pub const fn new(x: Fixed, z: Fixed) -> Self {
        Self { x, z }
    }

    /// Create a vector from integer components.
    #[inline]
    pub const fn from_ints(x: i32, z: i32) -> Self {
        Self {
            x: x << FIXED_SCALE,
            z: z << FIXED_SCALE,
        }
    }

    /// Add another vector.
    #[inline]
    pub fn add(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_add(other.x),
            z: self.z.wrapping_add(other.z),
        }
    }

    /// Subtract another vector.
    #[inline]
    pub fn sub(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_sub(other.x),
            z: self.z.wrapping_sub(other.z),
        }
    }

    /// Scale by a fixed-point scalar.
    #[inline]
    pub fn scale(self, scalar: Fixed) -> Self {
        Self {
            x: fixed_mul(self.x, scalar),
            z: fixed_mul(self.z, scalar),
        }
    }

    /// Divide by a fixed-point scalar.
    #[inline]
    pub fn div_scalar(self, scalar: Fixed) -> Self {
        Self {
            x: fixed_div(self.x, scalar),
            z: fixed_div(self.z, scalar),
        }
    }

    /// Squared length, wide so long arena spans cannot overflow.
    #[inline]
    pub fn length_squared(self) -> Wide {
        wide_mul(self.x, self.x) + wide_mul(self.z, self.z)
    }

    /// Length (magnitude). Prefer `length_squared` when possible.
    #[inline]
    pub fn length(self) -> Fixed {
        wide_sqrt(self.length_squared())
    }

    /// Squared distance to another point.
    #[inline]
    pub fn distance_squared(self, other: Self) -> Wide {
        self.sub(other).length_squared()
    }

    /// Distance to another point. Prefer `distance_squared` when possible.
    #[inline]
    pub fn distance(self, other: Self) -> Fixed {
        wide_sqrt(self.distance_squared(other))
    }

    /// Normalize to unit length.
    /// Returns ZERO if length is zero.
    #[inline]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0 {
            return Self::ZERO;
        }
        self.div_scalar(len)
    }

    /// Dot product with another vector.
    #[inline]
    pub fn dot(self, other: Self) -> Wide {
        wide_mul(self.x, other.x) + wide_mul(self.z, other.z)
    }

    /// Rotate 90 degrees counter-clockwise (seen from above).
    #[inline]
    pub fn perpendicular(self) -> Self {
        Self {
            x: self.z.wrapping_neg(),
            z: self.x,
        }
    }

    /// Negate both components.
    #[inline]
    pub fn negate(self) -> Self {
        Self {
            x: self.x.wrapping_neg(),
            z: self.z.wrapping_neg(),
        }
    }

    /// Convert to float tuple for rendering.
    #[inline]
    pub fn to_floats(self) -> (f32, f32) {
        (
            self.x as f32 / FIXED_ONE as f32,
            self.z as f32 / FIXED_ONE as f32,
        )
    }
}

// Operator overloads for ergonomics
impl Add for FixedVec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        FixedVec2::add(self, rhs)
    }
}

impl Sub for FixedVec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        FixedVec2::sub(self, rhs)
    }
}

impl Neg for FixedVec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.negate()
    }
}

impl fmt::Debug for FixedVec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (fx, fz) = self.to_floats();
        write!(f, "Vec2({:.3}, {:.3})", fx, fz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::to_fixed;

    #[test]
    fn test_add_sub() {
        let a = FixedVec2::from_ints(1, 2);
        let b = FixedVec2::from_ints(3, 4);
        assert_eq!(a + b, FixedVec2::from_ints(4, 6));
        assert_eq!(b - a, FixedVec2::from_ints(2, 2));
        assert_eq!(-a, FixedVec2::from_ints(-1, -2));
    }

    #[test]
    fn test_length() {
        let v = FixedVec2::from_ints(3, 4);
        assert_eq!(v.length(), to_fixed(5.0));
        assert_eq!(v.length_squared(), 25i64 << 16);
    }

    #[test]
    fn test_long_distance_no_overflow() {
        let a = FixedVec2::from_ints(-300, 0);
        let b = FixedVec2::from_ints(300, 0);
        assert_eq!(a.distance(b), to_fixed(600.0));
    }

    #[test]
    fn test_normalize() {
        let v = FixedVec2::from_ints(10, 0).normalize();
        assert_eq!(v, FixedVec2::RIGHT);
        assert_eq!(FixedVec2::ZERO.normalize(), FixedVec2::ZERO);

        let diag = FixedVec2::from_ints(1, 1).normalize();
        let len = diag.length();
        assert!((len - FIXED_ONE).abs() < 16, "normalized length ~1.0");
    }

    #[test]
    fn test_dot_and_perpendicular() {
        let v = FixedVec2::from_ints(2, 1);
        assert_eq!(v.dot(v.perpendicular()), 0);
        assert_eq!(FixedVec2::RIGHT.dot(FixedVec2::RIGHT), FIXED_ONE as i64);
    }
}
