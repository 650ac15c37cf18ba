//! Position vectors and distance queries.

use std::ops::{Add, Mul, Sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A position or displacement in detector coordinates (cm).
///
/// 2-D hits live in the (x, z) plane with `y == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CartesianVector {
    /// Drift coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
    /// Wire coordinate.
    pub z: f32,
}

impl CartesianVector {
    /// Creates a new vector.
    #[inline]
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Creates a vector in the 2-D (x, z) view plane.
    #[inline]
    #[must_use]
    pub fn in_view(x: f32, z: f32) -> Self {
        Self { x, y: 0.0, z }
    }

    /// Dot product.
    #[inline]
    #[must_use]
    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Squared magnitude.
    #[inline]
    #[must_use]
    pub fn magnitude_squared(&self) -> f32 {
        self.dot(self)
    }

    /// Magnitude.
    #[inline]
    #[must_use]
    pub fn magnitude(&self) -> f32 {
        self.magnitude_squared().sqrt()
    }

    /// Squared Euclidean distance to another point.
    #[inline]
    #[must_use]
    pub fn distance_squared(&self, other: &Self) -> f32 {
        (*self - *other).magnitude_squared()
    }

    /// Returns the unit vector, or `None` for a zero-length vector.
    #[must_use]
    pub fn unit_vector(&self) -> Option<Self> {
        let magnitude = self.magnitude();
        if magnitude < f32::EPSILON {
            return None;
        }
        Some(*self * (1.0 / magnitude))
    }
}

impl Add for CartesianVector {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for CartesianVector {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for CartesianVector {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}
