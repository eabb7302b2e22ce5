//! Fixed-point math utilities for deterministic dispatch decisions.
//!
//! All engine math uses fixed-point arithmetic to ensure deterministic
//! behavior across platforms. Floating-point operations can produce
//! different results on different CPUs, which would make target selection
//! unreproducible.
//!
//! Angular windows ("within ±90°", "within ±60°") are expressed as dot and
//! cross product tests rather than `atan2`, so no trigonometry is needed.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all engine math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// True if both components are exactly zero.
    ///
    /// A zero velocity vector means "no heading" for directional tests.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == Fixed::ZERO && self.y == Fixed::ZERO
    }

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Squared length of the vector.
    #[must_use]
    pub fn length_squared(self) -> Fixed {
        self.dot(self)
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product.
    ///
    /// Positive when `other` points to the left of `self`, negative when it
    /// points to the right, zero when collinear.
    #[must_use]
    pub fn cross(self, other: Self) -> Fixed {
        self.x * other.y - self.y * other.x
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len_sq = self.dot(self);

        if len_sq == Fixed::ZERO {
            return Self::ZERO;
        }

        let len = fixed_sqrt(len_sq);
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }
}

/// True if `v` lies within ±90° of direction `dir`.
///
/// Degrades to `true` when `dir` is the zero vector (no heading available).
#[must_use]
pub fn within_half_plane(dir: Vec2Fixed, v: Vec2Fixed) -> bool {
    if dir.is_zero() {
        return true;
    }
    dir.dot(v) >= Fixed::ZERO
}

/// True if `v` lies within a symmetric cone of half-angle `acos(cos_threshold)`
/// around direction `dir`.
///
/// Both vectors are normalized first so the comparison cannot overflow.
/// Returns `false` when either vector is zero: a missing heading never
/// satisfies a narrowed window.
#[must_use]
pub fn within_cone(dir: Vec2Fixed, v: Vec2Fixed, cos_threshold: Fixed) -> bool {
    if dir.is_zero() || v.is_zero() {
        return false;
    }
    let cos = dir.normalize().dot(v.normalize());
    cos >= cos_threshold
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::from_num(1) {
        value
    } else {
        Fixed::from_num(1)
    };

    for _ in 0..32 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    #[test]
    fn test_vec2_distance_squared() {
        let a = vec(3, 0);
        let b = vec(0, 4);
        // 3² + 4² = 25
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
    }

    #[test]
    fn test_fixed_determinism() {
        // Same operations must produce identical results
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a, b);

        let result1 = a * Fixed::from_num(7);
        let result2 = b * Fixed::from_num(7);
        assert_eq!(result1, result2);
    }

    #[test]
    fn test_cross_sign_gives_lateral_side() {
        let ahead = vec(1, 0);
        // Left of +x is +y
        assert!(ahead.cross(vec(0, 1)) > Fixed::ZERO);
        assert!(ahead.cross(vec(0, -1)) < Fixed::ZERO);
        assert_eq!(ahead.cross(vec(5, 0)), Fixed::ZERO);
    }

    #[test]
    fn test_half_plane_window() {
        let dir = vec(1, 0);
        assert!(within_half_plane(dir, vec(1, 1)));
        assert!(within_half_plane(dir, vec(0, 1))); // exactly 90° counts
        assert!(!within_half_plane(dir, vec(-1, 1)));

        // No heading: unrestricted
        assert!(within_half_plane(Vec2Fixed::ZERO, vec(-1, 0)));
    }

    #[test]
    fn test_sixty_degree_cone() {
        let dir = vec(1, 0);
        let cos_60 = Fixed::from_num(0.5);

        // Straight ahead and shallow angles pass
        assert!(within_cone(dir, vec(10, 0), cos_60));
        assert!(within_cone(dir, vec(10, 5), cos_60));
        // ~63° is outside
        assert!(!within_cone(dir, vec(1, 2), cos_60));
        // Behind is outside
        assert!(!within_cone(dir, vec(-1, 0), cos_60));
        // Zero heading never satisfies a narrowed window
        assert!(!within_cone(Vec2Fixed::ZERO, vec(1, 0), cos_60));
    }

    #[test]
    fn test_vec2_normalize() {
        let v = vec(3, 4);
        let norm = v.normalize();

        let len_sq = norm.dot(norm);
        let one = Fixed::from_num(1);
        let epsilon = one / Fixed::from_num(10000);
        assert!(
            (len_sq - one).abs() < epsilon,
            "normalized vector length² should be ~1, got {len_sq:?}"
        );
    }
}
