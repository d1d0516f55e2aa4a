//! Types, aliases and helper operations for doing math with `ultraviolet`.
pub use ultraviolet as uv;

/// All positions and vectors are in logical screen units, with `+y` pointing down.
pub type Vec2 = uv::DVec2;

/// A wrapper type to indicate a vector should always be normalized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Unit<T>(T);

impl Unit<Vec2> {
    /// Normalize a vector, returning None if it is too short to have a direction.
    pub fn try_new(v: Vec2) -> Option<Self> {
        let mag_sq = v.mag_sq();
        if mag_sq < 1e-18 || !mag_sq.is_finite() {
            None
        } else {
            Some(Unit(v / mag_sq.sqrt()))
        }
    }

    pub const fn new_unchecked(v: Vec2) -> Self {
        Unit(v)
    }

    pub fn unit_x() -> Self {
        Unit(Vec2::unit_x())
    }

    #[inline]
    pub fn into_inner(self) -> Vec2 {
        self.0
    }
}

impl<T> std::ops::Deref for Unit<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> std::ops::Neg for Unit<T>
where
    T: std::ops::Neg,
{
    type Output = Unit<<T as std::ops::Neg>::Output>;

    fn neg(self) -> Self::Output {
        Unit(-self.0)
    }
}

// Vec2 utils

#[inline]
pub fn left_normal(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}
#[inline]
pub fn right_normal(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}

/// The z component of the 3D cross product of two planar vectors.
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Rotate a vector counterclockwise (in the mathematical sense) by an angle in radians.
#[inline]
pub fn rotate(v: Vec2, angle: f64) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

#[inline]
pub fn polar_to_cartesian(angle: f64, radius: f64) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(radius * cos, radius * sin)
}

/// Returns `(angle, radius)`.
#[inline]
pub fn cartesian_to_polar(v: Vec2) -> (f64, f64) {
    (v.y.atan2(v.x), v.mag())
}

#[inline]
pub fn is_finite(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

//
// Unit conversion
//

/// Converts physical quantities (e.g. metres, metres per second squared)
/// into the logical units the engine simulates in.
///
/// The engine never computes this mapping itself; the surrounding game
/// supplies it based on the on-screen size of the board.
pub trait CoordinateMapper {
    fn logical_vector(&self, physical: Vec2) -> Vec2;
    fn logical_length(&self, physical: f64) -> f64;
}

/// Physical and logical units are the same.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityMapper;

impl CoordinateMapper for IdentityMapper {
    #[inline]
    fn logical_vector(&self, physical: Vec2) -> Vec2 {
        physical
    }

    #[inline]
    fn logical_length(&self, physical: f64) -> f64 {
        physical
    }
}

/// Uniform scaling between physical and logical units.
#[derive(Clone, Copy, Debug)]
pub struct ScaleMapper {
    pub logical_per_physical: f64,
}

impl CoordinateMapper for ScaleMapper {
    #[inline]
    fn logical_vector(&self, physical: Vec2) -> Vec2 {
        physical * self.logical_per_physical
    }

    #[inline]
    fn logical_length(&self, physical: f64) -> f64 {
        physical * self.logical_per_physical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn rotate_quarter_turn() {
        let r = rotate(Vec2::new(1.0, 0.0), PI / 2.0);
        assert!(r.x.abs() < 1e-12);
        assert!((r.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn polar_conversion_roundtrip() {
        let v = Vec2::new(-3.0, 4.0);
        let (angle, radius) = cartesian_to_polar(v);
        assert!((radius - 5.0).abs() < 1e-12);
        let back = polar_to_cartesian(angle, radius);
        assert!((back - v).mag() < 1e-12);
    }

    #[test]
    fn zero_vector_has_no_direction() {
        assert!(Unit::try_new(Vec2::zero()).is_none());
        let u = Unit::try_new(Vec2::new(0.0, 2.0)).unwrap();
        assert_eq!(*u, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn scale_mapper_scales_both() {
        let mapper = ScaleMapper {
            logical_per_physical: 10.0,
        };
        assert_eq!(mapper.logical_length(1.5), 15.0);
        assert_eq!(
            mapper.logical_vector(Vec2::new(0.0, 9.8)),
            Vec2::new(0.0, 98.0)
        );
    }
}
