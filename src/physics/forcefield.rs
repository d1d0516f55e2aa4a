use super::body::{RadialForce, RadialForceKind};
use crate::math::{CoordinateMapper, Vec2};

/// A (possibly) position-dependent force that is
/// applied to every body in its area of effect each frame.
pub trait ForceField {
    fn value_at(&self, position: Vec2) -> Vec2;
}

/// Constant acceleration over all of space.
#[derive(Clone, Copy, Debug)]
pub struct Gravity(pub Vec2);
impl ForceField for Gravity {
    fn value_at(&self, _pos: Vec2) -> Vec2 {
        self.0
    }
}

/// The field around a body emitting a [`RadialForce`], in logical units.
#[derive(Clone, Copy, Debug)]
pub struct RadialField {
    /// The position of the source.
    pub center: Vec2,
    pub kind: RadialForceKind,
    /// The strength at the source.
    pub magnitude: f64,
    /// Distance at which the strength reaches zero.
    pub max_radius: f64,
}

impl RadialField {
    pub fn new(center: Vec2, force: &RadialForce, mapper: &impl CoordinateMapper) -> Self {
        Self {
            center,
            kind: force.kind,
            magnitude: mapper.logical_length(force.magnitude),
            max_radius: mapper.logical_length(force.max_radius),
        }
    }

    /// Whether a point is close enough to feel the field.
    #[inline]
    pub fn reaches(&self, position: Vec2) -> bool {
        (position - self.center).mag_sq() < self.max_radius * self.max_radius
    }

    /// Strength at a distance from the source, decreasing linearly to zero.
    pub fn strength_at(&self, distance: f64) -> f64 {
        if distance >= self.max_radius {
            0.0
        } else {
            self.magnitude * (1.0 - distance / self.max_radius)
        }
    }
}

impl ForceField for RadialField {
    fn value_at(&self, pos: Vec2) -> Vec2 {
        let dist = pos - self.center;
        let dist_mag = dist.mag();
        // no direction to push in at the source itself
        if dist_mag == 0.0 {
            return Vec2::zero();
        }
        let outward = dist / dist_mag;
        let strength = self.strength_at(dist_mag);
        match self.kind {
            RadialForceKind::Explosion | RadialForceKind::Repulsion => outward * strength,
            RadialForceKind::Attraction => -outward * strength,
        }
    }
}
