//! Bounding boxes, the broad phase spatial index and narrow phase shape-shape tests.

use super::shape::Shape;
use crate::math::Vec2;

pub mod quadtree;
pub use quadtree::{QuadTree, QuadTreeParams, Quadrant};

pub mod shape_shape;
pub use shape_shape::{collision_data, is_colliding, Contact};

/// An axis-aligned bounding box.
///
/// Besides the geometric box this tracks the center of mass of the object
/// it was computed from, which is not the box center for asymmetric shapes
/// such as an edited triangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AABB {
    pub center: Vec2,
    pub half_extents: Vec2,
    pub center_of_mass: Vec2,
}

impl AABB {
    /// Compute the box of a shape. Shapes change often, so this is never cached.
    pub fn from_shape(shape: &Shape) -> Self {
        match shape {
            Shape::Circle(c) => {
                let r = c.radius();
                AABB {
                    center: c.center(),
                    half_extents: Vec2::new(r, r),
                    center_of_mass: c.center(),
                }
            }
            Shape::Polygon(p) => {
                let verts = p.vertices();
                let mut min = Vec2::broadcast(f64::INFINITY);
                let mut max = Vec2::broadcast(f64::NEG_INFINITY);
                for v in &verts {
                    min = min.min_by_component(*v);
                    max = max.max_by_component(*v);
                }
                let mut aabb = AABB::from_min_max(min, max);
                aabb.center_of_mass = p.centroid();
                aabb
            }
        }
    }

    /// Create a box whose center of mass is its geometric center.
    pub fn new(center: Vec2, half_extents: Vec2) -> Self {
        AABB {
            center,
            half_extents,
            center_of_mass: center,
        }
    }

    pub fn from_min_max(min: Vec2, max: Vec2) -> Self {
        AABB::new((min + max) / 2.0, (max - min) / 2.0)
    }

    #[inline]
    pub fn min(&self) -> Vec2 {
        self.center - self.half_extents
    }

    #[inline]
    pub fn max(&self) -> Vec2 {
        self.center + self.half_extents
    }

    #[inline]
    pub fn left(&self) -> f64 {
        self.center.x - self.half_extents.x
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.center.x + self.half_extents.x
    }

    /// The edge with the smaller y coordinate (screen coordinates point down).
    #[inline]
    pub fn top(&self) -> f64 {
        self.center.y - self.half_extents.y
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.center.y + self.half_extents.y
    }

    #[inline]
    pub fn width(&self) -> f64 {
        2.0 * self.half_extents.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        2.0 * self.half_extents.y
    }

    /// Check whether two boxes overlap. Touching edges count as overlapping.
    #[inline]
    pub fn overlaps(&self, other: &AABB) -> bool {
        self.left() <= other.right()
            && other.left() <= self.right()
            && self.top() <= other.bottom()
            && other.top() <= self.bottom()
    }

    /// Check whether another box lies entirely within this one.
    #[inline]
    pub fn contains(&self, other: &AABB) -> bool {
        self.left() <= other.left()
            && other.right() <= self.right()
            && self.top() <= other.top()
            && other.bottom() <= self.bottom()
    }

    #[inline]
    pub fn contains_point(&self, point: Vec2) -> bool {
        self.left() <= point.x
            && point.x <= self.right()
            && self.top() <= point.y
            && point.y <= self.bottom()
    }

    /// Get a box extended by `amount` in every direction.
    pub fn padded(&self, amount: f64) -> AABB {
        AABB {
            half_extents: self.half_extents + Vec2::broadcast(amount),
            ..*self
        }
    }

    /// Get the smallest box containing both boxes.
    pub fn union(&self, other: &AABB) -> AABB {
        AABB::from_min_max(
            self.min().min_by_component(other.min()),
            self.max().max_by_component(other.max()),
        )
    }

    pub fn translated(&self, offset: Vec2) -> AABB {
        AABB {
            center: self.center + offset,
            half_extents: self.half_extents,
            center_of_mass: self.center_of_mass + offset,
        }
    }
}
