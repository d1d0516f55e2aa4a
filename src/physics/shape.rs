//! Planar convex shapes that bodies are made of.
//!
//! Polygon vertices are stored as polar offsets from the shape's own center
//! and only turned into world-space points on demand, after applying scale
//! and rotation. This keeps editing operations (rotate a peg, drag a triangle
//! corner, resize a block) cheap and free of accumulated floating point drift.

use super::collision::AABB;
use crate::math::{self as m, Vec2};

use itertools::Itertools;
use std::f64::consts::PI;

/// Error when constructing or editing a shape with invalid geometry.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ShapeError {
    #[error("radius must be positive, got {0}")]
    NonPositiveRadius(f64),
    #[error("scale must be positive, got {0}")]
    NonPositiveScale(f64),
    #[error("width and height must be positive, got {0}x{1}")]
    NonPositiveSize(f64, f64),
    #[error("a regular polygon needs at least 3 sides, got {0}")]
    TooFewSides(usize),
    #[error("triangle corners are collinear")]
    DegenerateTriangle,
    #[error("shape parameters must be finite")]
    NonFinite,
    #[error("vertex {0} cannot be edited on this shape")]
    VertexOutOfRange(usize),
}

/// The physical shape of a body.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Circle(Circle),
    Polygon(Polygon),
}

impl From<Circle> for Shape {
    fn from(c: Circle) -> Self {
        Shape::Circle(c)
    }
}

impl From<Polygon> for Shape {
    fn from(p: Polygon) -> Self {
        Shape::Polygon(p)
    }
}

impl Shape {
    /// The point the shape is positioned, scaled and rotated around.
    #[inline]
    pub fn center(&self) -> Vec2 {
        match self {
            Shape::Circle(c) => c.center,
            Shape::Polygon(p) => p.center,
        }
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        match self {
            Shape::Circle(c) => c.scale,
            Shape::Polygon(p) => p.scale,
        }
    }

    #[inline]
    pub fn rotation(&self) -> f64 {
        match self {
            Shape::Circle(c) => c.rotation,
            Shape::Polygon(p) => p.rotation,
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Shape::Circle(c) => PI * c.radius() * c.radius(),
            Shape::Polygon(p) => p.area(),
        }
    }

    pub fn centroid(&self) -> Vec2 {
        match self {
            Shape::Circle(c) => c.center,
            Shape::Polygon(p) => p.centroid(),
        }
    }

    /// Second moment of area around the centroid.
    ///
    /// For circles this is only a nominal `r^2 / 2`;
    /// circles never rotate in this engine so the value has no effect.
    pub fn area_moment_of_inertia(&self) -> f64 {
        match self {
            Shape::Circle(c) => c.radius() * c.radius() / 2.0,
            Shape::Polygon(p) => p.area_moment_of_inertia(),
        }
    }

    /// World-space vertices. Empty for circles.
    pub fn vertices(&self) -> Vec<Vec2> {
        match self {
            Shape::Circle(_) => Vec::new(),
            Shape::Polygon(p) => p.vertices(),
        }
    }

    #[inline]
    pub fn aabb(&self) -> AABB {
        AABB::from_shape(self)
    }

    /// Check whether a point is strictly inside the shape.
    pub fn contains_point(&self, point: Vec2) -> bool {
        match self {
            Shape::Circle(c) => (point - c.center).mag_sq() < c.radius() * c.radius(),
            Shape::Polygon(p) => p.contains_point(point),
        }
    }

    /// Move the shape so that its center is at the given point.
    pub fn translated_to(&self, center: Vec2) -> Shape {
        let mut shape = self.clone();
        shape.set_center(center);
        shape
    }

    #[inline]
    pub(crate) fn set_center(&mut self, center: Vec2) {
        match self {
            Shape::Circle(c) => c.center = center,
            Shape::Polygon(p) => p.center = center,
        }
    }

    #[inline]
    pub(crate) fn set_rotation(&mut self, rotation: f64) {
        match self {
            Shape::Circle(c) => c.rotation = rotation,
            Shape::Polygon(p) => p.rotation = rotation,
        }
    }

    /// Set the uniform scale applied on top of the base size.
    pub fn with_scale(&self, scale: f64) -> Result<Shape, ShapeError> {
        check_scale(scale)?;
        let mut shape = self.clone();
        match &mut shape {
            Shape::Circle(c) => c.scale = scale,
            Shape::Polygon(p) => p.scale = scale,
        }
        Ok(shape)
    }

    /// Multiply the current scale by a factor.
    pub fn scaled_by(&self, factor: f64) -> Result<Shape, ShapeError> {
        self.with_scale(self.scale() * factor)
    }

    pub fn with_rotation(&self, rotation: f64) -> Shape {
        let mut shape = self.clone();
        shape.set_rotation(rotation);
        shape
    }

    pub fn rotated_by(&self, angle: f64) -> Shape {
        self.with_rotation(self.rotation() + angle)
    }
}

fn check_scale(scale: f64) -> Result<(), ShapeError> {
    if !scale.is_finite() {
        Err(ShapeError::NonFinite)
    } else if scale <= 0.0 {
        Err(ShapeError::NonPositiveScale(scale))
    } else {
        Ok(())
    }
}

//
// Circle
//

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
    pub(crate) center: Vec2,
    base_radius: f64,
    pub(crate) scale: f64,
    /// Carried for uniformity with polygons, has no geometric effect.
    pub(crate) rotation: f64,
}

impl Circle {
    pub fn new(center: Vec2, radius: f64) -> Result<Self, ShapeError> {
        if !m::is_finite(center) || !radius.is_finite() {
            return Err(ShapeError::NonFinite);
        }
        if radius <= 0.0 {
            return Err(ShapeError::NonPositiveRadius(radius));
        }
        Ok(Circle {
            center,
            base_radius: radius,
            scale: 1.0,
            rotation: 0.0,
        })
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.center
    }

    #[inline]
    pub fn base_radius(&self) -> f64 {
        self.base_radius
    }

    /// Effective radius after scaling.
    #[inline]
    pub fn radius(&self) -> f64 {
        self.base_radius * self.scale
    }
}

//
// Polygon
//

/// Which family of convex polygon this is.
/// Determines which editing operations are allowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolygonKind {
    /// Exactly three freely editable corners. Three points are always convex.
    Triangle,
    Rectangle,
    Regular { sides: usize },
}

/// A vertex offset from the polygon's center, before scaling and rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolarVertex {
    pub angle: f64,
    pub radius: f64,
}

impl PolarVertex {
    fn from_offset(offset: Vec2) -> Self {
        let (angle, radius) = m::cartesian_to_polar(offset);
        PolarVertex { angle, radius }
    }
}

/// A convex polygon with counterclockwise vertex order.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    pub(crate) center: Vec2,
    kind: PolygonKind,
    polar_vertices: Vec<PolarVertex>,
    pub(crate) scale: f64,
    pub(crate) rotation: f64,
}

impl Polygon {
    /// Create a triangle from corner offsets relative to `center`.
    ///
    /// Clockwise corners are reordered to counterclockwise.
    pub fn triangle(center: Vec2, offsets: [Vec2; 3]) -> Result<Self, ShapeError> {
        if !m::is_finite(center) || !offsets.iter().all(|o| m::is_finite(*o)) {
            return Err(ShapeError::NonFinite);
        }
        let mut poly = Polygon {
            center,
            kind: PolygonKind::Triangle,
            polar_vertices: offsets.iter().map(|o| PolarVertex::from_offset(*o)).collect(),
            scale: 1.0,
            rotation: 0.0,
        };
        poly.fix_triangle_orientation()?;
        Ok(poly)
    }

    /// Create an axis-aligned (before rotation) rectangle.
    pub fn rectangle(center: Vec2, width: f64, height: f64) -> Result<Self, ShapeError> {
        if !m::is_finite(center) {
            return Err(ShapeError::NonFinite);
        }
        Ok(Polygon {
            center,
            kind: PolygonKind::Rectangle,
            polar_vertices: rect_vertices(width, height)?,
            scale: 1.0,
            rotation: 0.0,
        })
    }

    /// Create a regular polygon with the given circumradius
    /// and its first vertex pointing up the screen.
    pub fn regular(center: Vec2, circumradius: f64, sides: usize) -> Result<Self, ShapeError> {
        if !m::is_finite(center) || !circumradius.is_finite() {
            return Err(ShapeError::NonFinite);
        }
        if circumradius <= 0.0 {
            return Err(ShapeError::NonPositiveRadius(circumradius));
        }
        if sides < 3 {
            return Err(ShapeError::TooFewSides(sides));
        }
        let step = 2.0 * PI / sides as f64;
        let polar_vertices = (0..sides)
            .map(|i| PolarVertex {
                angle: -PI / 2.0 + step * i as f64,
                radius: circumradius,
            })
            .collect();
        Ok(Polygon {
            center,
            kind: PolygonKind::Regular { sides },
            polar_vertices,
            scale: 1.0,
            rotation: 0.0,
        })
    }

    #[inline]
    pub fn kind(&self) -> PolygonKind {
        self.kind
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.center
    }

    #[inline]
    pub fn polar_vertices(&self) -> &[PolarVertex] {
        &self.polar_vertices
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.polar_vertices.len()
    }

    /// World-space position of a single vertex. `idx` must be below `vertex_count`.
    #[inline]
    pub(crate) fn vertex(&self, idx: usize) -> Vec2 {
        let pv = self.polar_vertices[idx];
        self.center + m::polar_to_cartesian(pv.angle + self.rotation, pv.radius * self.scale)
    }

    /// World-space vertices in counterclockwise order.
    pub fn vertices(&self) -> Vec<Vec2> {
        (0..self.polar_vertices.len()).map(|i| self.vertex(i)).collect()
    }

    /// Check that the first three vertices turn counterclockwise.
    pub fn is_orientation_valid(&self) -> bool {
        if self.polar_vertices.len() < 3 {
            return false;
        }
        let (a, b, c) = (self.vertex(0), self.vertex(1), self.vertex(2));
        m::cross(b - a, c - b) > 0.0
    }

    /// Move one corner of a triangle to a new world-space position.
    ///
    /// The result is reordered if the move flipped its orientation
    /// and rejected if the corners became collinear.
    pub fn with_vertex_at(&self, idx: usize, world_point: Vec2) -> Result<Polygon, ShapeError> {
        if self.kind != PolygonKind::Triangle || idx >= 3 {
            return Err(ShapeError::VertexOutOfRange(idx));
        }
        if !m::is_finite(world_point) {
            return Err(ShapeError::NonFinite);
        }
        let local = m::rotate(world_point - self.center, -self.rotation) / self.scale;
        let mut poly = self.clone();
        poly.polar_vertices[idx] = PolarVertex::from_offset(local);
        poly.fix_triangle_orientation()?;
        Ok(poly)
    }

    /// Change the unscaled side lengths of a rectangle.
    pub fn with_size(&self, width: f64, height: f64) -> Result<Polygon, ShapeError> {
        if self.kind != PolygonKind::Rectangle {
            return Err(ShapeError::VertexOutOfRange(0));
        }
        let mut poly = self.clone();
        poly.polar_vertices = rect_vertices(width, height)?;
        Ok(poly)
    }

    fn fix_triangle_orientation(&mut self) -> Result<(), ShapeError> {
        let verts = self.vertices();
        let turn = m::cross(verts[1] - verts[0], verts[2] - verts[1]);
        let longest_sq = edges(&verts)
            .map(|(a, b)| (b - a).mag_sq())
            .fold(0.0, f64::max);
        if turn.abs() <= 1e-10 * longest_sq || longest_sq == 0.0 {
            return Err(ShapeError::DegenerateTriangle);
        }
        if turn < 0.0 {
            self.polar_vertices.reverse();
        }
        debug_assert!(self.is_orientation_valid());
        Ok(())
    }

    /// Signed area via the shoelace formula, positive for counterclockwise vertices.
    pub fn area(&self) -> f64 {
        let verts = self.vertices();
        edges(&verts).map(|(a, b)| m::cross(a, b)).sum::<f64>() / 2.0
    }

    pub fn centroid(&self) -> Vec2 {
        let verts = self.vertices();
        // relative to the first vertex to keep magnitudes small
        let origin = verts[0];
        let mut area_twice = 0.0;
        let mut weighted = Vec2::zero();
        for (a, b) in edges(&verts) {
            let (a, b) = (a - origin, b - origin);
            let cr = m::cross(a, b);
            area_twice += cr;
            weighted += (a + b) * cr;
        }
        origin + weighted / (3.0 * area_twice)
    }

    /// Polar second moment of area around the centroid, from Green's theorem.
    pub fn area_moment_of_inertia(&self) -> f64 {
        let centroid = self.centroid();
        let verts: Vec<Vec2> = self.vertices().into_iter().map(|v| v - centroid).collect();
        edges(&verts)
            .map(|(a, b)| {
                m::cross(a, b) * (a.x * a.x + a.x * b.x + b.x * b.x + a.y * a.y + a.y * b.y + b.y * b.y)
            })
            .sum::<f64>()
            / 12.0
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        let verts = self.vertices();
        let inside = edges(&verts).all(|(a, b)| m::cross(b - a, point - a) > 0.0);
        inside
    }
}

fn rect_vertices(width: f64, height: f64) -> Result<Vec<PolarVertex>, ShapeError> {
    if !width.is_finite() || !height.is_finite() {
        return Err(ShapeError::NonFinite);
    }
    if width <= 0.0 || height <= 0.0 {
        return Err(ShapeError::NonPositiveSize(width, height));
    }
    let (hw, hh) = (width / 2.0, height / 2.0);
    Ok([
        Vec2::new(hw, -hh),
        Vec2::new(hw, hh),
        Vec2::new(-hw, hh),
        Vec2::new(-hw, -hh),
    ]
    .iter()
    .map(|o| PolarVertex::from_offset(*o))
    .collect())
}

/// Consecutive vertex pairs, wrapping around from the last vertex to the first.
pub(crate) fn edges(verts: &[Vec2]) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
    verts.iter().copied().circular_tuple_windows()
}
