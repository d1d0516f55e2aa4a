//! Narrow phase intersection tests between pairs of shapes,
//! using the separating axis theorem for everything involving a polygon.

use crate::math::{self as m, Unit, Vec2};
use crate::physics::shape::{edges, Circle, Polygon, Shape};

use itertools::{Itertools, MinMaxResult};

/// An intersection between two shapes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    /// The normal, facing away from the first shape toward the second.
    pub normal: Unit<Vec2>,
    /// Overlap along the normal. Moving the first shape by `-depth * normal`
    /// separates the pair.
    pub depth: f64,
    /// Approximate world-space point where the shapes penetrate each other.
    pub point: Vec2,
}

impl Contact {
    fn flipped(self) -> Self {
        Contact {
            normal: -self.normal,
            ..self
        }
    }
}

/// Checks whether two shapes overlap. Exactly touching shapes do not.
pub fn is_colliding(a: &Shape, b: &Shape) -> bool {
    match (a, b) {
        (Shape::Circle(c1), Shape::Circle(c2)) => {
            (c2.center() - c1.center()).mag() < c1.radius() + c2.radius()
        }
        _ => collision_data(a, b).is_some(),
    }
}

/// Computes the contact between two shapes, or None if they don't overlap.
///
/// The chosen axis is the one with the smallest overlap among all tested
/// axes. This is the usual cheap approximation of the minimum translation
/// vector and can pick a non-minimal axis for deeply penetrating polygons.
pub fn collision_data(a: &Shape, b: &Shape) -> Option<Contact> {
    match (a, b) {
        (Shape::Circle(c1), Shape::Circle(c2)) => circle_circle(c1, c2),
        (Shape::Circle(c), Shape::Polygon(p)) => circle_polygon(c, p),
        (Shape::Polygon(p), Shape::Circle(c)) => circle_polygon(c, p).map(Contact::flipped),
        (Shape::Polygon(p1), Shape::Polygon(p2)) => polygon_polygon(p1, p2),
    }
}

//
// Helpers
//

#[derive(Clone, Copy, Debug)]
struct Projection {
    min: f64,
    max: f64,
}

impl Projection {
    fn of_vertices(verts: &[Vec2], axis: Vec2) -> Self {
        match verts.iter().map(|v| v.dot(axis)).minmax() {
            MinMaxResult::MinMax(min, max) => Projection { min, max },
            MinMaxResult::OneElement(p) => Projection { min: p, max: p },
            MinMaxResult::NoElements => Projection {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
        }
    }

    fn of_circle(c: &Circle, axis: Vec2) -> Self {
        let p = c.center().dot(axis);
        Projection {
            min: p - c.radius(),
            max: p + c.radius(),
        }
    }

    /// Overlap with another projection, None if they are disjoint or only touch.
    fn overlap(self, other: Projection) -> Option<f64> {
        if self.max <= other.min || other.max <= self.min {
            None
        } else {
            Some((self.max - other.min).min(other.max - self.min))
        }
    }
}

/// Which shape contributed the minimum overlap axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AxisSource {
    First,
    Second,
    NearestVertex,
}

#[derive(Clone, Copy, Debug)]
struct BestAxis {
    depth: f64,
    axis: Vec2,
    source: AxisSource,
}

/// Keep the first axis with the smallest overlap.
#[inline]
fn keep_min(best: &mut Option<BestAxis>, candidate: BestAxis) {
    if best.map_or(true, |b| candidate.depth < b.depth) {
        *best = Some(candidate);
    }
}

/// Flip an axis so it points from one center toward another.
#[inline]
fn orient(axis: Vec2, from: Vec2, to: Vec2) -> Vec2 {
    if (to - from).dot(axis) < 0.0 {
        -axis
    } else {
        axis
    }
}

/// The vertex furthest along a direction.
fn support(verts: &[Vec2], dir: Vec2) -> Vec2 {
    verts
        .iter()
        .copied()
        .max_by(|a, b| a.dot(dir).total_cmp(&b.dot(dir)))
        .unwrap_or_default()
}

/// Outward unit normals of a counterclockwise polygon's edges.
fn edge_normals(verts: &[Vec2]) -> impl Iterator<Item = Vec2> + '_ {
    edges(verts).filter_map(|(p, q)| Unit::try_new(m::right_normal(q - p)).map(Unit::into_inner))
}

//
// CIRCLE <-> CIRCLE
//

fn circle_circle(c1: &Circle, c2: &Circle) -> Option<Contact> {
    let dist = c2.center() - c1.center();
    let dist_mag = dist.mag();
    let r_sum = c1.radius() + c2.radius();
    if dist_mag >= r_sum {
        return None;
    }
    // same position, consider penetration to be on the x axis
    let normal = Unit::try_new(dist).unwrap_or_else(Unit::unit_x);
    Some(Contact {
        normal,
        depth: r_sum - dist_mag,
        point: c1.center() + c1.radius() * *normal,
    })
}

//
// CIRCLE <-> POLYGON
//

fn circle_polygon(c: &Circle, p: &Polygon) -> Option<Contact> {
    debug_assert!(p.is_orientation_valid(), "polygon with clockwise winding");
    let verts = p.vertices();
    let mut best: Option<BestAxis> = None;

    for axis in edge_normals(&verts) {
        let depth = Projection::of_circle(c, axis).overlap(Projection::of_vertices(&verts, axis))?;
        keep_min(
            &mut best,
            BestAxis {
                depth,
                axis,
                source: AxisSource::Second,
            },
        );
    }

    // the edge normals alone miss a circle sitting off a corner
    let nearest = verts
        .iter()
        .copied()
        .min_by(|a, b| (*a - c.center()).mag_sq().total_cmp(&(*b - c.center()).mag_sq()))
        .unwrap_or_default();
    if let Some(axis) = Unit::try_new(nearest - c.center()) {
        let axis = *axis;
        let depth = Projection::of_circle(c, axis).overlap(Projection::of_vertices(&verts, axis))?;
        keep_min(
            &mut best,
            BestAxis {
                depth,
                axis,
                source: AxisSource::NearestVertex,
            },
        );
    }

    let best = best?;
    let normal = orient(best.axis, c.center(), p.centroid());
    let point = match best.source {
        AxisSource::NearestVertex => nearest,
        _ => c.center() + c.radius() * normal,
    };
    Some(Contact {
        normal: Unit::new_unchecked(normal),
        depth: best.depth,
        point,
    })
}

//
// POLYGON <-> POLYGON
//

fn polygon_polygon(p1: &Polygon, p2: &Polygon) -> Option<Contact> {
    debug_assert!(p1.is_orientation_valid() && p2.is_orientation_valid());
    let verts1 = p1.vertices();
    let verts2 = p2.vertices();
    let mut best: Option<BestAxis> = None;

    for (source, owner) in [(AxisSource::First, &verts1), (AxisSource::Second, &verts2)] {
        for axis in edge_normals(owner) {
            let depth = Projection::of_vertices(&verts1, axis)
                .overlap(Projection::of_vertices(&verts2, axis))?;
            keep_min(
                &mut best,
                BestAxis {
                    depth,
                    axis,
                    source,
                },
            );
        }
    }

    let best = best?;
    let normal = orient(best.axis, p1.centroid(), p2.centroid());
    // the deepest vertex of the shape that did not supply the axis
    let point = match best.source {
        AxisSource::Second => support(&verts1, normal),
        _ => support(&verts2, -normal),
    };
    Some(Contact {
        normal: Unit::new_unchecked(normal),
        depth: best.depth,
        point,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::f64::consts::PI;

    fn circle(x: f64, y: f64, r: f64) -> Shape {
        Circle::new(Vec2::new(x, y), r).unwrap().into()
    }

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Shape {
        Polygon::rectangle(Vec2::new(x, y), w, h).unwrap().into()
    }

    fn random_shape(rng: &mut StdRng) -> Shape {
        let center = Vec2::new(rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0));
        let shape: Shape = match rng.gen_range(0..4) {
            0 => Circle::new(center, rng.gen_range(0.2..2.0)).unwrap().into(),
            1 => Polygon::rectangle(center, rng.gen_range(0.2..3.0), rng.gen_range(0.2..3.0))
                .unwrap()
                .into(),
            2 => Polygon::regular(center, rng.gen_range(0.2..2.0), rng.gen_range(3..9))
                .unwrap()
                .into(),
            _ => Polygon::triangle(
                center,
                [
                    Vec2::new(rng.gen_range(-2.0..-0.5), rng.gen_range(0.5..2.0)),
                    Vec2::new(rng.gen_range(0.5..2.0), rng.gen_range(0.5..2.0)),
                    Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-2.0..-0.5)),
                ],
            )
            .unwrap()
            .into(),
        };
        shape.rotated_by(rng.gen_range(0.0..2.0 * PI))
    }

    #[test]
    fn tangent_circles_do_not_collide() {
        let a = circle(0.0, 0.0, 1.0);
        let b = circle(3.0, 0.0, 2.0);
        assert!(!is_colliding(&a, &b));
        assert!(collision_data(&a, &b).is_none());
        for eps in [1e-3, 1e-6, 1e-9] {
            let b = circle(3.0 - eps, 0.0, 2.0);
            assert!(is_colliding(&a, &b));
            let contact = collision_data(&a, &b).unwrap();
            assert!((contact.depth - eps).abs() < 1e-12);
            assert!((*contact.normal - Vec2::unit_x()).mag() < 1e-12);
        }
    }

    #[test]
    fn concentric_circles_get_a_normal() {
        let contact = collision_data(&circle(1.0, 1.0, 1.0), &circle(1.0, 1.0, 0.5)).unwrap();
        assert_eq!(*contact.normal, Vec2::unit_x());
        assert!((contact.depth - 1.5).abs() < 1e-12);
    }

    #[test]
    fn overlapping_rects() {
        let a = rect(0.0, 0.0, 2.0, 2.0);
        let b = rect(1.5, 0.2, 2.0, 2.0);
        let contact = collision_data(&a, &b).unwrap();
        assert!((contact.depth - 0.5).abs() < 1e-9);
        assert!((*contact.normal - Vec2::unit_x()).mag() < 1e-9);

        let reverse = collision_data(&b, &a).unwrap();
        assert!((*reverse.normal + Vec2::unit_x()).mag() < 1e-9);
    }

    #[test]
    fn separated_rects_do_not_collide() {
        assert!(!is_colliding(&rect(0.0, 0.0, 2.0, 2.0), &rect(2.0 + 1e-9, 0.0, 2.0, 2.0)));
        assert!(!is_colliding(&rect(0.0, 0.0, 2.0, 2.0), &rect(0.0, 5.0, 2.0, 2.0)));
    }

    #[test]
    fn circle_resting_on_face() {
        let c = circle(0.0, -1.8, 1.0);
        let r = rect(0.0, 0.0, 2.0, 2.0);
        let contact = collision_data(&c, &r).unwrap();
        assert!((contact.depth - 0.2).abs() < 1e-9);
        // pointing from the circle down into the rect
        assert!((*contact.normal - Vec2::unit_y()).mag() < 1e-9);
        assert!((contact.point - Vec2::new(0.0, -0.8)).mag() < 1e-9);

        let flipped = collision_data(&r, &c).unwrap();
        assert!((*flipped.normal + Vec2::unit_y()).mag() < 1e-9);
        assert_eq!(flipped.depth, contact.depth);
    }

    #[test]
    fn circle_off_corner_is_separated_by_vertex_axis() {
        let r = rect(0.0, 0.0, 2.0, 2.0);
        // boxes overlap and so do both edge axis projections
        let near = circle(1.6, 1.6, 0.8);
        assert!(!is_colliding(&near, &r));
        let touching_corner = circle(1.5, 1.5, 0.8);
        let contact = collision_data(&touching_corner, &r).unwrap();
        let diag = Vec2::new(-1.0, -1.0).normalized();
        assert!((*contact.normal - diag).mag() < 1e-9);
        assert!((contact.point - Vec2::new(1.0, 1.0)).mag() < 1e-9);
    }

    #[test]
    fn triangle_poking_into_floor() {
        let tri: Shape = Polygon::triangle(
            Vec2::new(0.0, -1.5),
            [Vec2::new(-1.0, -0.5), Vec2::new(1.0, -0.5), Vec2::new(0.0, 1.25)],
        )
        .unwrap()
        .into();
        let floor = rect(0.0, 0.5, 10.0, 2.0);
        let contact = collision_data(&tri, &floor).unwrap();
        // tip at y = -0.25 is 0.25 below the floor's top at y = -0.5
        assert!((contact.depth - 0.25).abs() < 1e-9);
        assert!((*contact.normal - Vec2::unit_y()).mag() < 1e-9);
    }

    #[test]
    fn penetration_point_is_deepest_vertex() {
        // a diamond standing on its tip
        let diamond: Shape = Polygon::regular(Vec2::new(0.0, -1.25), 1.0, 4).unwrap().into();
        let floor = rect(0.0, 0.5, 10.0, 2.0);
        let contact = collision_data(&diamond, &floor).unwrap();
        assert!((contact.depth - 0.25).abs() < 1e-9);
        assert!((*contact.normal - Vec2::unit_y()).mag() < 1e-9);
        assert!((contact.point - Vec2::new(0.0, -0.25)).mag() < 1e-9);
    }

    #[test]
    fn equal_overlap_keeps_the_earlier_axis() {
        let mut best = None;
        let first = BestAxis {
            depth: 0.5,
            axis: Vec2::unit_x(),
            source: AxisSource::First,
        };
        keep_min(&mut best, first);
        keep_min(
            &mut best,
            BestAxis {
                depth: 0.5,
                axis: Vec2::unit_y(),
                source: AxisSource::Second,
            },
        );
        let kept = best.unwrap();
        assert_eq!(kept.source, AxisSource::First);
        assert_eq!(kept.axis, Vec2::unit_x());

        keep_min(
            &mut best,
            BestAxis {
                depth: 0.25,
                axis: Vec2::unit_y(),
                source: AxisSource::Second,
            },
        );
        assert_eq!(best.unwrap().source, AxisSource::Second);
    }

    #[test]
    fn detection_is_symmetric_and_matches_resolution() {
        let mut rng = StdRng::seed_from_u64(3217);
        let mut hits = 0;
        for _ in 0..2000 {
            let a = random_shape(&mut rng);
            let b = random_shape(&mut rng);
            let ab = is_colliding(&a, &b);
            assert_eq!(ab, is_colliding(&b, &a));
            assert_eq!(collision_data(&a, &b).is_some(), ab);
            assert_eq!(collision_data(&b, &a).is_some(), ab);
            if let Some(contact) = collision_data(&a, &b) {
                hits += 1;
                assert!(contact.depth > 0.0);
                assert!((contact.normal.mag() - 1.0).abs() < 1e-9);
                // normal points from a toward b
                assert!((b.centroid() - a.centroid()).dot(*contact.normal) >= 0.0);
            }
        }
        assert!(hits > 100, "test shapes should collide sometimes");
    }
}
