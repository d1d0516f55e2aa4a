//! Calculations for a single body during the calculate phase of a frame.
//!
//! Nothing here mutates a body. Results go into [`FrameDelta`]s
//! that are committed after every body has been calculated.

use super::{
    body::{FrameDelta, RadialForceKind, RigidBody, WallBehavior},
    collision::{collision_data, Contact, QuadTree, AABB},
    entity_set::{BodyKey, BodySet},
    forcefield::{ForceField, RadialField},
};
use crate::math::Vec2;

/// The committed state of the world that calculations read from.
pub(super) struct WorldView<'a> {
    pub bodies: &'a BodySet,
    pub tree: &'a QuadTree<BodyKey>,
    pub bounds: AABB,
}

/// Persistent forces and the global acceleration.
pub(super) fn apply_forces(body: &RigidBody, gravity: &impl ForceField, delta: &mut FrameDelta) {
    for force in body.persistent_forces() {
        delta.force += force.force_on(body);
    }
    if body.params().uses_global_acceleration {
        if let Some(mass) = body.mass().finite() {
            delta.force += gravity.value_at(body.centroid()) * mass;
        }
    }
}

//
// Walls
//

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct AxisCorrection {
    impulse: f64,
    teleport: f64,
    wrapped: bool,
    fell_through: bool,
}

/// Check one axis against the wall in the direction of travel.
///
/// `bounce` is `(1 + elasticity) * mass`.
fn resolve_axis(
    vel: f64,
    (box_lo, box_hi): (f64, f64),
    (wall_lo, wall_hi): (f64, f64),
    (behavior_lo, behavior_hi): (WallBehavior, WallBehavior),
    bounce: f64,
) -> AxisCorrection {
    let mut out = AxisCorrection::default();
    let (behavior, towards_lo) = if vel < 0.0 {
        (behavior_lo, true)
    } else if vel > 0.0 {
        (behavior_hi, false)
    } else {
        return out;
    };

    match behavior {
        WallBehavior::Collide => {
            let crossed = if towards_lo {
                box_lo < wall_lo
            } else {
                box_hi > wall_hi
            };
            if crossed {
                out.impulse = -bounce * vel;
                out.teleport = if towards_lo {
                    wall_lo - box_lo
                } else {
                    wall_hi - box_hi
                };
            }
        }
        WallBehavior::FallThrough | WallBehavior::WrapAround => {
            let fully_past = if towards_lo {
                box_hi < wall_lo
            } else {
                box_lo > wall_hi
            };
            if !fully_past {
                return out;
            }
            if behavior == WallBehavior::FallThrough {
                out.fell_through = true;
            } else {
                // reappear just outside the opposite wall, still moving the same way
                out.teleport = if towards_lo {
                    wall_hi - box_lo
                } else {
                    wall_lo - box_hi
                };
                out.wrapped = true;
            }
        }
    }
    out
}

/// Resolve the body against the walls of the playable area.
/// Only walls the body is moving towards are considered.
pub(super) fn resolve_walls(body: &RigidBody, bounds: &AABB, delta: &mut FrameDelta) {
    let aabb = body.aabb();
    let vel = body.velocity().linear;
    let walls = body.params().walls;
    let bounce = (1.0 + body.elasticity()) * body.mass().finite().unwrap_or(0.0);

    let x = resolve_axis(
        vel.x,
        (aabb.left(), aabb.right()),
        (bounds.left(), bounds.right()),
        (walls.left, walls.right),
        bounce,
    );
    let y = resolve_axis(
        vel.y,
        (aabb.top(), aabb.bottom()),
        (bounds.top(), bounds.bottom()),
        (walls.top, walls.bottom),
        bounce,
    );

    delta.impulse += Vec2::new(x.impulse, y.impulse);
    delta.teleport += Vec2::new(x.teleport, y.teleport);
    delta.wrap_count += x.wrapped as u32 + y.wrapped as u32;
    delta.fell_through |= x.fell_through || y.fell_through;
}

//
// Body-body collisions
//

/// Collide a body against everything it overlaps in the world.
///
/// Only the body's own delta gets the response. Bodies it hit are pushed
/// to `hits` so that they can be marked as collided, which matters for
/// bodies that never calculate a response themselves.
pub(super) fn resolve_collisions(
    body: &RigidBody,
    exclude: Option<BodyKey>,
    world: &WorldView<'_>,
    delta: &mut FrameDelta,
    hits: &mut Vec<(BodyKey, Vec2)>,
    scratch: &mut Vec<BodyKey>,
) {
    let aabb = body.aabb();
    scratch.clear();
    world.tree.retrieve_into(&aabb, scratch);

    for &other_key in scratch.iter() {
        if Some(other_key) == exclude {
            continue;
        }
        let Some(other) = world.bodies.get(other_key) else {
            continue;
        };
        if !aabb.overlaps(&other.aabb()) {
            continue;
        }
        let Some(contact) = collision_data(body.shape(), other.shape()) else {
            continue;
        };
        respond(body, other, &contact, delta);
        hits.push((other_key, contact.point));
    }
}

/// Positional correction and impulse for `body` from a contact
/// whose normal points from `body` toward `other`.
fn respond(body: &RigidBody, other: &RigidBody, contact: &Contact, delta: &mut FrameDelta) {
    delta.mark_hit(contact.point);

    let inv_mass = body.mass().inv();
    let inv_mass_sum = inv_mass + other.mass().inv();
    if inv_mass_sum == 0.0 {
        return;
    }
    let normal = *contact.normal;

    // each side moves its share of the overlap
    delta.teleport -= normal * (contact.depth * inv_mass / inv_mass_sum);

    // relative velocity at the contact point, so that spin carries over
    let vel = body.velocity().point_velocity(contact.point - body.centroid());
    let other_vel = other.velocity().point_velocity(contact.point - other.centroid());
    let approach_vel = (other_vel - vel).dot(normal);
    if approach_vel >= 0.0 {
        return;
    }
    let restitution = (body.elasticity() + other.elasticity()) / 2.0;
    let j = (1.0 + restitution) * approach_vel / inv_mass_sum;
    delta.add_impulse_at(normal * j, contact.point, body.centroid());
}

//
// Radial forces
//

/// Apply a radial field to every body whose centroid is within its reach.
/// Distance to the centroid is used instead of the full shape.
pub(super) fn emit_radial(
    emitter: BodyKey,
    field: &RadialField,
    world: &WorldView<'_>,
    deltas: &mut [FrameDelta],
    scratch: &mut Vec<BodyKey>,
) {
    let reach = AABB::new(field.center, Vec2::broadcast(field.max_radius));
    scratch.clear();
    world.tree.retrieve_into(&reach, scratch);

    for &key in scratch.iter() {
        if key == emitter {
            continue;
        }
        let Some(body) = world.bodies.get(key) else {
            continue;
        };
        let position = body.centroid();
        if !field.reaches(position) {
            continue;
        }
        let push = field.value_at(position);
        let delta = &mut deltas[key.slot()];
        match field.kind {
            RadialForceKind::Explosion => {
                delta.impulse += push;
                delta.mark_hit(field.center);
            }
            RadialForceKind::Attraction | RadialForceKind::Repulsion => {
                if body.params().can_translate {
                    delta.force += push;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{
        body::{BodyParams, WallBehaviors},
        shape::Circle,
        Velocity,
    };

    fn bounds() -> AABB {
        AABB::from_min_max(Vec2::zero(), Vec2::new(100.0, 100.0))
    }

    fn ball_at(x: f64, y: f64, vel: Vec2, walls: WallBehaviors) -> RigidBody {
        RigidBody::new(
            Circle::new(Vec2::new(x, y), 1.0).unwrap(),
            BodyParams {
                elasticity: 1.0,
                walls,
                ..BodyParams::dynamic()
            },
        )
        .unwrap()
        .with_velocity(Velocity {
            linear: vel,
            angular: 0.0,
        })
    }

    #[test]
    fn collide_wall_reflects_and_pushes_back() {
        let ball = ball_at(
            0.5,
            50.0,
            Vec2::new(-10.0, 0.0),
            WallBehaviors::all(WallBehavior::Collide),
        );
        let mut delta = FrameDelta::default();
        resolve_walls(&ball, &bounds(), &mut delta);
        assert!((delta.teleport - Vec2::new(0.5, 0.0)).mag() < 1e-12);
        let mass = ball.mass().finite().unwrap();
        assert!((delta.impulse - Vec2::new(20.0 * mass, 0.0)).mag() < 1e-9);
    }

    #[test]
    fn only_travel_direction_is_checked() {
        // overlapping the left wall but moving away from it
        let ball = ball_at(
            0.5,
            50.0,
            Vec2::new(10.0, 0.0),
            WallBehaviors::all(WallBehavior::Collide),
        );
        let mut delta = FrameDelta::default();
        resolve_walls(&ball, &bounds(), &mut delta);
        assert_eq!(delta, FrameDelta::default());
    }

    #[test]
    fn fall_through_needs_the_whole_box_past() {
        let walls = WallBehaviors::default();
        let mut delta = FrameDelta::default();
        resolve_walls(
            &ball_at(50.0, 100.5, Vec2::new(0.0, 5.0), walls),
            &bounds(),
            &mut delta,
        );
        assert!(!delta.fell_through);
        resolve_walls(
            &ball_at(50.0, 101.5, Vec2::new(0.0, 5.0), walls),
            &bounds(),
            &mut delta,
        );
        assert!(delta.fell_through);
    }

    #[test]
    fn collide_top_wall_pushes_down() {
        let ball = ball_at(
            50.0,
            0.5,
            Vec2::new(0.0, -10.0),
            WallBehaviors::all(WallBehavior::Collide),
        );
        let mut delta = FrameDelta::default();
        resolve_walls(&ball, &bounds(), &mut delta);
        assert!((delta.teleport - Vec2::new(0.0, 0.5)).mag() < 1e-12);
        assert!(delta.impulse.y > 0.0);
        assert_eq!(delta.impulse.x, 0.0);
    }

    #[test]
    fn fall_through_top_needs_the_whole_box_past() {
        let walls = WallBehaviors {
            top: WallBehavior::FallThrough,
            ..WallBehaviors::all(WallBehavior::Collide)
        };
        let mut delta = FrameDelta::default();
        resolve_walls(
            &ball_at(50.0, -0.5, Vec2::new(0.0, -5.0), walls),
            &bounds(),
            &mut delta,
        );
        assert!(!delta.fell_through);
        assert_eq!(delta.teleport, Vec2::zero());
        resolve_walls(
            &ball_at(50.0, -1.5, Vec2::new(0.0, -5.0), walls),
            &bounds(),
            &mut delta,
        );
        assert!(delta.fell_through);
    }

    #[test]
    fn wrap_through_left_lands_on_right_wall() {
        let ball = ball_at(
            -1.5,
            30.0,
            Vec2::new(-10.0, 0.0),
            WallBehaviors::all(WallBehavior::WrapAround),
        );
        let mut delta = FrameDelta::default();
        resolve_walls(&ball, &bounds(), &mut delta);
        assert_eq!(delta.wrap_count, 1);
        // box left edge lands on the right wall
        assert!((ball.position().x + delta.teleport.x - 101.0).abs() < 1e-12);
    }

    #[test]
    fn wrap_places_box_at_opposite_wall() {
        let ball = ball_at(
            101.5,
            30.0,
            Vec2::new(10.0, 0.0),
            WallBehaviors::all(WallBehavior::WrapAround),
        );
        let mut delta = FrameDelta::default();
        resolve_walls(&ball, &bounds(), &mut delta);
        assert_eq!(delta.wrap_count, 1);
        assert_eq!(delta.impulse, Vec2::zero());
        // box right edge lands on the left wall
        assert!((ball.position().x + delta.teleport.x - -1.0).abs() < 1e-12);
        assert_eq!(delta.teleport.y, 0.0);
    }
}
