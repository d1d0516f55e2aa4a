use super::{
    collision::AABB,
    shape::{Shape, ShapeError},
    Velocity,
};
use crate::math::{self as m, Vec2};

/// Error when creating a body with invalid physical properties.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum BodyError {
    #[error("density must be positive, got {0}")]
    NonPositiveDensity(f64),
    #[error("elasticity must be within [0, 1], got {0}")]
    ElasticityOutOfRange(f64),
    #[error("ease of rotation must be positive, got {0}")]
    NonPositiveEaseOfRotation(f64),
    #[error("invalid shape: {0}")]
    Shape(#[from] ShapeError),
}

/// What happens when a body reaches one of the four walls of the playable area.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub enum WallBehavior {
    /// Bounce back with the body's elasticity.
    Collide,
    /// Leave the world once fully past the wall.
    FallThrough,
    /// Reappear at the opposite wall once fully past this one.
    WrapAround,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub struct WallBehaviors {
    pub left: WallBehavior,
    pub right: WallBehavior,
    pub top: WallBehavior,
    pub bottom: WallBehavior,
}

impl WallBehaviors {
    pub const fn all(behavior: WallBehavior) -> Self {
        Self {
            left: behavior,
            right: behavior,
            top: behavior,
            bottom: behavior,
        }
    }
}

impl Default for WallBehaviors {
    /// Solid sides and ceiling with an open floor, the usual board layout.
    fn default() -> Self {
        Self {
            bottom: WallBehavior::FallThrough,
            ..Self::all(WallBehavior::Collide)
        }
    }
}

/// Properties a body is created with.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BodyParams {
    /// Mass per unit of area.
    pub density: f64,
    /// Coefficient of restitution between 0 (no bounce) and 1 (perfectly elastic).
    pub elasticity: f64,
    /// Divides the moment of inertia. Values above 1 make the body spin more easily.
    pub ease_of_rotation: f64,
    pub can_translate: bool,
    /// Has no effect on circles.
    pub can_rotate: bool,
    pub walls: WallBehaviors,
    pub uses_global_acceleration: bool,
    /// Exempt from removal when stuck, e.g. the player's ball.
    pub always_tracked: bool,
}

impl BodyParams {
    /// A body that moves freely and falls with the global acceleration.
    pub fn dynamic() -> Self {
        Self {
            density: 1.0,
            elasticity: 0.8,
            ease_of_rotation: 1.0,
            can_translate: true,
            can_rotate: true,
            walls: WallBehaviors::default(),
            uses_global_acceleration: true,
            always_tracked: false,
        }
    }

    /// A body that other bodies bounce off but that never moves by itself.
    pub fn fixed() -> Self {
        Self {
            can_translate: false,
            can_rotate: false,
            walls: WallBehaviors::all(WallBehavior::Collide),
            uses_global_acceleration: false,
            ..Self::dynamic()
        }
    }

    fn validate(&self) -> Result<(), BodyError> {
        if !(self.density > 0.0 && self.density.is_finite()) {
            return Err(BodyError::NonPositiveDensity(self.density));
        }
        if !(0.0..=1.0).contains(&self.elasticity) {
            return Err(BodyError::ElasticityOutOfRange(self.elasticity));
        }
        if !(self.ease_of_rotation > 0.0 && self.ease_of_rotation.is_finite()) {
            return Err(BodyError::NonPositiveEaseOfRotation(self.ease_of_rotation));
        }
        Ok(())
    }
}

impl Default for BodyParams {
    fn default() -> Self {
        Self::dynamic()
    }
}

/// Mass or moment of inertia of a body, which can be infinite.
///
/// This stores both a mass value and its inverse, because calculating inverse mass
/// is expensive and needed a lot in physics calculations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mass {
    Finite { mass: f64, inverse: f64 },
    Infinite,
}

impl From<f64> for Mass {
    #[inline]
    fn from(mass: f64) -> Self {
        Mass::Finite {
            mass,
            inverse: 1.0 / mass,
        }
    }
}

impl Mass {
    /// Get the inverse of the mass, which is zero if the mass is infinite.
    #[inline]
    pub fn inv(&self) -> f64 {
        match self {
            Mass::Finite { inverse, .. } => *inverse,
            Mass::Infinite => 0.0,
        }
    }

    /// Get the mass if it is finite.
    #[inline]
    pub fn finite(&self) -> Option<f64> {
        match self {
            Mass::Finite { mass, .. } => Some(*mass),
            Mass::Infinite => None,
        }
    }
}

/// A force that acts on a body every frame for as long as the body exists.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PersistentForce {
    /// Acceleration independent of mass, e.g. a custom gravity.
    Acceleration(Vec2),
    Force(Vec2),
    /// Damped spring pulling the body's center toward a fixed anchor.
    Spring {
        anchor: Vec2,
        stiffness: f64,
        damping: f64,
    },
}

impl PersistentForce {
    /// The force this exerts on a body in its current committed state.
    pub fn force_on(&self, body: &RigidBody) -> Vec2 {
        match *self {
            PersistentForce::Acceleration(accel) => {
                body.mass.finite().map_or(Vec2::zero(), |mass| accel * mass)
            }
            PersistentForce::Force(force) => force,
            PersistentForce::Spring {
                anchor,
                stiffness,
                damping,
            } => (anchor - body.position()) * stiffness - body.velocity.linear * damping,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadialForceKind {
    /// One-off push outwards on the first frame the emitter is active.
    /// Also hits bodies that can't move.
    Explosion,
    /// Continuous pull inwards.
    Attraction,
    /// Continuous push outwards.
    Repulsion,
}

/// A force emitted from a body's center to everything around it,
/// falling off linearly to zero at `max_radius`.
///
/// Magnitude and radius are in physical units and get converted
/// by the engine's coordinate mapper.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadialForce {
    pub kind: RadialForceKind,
    pub magnitude: f64,
    pub max_radius: f64,
    /// Seconds the emitter stays active.
    pub remaining: f64,
    detonated: bool,
}

impl RadialForce {
    pub fn new(kind: RadialForceKind, magnitude: f64, max_radius: f64, duration: f64) -> Self {
        Self {
            kind,
            magnitude,
            max_radius,
            remaining: duration,
            detonated: false,
        }
    }

    #[inline]
    pub fn is_expired(&self) -> bool {
        self.remaining <= 0.0
    }

    /// Whether the emitter affects its surroundings this frame.
    /// An explosion stops after its first committed frame.
    #[inline]
    pub fn is_emitting(&self) -> bool {
        !self.is_expired() && !self.detonated
    }
}

/// Everything that happens to a body during one frame, staged
/// until the body is committed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameDelta {
    /// Accumulated force, integrated over the timestep.
    pub force: Vec2,
    /// Accumulated instantaneous change in momentum.
    pub impulse: Vec2,
    pub torque: f64,
    pub angular_impulse: f64,
    /// Position correction applied before integrating velocity.
    pub teleport: Vec2,
    pub collided: bool,
    pub collision_point: Option<Vec2>,
    pub wrap_count: u32,
    pub fell_through: bool,
    /// Set for bodies that must be committed even if they don't move by themselves.
    pub needs_recalculation: bool,
}

impl FrameDelta {
    /// Record an impulse applied at a world-space point, generating
    /// an angular impulse around the given center of mass.
    pub fn add_impulse_at(&mut self, impulse: Vec2, point: Vec2, center_of_mass: Vec2) {
        self.impulse += impulse;
        self.angular_impulse += m::cross(point - center_of_mass, impulse);
    }

    /// Record a collision at a point.
    #[inline]
    pub fn mark_hit(&mut self, point: Vec2) {
        self.collided = true;
        self.collision_point = Some(point);
        self.needs_recalculation = true;
    }

    /// Combine another delta into this one.
    pub fn merge(&mut self, other: &FrameDelta) {
        self.force += other.force;
        self.impulse += other.impulse;
        self.torque += other.torque;
        self.angular_impulse += other.angular_impulse;
        self.teleport += other.teleport;
        self.collided |= other.collided;
        if other.collision_point.is_some() {
            self.collision_point = other.collision_point;
        }
        self.wrap_count += other.wrap_count;
        self.fell_through |= other.fell_through;
        self.needs_recalculation |= other.needs_recalculation;
    }
}

/// The unit of simulation: a shape with mass, velocity and per-frame bookkeeping.
///
/// State only changes in [`commit`][Self::commit]. Everything computed during
/// a frame is first staged into a [`FrameDelta`], so readers see the state
/// from the start of the frame no matter which bodies were processed before them.
#[derive(Clone, Debug, PartialEq)]
pub struct RigidBody {
    shape: Shape,
    params: BodyParams,
    mass: Mass,
    moment_of_inertia: Mass,
    velocity: Velocity,
    persistent_forces: Vec<PersistentForce>,
    radial_force: Option<RadialForce>,
    pending: FrameDelta,
    // telemetry
    consecutive_collisions: u32,
    collided_most_recently: bool,
    wrapped_most_recently: bool,
    wrap_count: u32,
    last_collision_point: Option<Vec2>,
}

impl RigidBody {
    /// Create a body at rest. Mass is the shape's area times density.
    pub fn new(shape: impl Into<Shape>, params: BodyParams) -> Result<Self, BodyError> {
        params.validate()?;
        let shape = shape.into();
        let (mass, moment_of_inertia) = mass_properties(&shape, &params);
        Ok(Self {
            shape,
            params,
            mass,
            moment_of_inertia,
            velocity: Velocity::default(),
            persistent_forces: Vec::new(),
            radial_force: None,
            pending: FrameDelta::default(),
            consecutive_collisions: 0,
            collided_most_recently: false,
            wrapped_most_recently: false,
            wrap_count: 0,
            last_collision_point: None,
        })
    }

    /// Set the velocity of the body in a builder-like chain.
    pub fn with_velocity(mut self, vel: Velocity) -> Self {
        self.velocity = vel;
        self
    }

    pub fn with_persistent_force(mut self, force: PersistentForce) -> Self {
        self.persistent_forces.push(force);
        self
    }

    pub fn with_radial_force(mut self, force: RadialForce) -> Self {
        self.radial_force = Some(force);
        self
    }

    /// Replace the shape, recomputing mass properties. Other state is kept.
    pub fn with_shape(mut self, shape: impl Into<Shape>) -> Self {
        self.shape = shape.into();
        let (mass, moment_of_inertia) = mass_properties(&self.shape, &self.params);
        self.mass = mass;
        self.moment_of_inertia = moment_of_inertia;
        self
    }

    //
    // committed state
    //

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn params(&self) -> &BodyParams {
        &self.params
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.shape.center()
    }

    #[inline]
    pub fn rotation(&self) -> f64 {
        self.shape.rotation()
    }

    #[inline]
    pub fn centroid(&self) -> Vec2 {
        self.shape.centroid()
    }

    #[inline]
    pub fn aabb(&self) -> AABB {
        self.shape.aabb()
    }

    #[inline]
    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    #[inline]
    pub fn mass(&self) -> Mass {
        self.mass
    }

    #[inline]
    pub fn moment_of_inertia(&self) -> Mass {
        self.moment_of_inertia
    }

    #[inline]
    pub fn elasticity(&self) -> f64 {
        self.params.elasticity
    }

    /// Whether the body moves on its own and needs to be recalculated every frame.
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.params.can_translate || self.params.can_rotate
    }

    #[inline]
    pub fn persistent_forces(&self) -> &[PersistentForce] {
        &self.persistent_forces
    }

    #[inline]
    pub fn radial_force(&self) -> Option<&RadialForce> {
        self.radial_force.as_ref()
    }

    /// Number of consecutive committed frames in which this body collided.
    #[inline]
    pub fn consecutive_collisions(&self) -> u32 {
        self.consecutive_collisions
    }

    #[inline]
    pub fn has_collided_most_recently(&self) -> bool {
        self.collided_most_recently
    }

    #[inline]
    pub fn has_wrapped_most_recently(&self) -> bool {
        self.wrapped_most_recently
    }

    /// Total number of times the body has wrapped around a wall.
    #[inline]
    pub fn wrap_count(&self) -> u32 {
        self.wrap_count
    }

    #[inline]
    pub fn last_collision_point(&self) -> Option<Vec2> {
        self.last_collision_point
    }

    //
    // staging and committing
    //

    /// The changes staged for the next commit.
    #[inline]
    pub fn pending(&self) -> &FrameDelta {
        &self.pending
    }

    /// Stage changes for the next commit. Committed state is untouched.
    #[inline]
    pub fn pending_mut(&mut self) -> &mut FrameDelta {
        &mut self.pending
    }

    #[inline]
    pub fn stage(&mut self, delta: &FrameDelta) {
        self.pending.merge(delta);
    }

    /// Integrate the staged changes over a timestep with semi-implicit Euler
    /// and clear them.
    pub fn commit(&mut self, dt: f64) {
        let delta = std::mem::take(&mut self.pending);

        if self.params.can_translate {
            let inv_mass = self.mass.inv();
            self.velocity.linear += delta.force * inv_mass * dt + delta.impulse * inv_mass;
            let position = self.position() + delta.teleport + self.velocity.linear * dt;
            self.shape.set_center(position);
        } else {
            self.velocity.linear = Vec2::zero();
        }

        if let Mass::Finite { inverse, .. } = self.moment_of_inertia {
            self.velocity.angular += delta.torque * inverse * dt + delta.angular_impulse * inverse;
            // turn about the centroid, which is where torque is taken
            let pivot = self.centroid();
            let rotation = self.rotation() + self.velocity.angular * dt;
            self.shape.set_rotation(rotation);
            let drift = self.centroid() - pivot;
            self.shape.set_center(self.position() - drift);
        } else {
            self.velocity.angular = 0.0;
        }

        self.consecutive_collisions = if delta.collided {
            self.consecutive_collisions.saturating_add(1)
        } else {
            0
        };
        self.collided_most_recently = delta.collided;
        if delta.collision_point.is_some() {
            self.last_collision_point = delta.collision_point;
        }
        self.wrapped_most_recently = delta.wrap_count > 0;
        self.wrap_count += delta.wrap_count;

        if let Some(radial) = &mut self.radial_force {
            radial.remaining -= dt;
            if radial.kind == RadialForceKind::Explosion {
                radial.detonated = true;
            }
            if radial.is_expired() {
                self.radial_force = None;
            }
        }
    }
}

fn mass_properties(shape: &Shape, params: &BodyParams) -> (Mass, Mass) {
    let mass = if params.can_translate {
        Mass::from(shape.area() * params.density)
    } else {
        Mass::Infinite
    };
    let moment_of_inertia = match shape {
        Shape::Polygon(_) if params.can_rotate => Mass::from(
            shape.area_moment_of_inertia() * params.density / params.ease_of_rotation,
        ),
        _ => Mass::Infinite,
    };
    (mass, moment_of_inertia)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::shape::{Circle, Polygon};
    use std::f64::consts::PI;

    fn ball() -> RigidBody {
        RigidBody::new(
            Circle::new(Vec2::new(0.0, 0.0), 1.0).unwrap(),
            BodyParams::dynamic(),
        )
        .unwrap()
    }

    #[test]
    fn mass_from_area_and_density() {
        let block = RigidBody::new(
            Polygon::rectangle(Vec2::zero(), 2.0, 3.0).unwrap(),
            BodyParams {
                density: 2.0,
                ease_of_rotation: 2.0,
                ..BodyParams::dynamic()
            },
        )
        .unwrap();
        let mass = block.mass().finite().unwrap();
        assert!((mass - 12.0).abs() < 1e-9);
        // w * h * (w^2 + h^2) / 12 * density / ease
        let inertia = block.moment_of_inertia().finite().unwrap();
        assert!((inertia - 6.0 * 13.0 / 12.0).abs() < 1e-9);

        let b = ball();
        assert!((b.mass().finite().unwrap() - PI).abs() < 1e-9);
        // circles never rotate
        assert_eq!(b.moment_of_inertia(), Mass::Infinite);
    }

    #[test]
    fn fixed_bodies_have_infinite_mass() {
        let peg = RigidBody::new(
            Circle::new(Vec2::zero(), 0.5).unwrap(),
            BodyParams::fixed(),
        )
        .unwrap();
        assert_eq!(peg.mass().inv(), 0.0);
        assert!(!peg.is_dynamic());
    }

    #[test]
    fn invalid_params_are_rejected() {
        let circle = Circle::new(Vec2::zero(), 1.0).unwrap();
        let err = RigidBody::new(
            circle,
            BodyParams {
                elasticity: 1.5,
                ..BodyParams::dynamic()
            },
        );
        assert_eq!(err, Err(BodyError::ElasticityOutOfRange(1.5)));
        let err = RigidBody::new(
            circle,
            BodyParams {
                density: 0.0,
                ..BodyParams::dynamic()
            },
        );
        assert_eq!(err, Err(BodyError::NonPositiveDensity(0.0)));
    }

    #[test]
    fn staged_changes_are_invisible_until_commit() {
        let mut b = ball().with_velocity(Velocity {
            linear: Vec2::new(1.0, 0.0),
            angular: 0.0,
        });
        b.pending_mut().teleport = Vec2::new(5.0, 5.0);
        b.pending_mut().impulse = Vec2::new(0.0, 10.0);
        assert_eq!(b.position(), Vec2::zero());
        assert_eq!(b.velocity().linear, Vec2::new(1.0, 0.0));
        assert_eq!(b.aabb().center, Vec2::zero());

        b.commit(0.5);
        let inv_mass = b.mass().inv();
        let v = Vec2::new(1.0, 10.0 * inv_mass);
        assert!((b.velocity().linear - v).mag() < 1e-12);
        assert!((b.position() - (Vec2::new(5.0, 5.0) + v * 0.5)).mag() < 1e-12);
        assert_eq!(*b.pending(), FrameDelta::default());
    }

    #[test]
    fn semi_implicit_euler_uses_new_velocity() {
        let mut b = ball();
        let mass = b.mass().finite().unwrap();
        b.stage(&FrameDelta {
            force: Vec2::new(0.0, 2.0 * mass),
            ..Default::default()
        });
        b.commit(1.0);
        assert!((b.velocity().linear - Vec2::new(0.0, 2.0)).mag() < 1e-12);
        assert!((b.position() - Vec2::new(0.0, 2.0)).mag() < 1e-12);
    }

    #[test]
    fn collision_counter_resets_without_contact() {
        let mut b = ball();
        for _ in 0..3 {
            b.pending_mut().mark_hit(Vec2::new(1.0, 0.0));
            b.commit(0.1);
        }
        assert_eq!(b.consecutive_collisions(), 3);
        assert!(b.has_collided_most_recently());
        b.commit(0.1);
        assert_eq!(b.consecutive_collisions(), 0);
        assert!(!b.has_collided_most_recently());
        assert_eq!(b.last_collision_point(), Some(Vec2::new(1.0, 0.0)));
    }

    #[test]
    fn fixed_body_ignores_impulses() {
        let mut peg = RigidBody::new(
            Polygon::regular(Vec2::new(3.0, 3.0), 1.0, 5).unwrap(),
            BodyParams::fixed(),
        )
        .unwrap();
        let c = peg.centroid();
        peg.pending_mut()
            .add_impulse_at(Vec2::new(4.0, 0.0), Vec2::new(3.0, 2.0), c);
        peg.commit(1.0);
        assert_eq!(peg.position(), Vec2::new(3.0, 3.0));
        assert_eq!(peg.rotation(), 0.0);
    }

    #[test]
    fn off_center_impulse_spins_polygon() {
        let mut block = RigidBody::new(
            Polygon::rectangle(Vec2::zero(), 2.0, 2.0).unwrap(),
            BodyParams::dynamic(),
        )
        .unwrap();
        // push right at the top edge
        let c = block.centroid();
        block
            .pending_mut()
            .add_impulse_at(Vec2::new(1.0, 0.0), Vec2::new(0.0, -1.0), c);
        block.commit(0.1);
        assert!(block.velocity().angular > 0.0);
        assert!(block.rotation() > 0.0);
    }

    #[test]
    fn spinning_triangle_turns_about_its_centroid() {
        let mut tri = RigidBody::new(
            Polygon::triangle(
                Vec2::zero(),
                [Vec2::zero(), Vec2::new(3.0, 0.0), Vec2::new(0.0, 3.0)],
            )
            .unwrap(),
            BodyParams {
                uses_global_acceleration: false,
                ..BodyParams::dynamic()
            },
        )
        .unwrap()
        .with_velocity(Velocity {
            linear: Vec2::zero(),
            angular: 3.0,
        });
        let start = tri.centroid();
        let start_rotation = tri.rotation();
        for _ in 0..60 {
            tri.commit(1.0 / 60.0);
        }
        assert!((tri.centroid() - start).mag() < 1e-9);
        assert!((tri.rotation() - start_rotation - 3.0).abs() < 1e-9);
        assert_eq!(tri.velocity().linear, Vec2::zero());
    }

    #[test]
    fn explosion_detonates_once_but_lingers() {
        let mut bomb = RigidBody::new(
            Circle::new(Vec2::zero(), 1.0).unwrap(),
            BodyParams::fixed(),
        )
        .unwrap()
        .with_radial_force(RadialForce::new(RadialForceKind::Explosion, 1.0, 5.0, 0.5));
        assert!(bomb.radial_force().unwrap().is_emitting());
        bomb.commit(0.1);
        let radial = bomb.radial_force().unwrap();
        assert!(!radial.is_emitting());
        assert!(!radial.is_expired());

        let mut magnet = bomb
            .clone()
            .with_radial_force(RadialForce::new(RadialForceKind::Attraction, 1.0, 5.0, 0.5));
        magnet.commit(0.1);
        assert!(magnet.radial_force().unwrap().is_emitting());
    }

    #[test]
    fn spring_pulls_toward_anchor() {
        let spring = PersistentForce::Spring {
            anchor: Vec2::new(2.0, 0.0),
            stiffness: 3.0,
            damping: 0.5,
        };
        let b = ball()
            .with_velocity(Velocity {
                linear: Vec2::new(1.0, 0.0),
                angular: 0.0,
            })
            .with_persistent_force(spring);
        assert_eq!(spring.force_on(&b), Vec2::new(5.5, 0.0));
    }

    #[test]
    fn radial_emitter_expires() {
        let mut b = ball().with_radial_force(RadialForce::new(
            RadialForceKind::Repulsion,
            1.0,
            5.0,
            0.25,
        ));
        b.commit(0.1);
        assert!(b.radial_force().is_some());
        b.commit(0.1);
        b.commit(0.1);
        assert!(b.radial_force().is_none());
    }
}
