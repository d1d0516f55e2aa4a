use crate::{
    event::{EventQueue, FinishListener, ListenerId, PhysicsEvent, RemovalReason},
    math::{self as m, CoordinateMapper, IdentityMapper, Vec2},
};

//

pub mod body;
pub use body::{
    BodyError, BodyParams, FrameDelta, Mass, PersistentForce, RadialForce, RadialForceKind,
    RigidBody, WallBehavior, WallBehaviors,
};

pub mod collision;
use collision::{is_colliding, QuadTree, QuadTreeParams, AABB};

mod entity_set;
use entity_set::BodySet;
pub use entity_set::BodyKey;

pub mod forcefield;
use forcefield::{Gravity, RadialField};

pub mod shape;
pub use shape::{Circle, Polygon, PolygonKind, Shape, ShapeError};

mod solver;
use solver::WorldView;

//

/// Velocity of an object.
///
// Equivalent to a Vec3 but with names for the translational and rotational part.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Velocity {
    /// Linear velocity in logical units per second.
    pub linear: Vec2,
    /// Angular velocity in radians per second.
    pub angular: f64,
}

impl Default for Velocity {
    fn default() -> Self {
        Velocity {
            linear: Vec2::zero(),
            angular: 0.0,
        }
    }
}

impl Velocity {
    /// Get the linear velocity of a point offset from the center of mass.
    pub fn point_velocity(&self, offset: Vec2) -> Vec2 {
        let tangent = m::left_normal(offset) * self.angular;
        self.linear + tangent
    }
}

//

/// Error when configuring or running the engine with invalid parameters.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ParamsError {
    #[error("quadtree split threshold must be at least 1")]
    ZeroSplitThreshold,
    #[error("timestep must be positive and finite, got {0}")]
    NonPositiveTimestep(f64),
    #[error("global acceleration must be finite")]
    NonFiniteAcceleration,
    #[error("world bounds must have positive finite size")]
    DegenerateBounds,
}

/// Parameters for the creation of a [`PhysicsEngine`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct EngineParams {
    /// Acceleration applied to every body that uses it, in physical units.
    /// Converted with the engine's coordinate mapper.
    pub global_acceleration: [f64; 2],
    pub quadtree: QuadTreeParams,
    /// A body colliding for more consecutive frames than this is removed
    /// unless it is always tracked.
    pub stuck_frame_threshold: u32,
    /// Whether every body committed during a frame produces an
    /// [`Updated`][PhysicsEvent::Updated] event.
    pub emit_update_events: bool,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            global_acceleration: [0.0, 9.81],
            quadtree: QuadTreeParams::default(),
            stuck_frame_threshold: 300,
            emit_update_events: true,
        }
    }
}

impl EngineParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.quadtree.split_threshold == 0 {
            return Err(ParamsError::ZeroSplitThreshold);
        }
        if !self.global_acceleration.iter().all(|a| a.is_finite()) {
            return Err(ParamsError::NonFiniteAcceleration);
        }
        Ok(())
    }
}

fn check_bounds(bounds: &AABB) -> Result<(), ParamsError> {
    let size_ok = |s: f64| s > 0.0 && s.is_finite();
    if size_ok(bounds.width()) && size_ok(bounds.height()) && m::is_finite(bounds.center) {
        Ok(())
    } else {
        Err(ParamsError::DegenerateBounds)
    }
}

fn check_timestep(dt: f64) -> Result<(), ParamsError> {
    if dt > 0.0 && dt.is_finite() {
        Ok(())
    } else {
        Err(ParamsError::NonPositiveTimestep(dt))
    }
}

/// Fixed-timestep simulation of rigid bodies inside a rectangular playable area.
///
/// The engine owns the bodies and the spatial index over them
/// and keeps the two consistent. Bodies are only ever mutated through
/// the methods here, and during a frame only after every body
/// has been calculated against the state from the start of the frame.
pub struct PhysicsEngine<M: CoordinateMapper = IdentityMapper> {
    bodies: BodySet,
    tree: QuadTree<BodyKey>,
    bounds: AABB,
    params: EngineParams,
    mapper: M,
    events: EventQueue,
    // working buffers reused between frames, indexed by body slot
    deltas: Vec<FrameDelta>,
    hits: Vec<(BodyKey, Vec2)>,
    scratch: Vec<BodyKey>,
}

impl PhysicsEngine<IdentityMapper> {
    pub fn new(bounds: AABB, params: EngineParams) -> Result<Self, ParamsError> {
        Self::with_mapper(bounds, params, IdentityMapper)
    }
}

impl<M: CoordinateMapper> PhysicsEngine<M> {
    pub fn with_mapper(bounds: AABB, params: EngineParams, mapper: M) -> Result<Self, ParamsError> {
        params.validate()?;
        check_bounds(&bounds)?;
        Ok(Self {
            bodies: BodySet::new(),
            tree: QuadTree::new(bounds, params.quadtree),
            bounds,
            params,
            mapper,
            events: EventQueue::default(),
            deltas: Vec::new(),
            hits: Vec::new(),
            scratch: Vec::new(),
        })
    }

    #[inline]
    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    #[inline]
    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// The playable area.
    #[inline]
    pub fn bounds(&self) -> AABB {
        self.bounds
    }

    /// Read access to the spatial index, e.g. for debug drawing.
    #[inline]
    pub fn quadtree(&self) -> &QuadTree<BodyKey> {
        &self.tree
    }

    //
    // body lifecycle
    //

    pub fn add(&mut self, body: RigidBody) -> BodyKey {
        let aabb = body.aabb();
        let key = self.bodies.insert(body);
        self.tree.insert(key, aabb);
        log::debug!("added body {:?}", key);
        self.events.push(PhysicsEvent::Added(key));
        key
    }

    /// Remove a body, returning it if it still existed.
    pub fn remove(&mut self, key: BodyKey) -> Option<RigidBody> {
        self.remove_with_reason(key, RemovalReason::Explicit)
    }

    fn remove_with_reason(&mut self, key: BodyKey, reason: RemovalReason) -> Option<RigidBody> {
        let body = self.bodies.remove(key)?;
        let found = self.tree.remove(key, &body.aabb());
        debug_assert!(found, "body {:?} was missing from the quadtree", key);
        log::debug!("removed body {:?} ({:?})", key, reason);
        self.events.push(PhysicsEvent::Removed { key, reason });
        Some(body)
    }

    /// Replace a body with a new version of it, returning the old one.
    /// Returns None and does nothing if the key doesn't exist.
    pub fn update(&mut self, key: BodyKey, body: RigidBody) -> Option<RigidBody> {
        let new_aabb = body.aabb();
        let slot = self.bodies.get_mut(key)?;
        let old = std::mem::replace(slot, body);
        let found = self.tree.remove(key, &old.aabb());
        debug_assert!(found, "body {:?} was missing from the quadtree", key);
        self.tree.insert(key, new_aabb);
        self.events.push(PhysicsEvent::Updated(key));
        Some(old)
    }

    /// Remove every body matching a predicate, returning their keys.
    pub fn remove_where(&mut self, mut pred: impl FnMut(BodyKey, &RigidBody) -> bool) -> Vec<BodyKey> {
        let doomed: Vec<BodyKey> = self
            .bodies
            .iter()
            .filter(|(key, body)| pred(*key, *body))
            .map(|(key, _)| key)
            .collect();
        for &key in &doomed {
            self.remove_with_reason(key, RemovalReason::Explicit);
        }
        doomed
    }

    /// Remove every body.
    pub fn clear(&mut self) {
        for key in self.bodies.keys() {
            self.events.push(PhysicsEvent::Removed {
                key,
                reason: RemovalReason::Cleared,
            });
        }
        log::debug!("cleared {} bodies", self.bodies.len());
        self.bodies.clear();
        self.tree.clear();
    }

    /// Change the playable area and rebuild the spatial index.
    pub fn resize(&mut self, bounds: AABB) -> Result<(), ParamsError> {
        check_bounds(&bounds)?;
        self.bounds = bounds;
        self.tree
            .resize(bounds, self.bodies.iter().map(|(key, body)| (key, body.aabb())));
        log::debug!(
            "resized world to {}x{}, {} bodies reinserted",
            bounds.width(),
            bounds.height(),
            self.tree.len()
        );
        Ok(())
    }

    //
    // access
    //

    #[inline]
    pub fn get(&self, key: BodyKey) -> Option<&RigidBody> {
        self.bodies.get(key)
    }

    #[inline]
    pub fn contains(&self, key: BodyKey) -> bool {
        self.bodies.contains(key)
    }

    /// Iterate over all bodies in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (BodyKey, &RigidBody)> {
        self.bodies.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bodies.len() == 0
    }

    //
    // queries
    //

    /// Bodies that might overlap the given body, not including itself.
    pub fn potential_neighbors(&self, key: BodyKey) -> Vec<BodyKey> {
        match self.bodies.get(key) {
            Some(body) => {
                let mut out = self.tree.potential_neighbors(&body.aabb());
                out.retain(|k| *k != key);
                out
            }
            None => Vec::new(),
        }
    }

    /// Bodies that might overlap the given box.
    pub fn potential_neighbors_of_aabb(&self, aabb: &AABB) -> Vec<BodyKey> {
        self.tree.potential_neighbors(aabb)
    }

    /// Find a body whose shape contains the given point.
    pub fn body_at(&self, point: Vec2) -> Option<BodyKey> {
        self.tree
            .potential_neighbors(&AABB::new(point, Vec2::zero()))
            .into_iter()
            .find(|key| {
                self.bodies
                    .get(*key)
                    .map_or(false, |body| body.shape().contains_point(point))
            })
    }

    /// Check whether a shape would overlap any body, optionally ignoring one.
    /// Used to validate placement before adding or moving a body.
    pub fn overlaps_any(&self, shape: &Shape, exclude: Option<BodyKey>) -> bool {
        let aabb = shape.aabb();
        self.tree
            .potential_neighbors(&aabb)
            .into_iter()
            .filter(|key| Some(*key) != exclude)
            .filter_map(|key| self.bodies.get(key))
            .any(|body| aabb.overlaps(&body.aabb()) && is_colliding(shape, body.shape()))
    }

    //
    // events
    //

    /// Take every event produced since the last call, oldest first.
    pub fn drain_events(&mut self) -> impl Iterator<Item = PhysicsEvent> + '_ {
        self.events.drain()
    }

    /// Get notified with [`PhysicsEvent::AllUpdatesFinished`] at the end of frames.
    pub fn register_finish_listener(&mut self, listener: FinishListener) -> ListenerId {
        self.events.register(listener)
    }

    /// Returns false if the listener was not registered.
    pub fn unregister_finish_listener(&mut self, id: ListenerId) -> bool {
        self.events.unregister(id)
    }

    //
    // simulation
    //

    fn gravity(&self) -> Gravity {
        let [x, y] = self.params.global_acceleration;
        Gravity(self.mapper.logical_vector(Vec2::new(x, y)))
    }

    /// Advance the simulation by one timestep.
    pub fn simulate_all(&mut self, dt: f64) -> Result<(), ParamsError> {
        check_timestep(dt)?;
        self.calculate();
        let removed = self.cleanup();
        let committed = self.apply(dt);
        self.events.finish_frame();
        log::trace!(
            "frame done: {} bodies committed, {} removed, {} events queued",
            committed,
            removed,
            self.events.len()
        );
        Ok(())
    }

    /// Compute every body's changes for this frame into the delta buffer.
    fn calculate(&mut self) {
        self.deltas.clear();
        self.deltas
            .resize(self.bodies.slot_count(), FrameDelta::default());
        self.hits.clear();

        let gravity = self.gravity();
        let world = WorldView {
            bodies: &self.bodies,
            tree: &self.tree,
            bounds: self.bounds,
        };

        for (key, body) in self.bodies.iter() {
            let delta = &mut self.deltas[key.slot()];
            if body.is_dynamic() {
                solver::apply_forces(body, &gravity, delta);
                if body.params().can_translate {
                    solver::resolve_walls(body, &world.bounds, delta);
                }
                solver::resolve_collisions(
                    body,
                    Some(key),
                    &world,
                    delta,
                    &mut self.hits,
                    &mut self.scratch,
                );
                delta.needs_recalculation = true;
            } else if body.has_collided_most_recently() {
                // commit even if nothing hits it, so the collision counter resets
                delta.needs_recalculation = true;
            }

            if let Some(radial) = body.radial_force() {
                delta.needs_recalculation = true;
                if radial.is_emitting() {
                    let field = RadialField::new(body.centroid(), radial, &self.mapper);
                    solver::emit_radial(key, &field, &world, &mut self.deltas, &mut self.scratch);
                }
            }
        }

        for (key, point) in self.hits.drain(..) {
            self.deltas[key.slot()].mark_hit(point);
        }
    }

    /// Remove bodies that fell out of the world or got stuck.
    fn cleanup(&mut self) -> usize {
        let threshold = self.params.stuck_frame_threshold;
        let doomed: Vec<(BodyKey, RemovalReason)> = self
            .bodies
            .iter()
            .filter_map(|(key, body)| {
                if self.deltas[key.slot()].fell_through {
                    Some((key, RemovalReason::FellThrough))
                } else if !body.params().always_tracked
                    && body.consecutive_collisions() > threshold
                {
                    log::warn!(
                        "body {:?} collided for {} frames in a row, removing it",
                        key,
                        body.consecutive_collisions()
                    );
                    Some((key, RemovalReason::Stuck))
                } else {
                    None
                }
            })
            .collect();

        for &(key, reason) in &doomed {
            self.remove_with_reason(key, reason);
        }
        doomed.len()
    }

    /// Commit the calculated changes and update the spatial index.
    fn apply(&mut self, dt: f64) -> usize {
        let mut committed = 0;
        for (key, body) in self.bodies.iter_mut() {
            let delta = &self.deltas[key.slot()];
            if !delta.needs_recalculation {
                continue;
            }
            let old_aabb = body.aabb();
            body.stage(delta);
            body.commit(dt);

            let found = self.tree.remove(key, &old_aabb);
            debug_assert!(found, "body {:?} was missing from the quadtree", key);
            self.tree.insert(key, body.aabb());
            if self.params.emit_update_events {
                self.events.push(PhysicsEvent::Updated(key));
            }
            committed += 1;
        }
        committed
    }

    //
    // prediction
    //

    /// Predict the positions a body in the engine will have over the next
    /// `steps` frames, if nothing else moved.
    ///
    /// Nothing in the engine changes. Returns None if the key doesn't exist.
    pub fn predict(&self, key: BodyKey, dt: f64, steps: usize) -> Option<Vec<Vec2>> {
        let body = self.bodies.get(key)?;
        Some(self.predict_excluding(Some(key), body, dt, steps))
    }

    /// Predict the path of a body that isn't in the engine (yet),
    /// e.g. a ball about to be launched.
    pub fn predict_body(&self, body: &RigidBody, dt: f64, steps: usize) -> Vec<Vec2> {
        self.predict_excluding(None, body, dt, steps)
    }

    /// Step a copy of a body against the live world. The prediction stops
    /// early if the copy falls out of the world. An invalid timestep
    /// predicts nothing.
    fn predict_excluding(
        &self,
        exclude: Option<BodyKey>,
        body: &RigidBody,
        dt: f64,
        steps: usize,
    ) -> Vec<Vec2> {
        if check_timestep(dt).is_err() {
            return Vec::new();
        }
        let gravity = self.gravity();
        let world = WorldView {
            bodies: &self.bodies,
            tree: &self.tree,
            bounds: self.bounds,
        };
        let mut ghost = body.clone();
        *ghost.pending_mut() = FrameDelta::default();
        let mut hits = Vec::new();
        let mut scratch = Vec::new();
        let mut path = Vec::with_capacity(steps);

        for _ in 0..steps {
            let mut delta = FrameDelta::default();
            solver::apply_forces(&ghost, &gravity, &mut delta);
            if ghost.params().can_translate {
                solver::resolve_walls(&ghost, &world.bounds, &mut delta);
            }
            solver::resolve_collisions(&ghost, exclude, &world, &mut delta, &mut hits, &mut scratch);
            hits.clear();
            if delta.fell_through {
                break;
            }
            ghost.stage(&delta);
            ghost.commit(dt);
            path.push(ghost.position());
        }
        path
    }
}
