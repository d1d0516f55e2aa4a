pub mod event;
pub use event::{FinishListener, ListenerId, PhysicsEvent, RemovalReason};

pub mod math;
pub use math::{uv, CoordinateMapper, IdentityMapper, ScaleMapper, Unit, Vec2};

pub mod physics;
pub use physics::{
    body::{
        BodyError, BodyParams, FrameDelta, Mass, PersistentForce, RadialForce, RadialForceKind,
        RigidBody, WallBehavior, WallBehaviors,
    },
    collision::{self, Contact, QuadTree, QuadTreeParams, AABB},
    forcefield,
    shape::{Circle, Polygon, PolygonKind, Shape, ShapeError},
    BodyKey, EngineParams, ParamsError, PhysicsEngine, Velocity,
};
