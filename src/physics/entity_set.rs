use super::RigidBody;

use thunderdome as td;

/// Key type to look up a body stored in the physics engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyKey(pub(super) td::Index);

impl BodyKey {
    /// Get the underlying [`thunderdome::Index`][thunderdome::Index] of this key.
    /// Useful for creating your own mappings from bodies to game objects.
    #[inline]
    pub fn index(&self) -> td::Index {
        self.0
    }

    /// Position in the arena, used for addressing working buffers during a frame.
    #[inline]
    pub(crate) fn slot(&self) -> usize {
        self.0.slot() as usize
    }
}

/// Storage for the bodies in the physics engine.
#[derive(Clone, Debug, Default)]
pub(crate) struct BodySet {
    bodies: td::Arena<RigidBody>,
    // keeping track of highest slot index
    // because slots are used for addressing during a frame
    slot_count: usize,
}

impl BodySet {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, key: BodyKey) -> Option<&RigidBody> {
        self.bodies.get(key.0)
    }

    #[inline]
    pub fn get_mut(&mut self, key: BodyKey) -> Option<&mut RigidBody> {
        self.bodies.get_mut(key.0)
    }

    #[inline]
    pub fn contains(&self, key: BodyKey) -> bool {
        self.bodies.contains(key.0)
    }

    pub fn insert(&mut self, body: RigidBody) -> BodyKey {
        let key = self.bodies.insert(body);
        let slot = key.slot() as usize;
        if slot >= self.slot_count {
            self.slot_count = slot + 1;
        }
        BodyKey(key)
    }

    #[inline]
    pub fn remove(&mut self, key: BodyKey) -> Option<RigidBody> {
        self.bodies.remove(key.0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// One past the highest slot ever occupied since the last clear.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Iterate in slot order, which is stable between frames.
    pub fn iter(&self) -> impl Iterator<Item = (BodyKey, &RigidBody)> {
        self.bodies.iter().map(|(k, b)| (BodyKey(k), b))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BodyKey, &mut RigidBody)> {
        self.bodies.iter_mut().map(|(k, b)| (BodyKey(k), b))
    }

    pub fn keys(&self) -> impl Iterator<Item = BodyKey> + '_ {
        self.bodies.iter().map(|(k, _)| BodyKey(k))
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
        self.slot_count = 0;
    }
}
