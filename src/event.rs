//! Notifications produced by the physics engine for the gameplay layer.
//!
//! Instead of calling back into the game while bodies are being updated,
//! the engine queues events in the order they happen and the game drains
//! them once per frame.

use crate::physics::BodyKey;

/// Why a body left the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalReason {
    /// Removed by the caller.
    Explicit,
    /// Fully exited through a wall with [`WallBehavior::FallThrough`][crate::physics::body::WallBehavior].
    FellThrough,
    /// Collided for too many consecutive frames.
    Stuck,
    /// The whole engine was cleared.
    Cleared,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhysicsEvent {
    Added(BodyKey),
    Updated(BodyKey),
    Removed { key: BodyKey, reason: RemovalReason },
    /// Every body has been committed for this frame.
    AllUpdatesFinished { listener: ListenerId },
}

/// Handle to a registered finish listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// How long a finish listener stays registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishListener {
    /// Notified after every frame until unregistered.
    Permanent,
    /// Notified after the next frame only.
    Once,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct EventQueue {
    events: Vec<PhysicsEvent>,
    listeners: Vec<(ListenerId, FinishListener)>,
    next_listener: u64,
}

impl EventQueue {
    #[inline]
    pub fn push(&mut self, evt: PhysicsEvent) {
        self.events.push(evt);
    }

    pub fn register(&mut self, listener: FinishListener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Returns false if the listener wasn't registered (anymore).
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    /// Notify finish listeners in registration order and drop the one-shot ones.
    pub fn finish_frame(&mut self) {
        for (id, _) in &self.listeners {
            self.events
                .push(PhysicsEvent::AllUpdatesFinished { listener: *id });
        }
        self.listeners
            .retain(|(_, l)| matches!(l, FinishListener::Permanent));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn drain(&mut self) -> std::vec::Drain<'_, PhysicsEvent> {
        self.events.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn once_listeners_fire_a_single_time() {
        let mut queue = EventQueue::default();
        let permanent = queue.register(FinishListener::Permanent);
        let once = queue.register(FinishListener::Once);

        queue.finish_frame();
        let first: Vec<_> = queue.drain().collect();
        assert_eq!(
            first,
            vec![
                PhysicsEvent::AllUpdatesFinished {
                    listener: permanent
                },
                PhysicsEvent::AllUpdatesFinished { listener: once },
            ]
        );

        queue.finish_frame();
        let second: Vec<_> = queue.drain().collect();
        assert_eq!(
            second,
            vec![PhysicsEvent::AllUpdatesFinished {
                listener: permanent
            }]
        );
        assert!(!queue.unregister(once));
        assert!(queue.unregister(permanent));
        queue.finish_frame();
        assert_eq!(queue.len(), 0);
    }
}
