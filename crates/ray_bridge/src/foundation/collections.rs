//! Handle collections used by the scene and the reference backend

pub use slotmap::{SlotMap, new_key_type, Key};

new_key_type! {
    /// Stable handle to a geometry actor inside a [`crate::scene::Scene`]
    pub struct ActorId;

    /// Stable handle to a volume actor inside a [`crate::scene::Scene`]
    pub struct VolumeActorId;

    /// Stable handle to a light inside a [`crate::scene::Scene`]
    pub struct LightId;
}

/// Monotonic revision counter for change detection
///
/// Host-side objects bump their revision whenever a setter changes state that
/// the backend copy depends on. Consumers remember the revision they last
/// uploaded and compare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(u64);

impl Revision {
    /// Create a fresh revision counter
    pub const fn new() -> Self {
        Self(0)
    }

    /// Advance the counter
    pub fn bump(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    /// Raw counter value
    pub const fn value(self) -> u64 {
        self.0
    }
}
