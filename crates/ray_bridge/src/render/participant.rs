//! Scene participants and the per-frame submission context
//!
//! Every visible participant is asked once per frame to put its backend
//! objects into the frame's freshly created containers. Geometry goes in as
//! a [`Renderable`]: a new instance wrapping the participant's persistent
//! model. Ownership of that instance passes to the container.

use crate::backend::{ObjectHandle, ObjectKind, Param, RayBackend};
use crate::config::BridgeConfig;
use crate::foundation::math::Mat4;

use super::volume::VolumeCache;
use super::RenderResult;

/// Handles a participant needs while contributing to one frame
pub struct FrameContext<'a> {
    /// Backend used for every object created this frame
    pub backend: &'a mut dyn RayBackend,
    /// Renderer-wide settings
    pub config: &'a BridgeConfig,
    /// Uploaded volumes keyed by (volume, timestep)
    pub volume_cache: &'a mut VolumeCache,
    model: ObjectHandle,
    volume_model: ObjectHandle,
    has_volume: bool,
    contributions: usize,
}

impl<'a> FrameContext<'a> {
    pub(crate) fn new(
        backend: &'a mut dyn RayBackend,
        config: &'a BridgeConfig,
        volume_cache: &'a mut VolumeCache,
        model: ObjectHandle,
        volume_model: ObjectHandle,
    ) -> Self {
        Self {
            backend,
            config,
            volume_cache,
            model,
            volume_model,
            has_volume: false,
            contributions: 0,
        }
    }

    /// Root geometry container of this frame
    pub const fn model(&self) -> ObjectHandle {
        self.model
    }

    /// Volume container of this frame
    pub const fn volume_model(&self) -> ObjectHandle {
        self.volume_model
    }

    /// Put an uploaded volume into this frame's volume container
    pub fn add_volume(&mut self, volume: ObjectHandle) -> RenderResult<()> {
        self.backend.add_to_model(self.volume_model, volume)?;
        self.has_volume = true;
        self.contributions += 1;
        Ok(())
    }

    /// Whether any volume was added this frame
    pub const fn has_volume(&self) -> bool {
        self.has_volume
    }

    /// Objects added to either container this frame
    pub const fn contributions(&self) -> usize {
        self.contributions
    }
}

/// A persistent model placed into the frame's root container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renderable {
    /// Persistent model owned by the participant
    pub model: ObjectHandle,
    /// Per-frame instance owned by the root container
    pub instance: ObjectHandle,
}

impl Renderable {
    /// Wrap `model` in a new instance placed by `transform` and register it
    pub fn register(
        frame: &mut FrameContext<'_>,
        model: ObjectHandle,
        transform: &Mat4,
    ) -> RenderResult<Self> {
        let instance = frame.backend.create(ObjectKind::Instance)?;
        frame.backend.set_param(instance, "model", Param::Object(model))?;
        frame.backend.set_param(instance, "xfm", Param::Mat4(*transform))?;
        frame.backend.commit(instance)?;
        frame.backend.add_to_model(frame.model, instance)?;
        frame.contributions += 1;
        Ok(Self { model, instance })
    }
}

/// Something in the host scene that contributes backend objects each frame
pub trait SceneParticipant {
    /// Invisible participants are skipped for the frame
    fn is_visible(&self) -> bool;

    /// Report and reset whether the participant changed since the last call
    ///
    /// A change clears the accumulation buffer before the next pass.
    fn take_changed(&mut self) -> bool;

    /// Add this frame's objects to the frame containers
    ///
    /// Missing inputs are logged and skipped; errors are reserved for
    /// backend failures.
    fn contribute(&mut self, frame: &mut FrameContext<'_>) -> RenderResult<()>;

    /// Release persistent backend objects
    fn release(&mut self, backend: &mut dyn RayBackend);
}
