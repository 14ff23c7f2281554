//! Volume actors
//!
//! The actor owns host data and appearance only. Backend objects belong to
//! the context's [`super::VolumeCache`], so dropping an actor never discards
//! an upload another timestep could still reuse.

use crate::backend::RayBackend;
use crate::foundation::collections::Revision;

use super::{Timestep, VolumeData, VolumeHandles, VolumeProperty};
use crate::render::participant::{FrameContext, SceneParticipant};
use crate::render::RenderResult;

/// A structured volume placed in the scene
#[derive(Debug, Clone)]
pub struct VolumeActor {
    data: VolumeData,
    property: VolumeProperty,
    visible: bool,
    toggled: bool,
    observed: Option<(Revision, Revision, Timestep)>,
    last_handles: Option<VolumeHandles>,
}

impl VolumeActor {
    /// Create a visible volume actor
    pub fn new(data: VolumeData, property: VolumeProperty) -> Self {
        Self {
            data,
            property,
            visible: true,
            toggled: false,
            observed: None,
            last_handles: None,
        }
    }

    /// Host data
    pub const fn data(&self) -> &VolumeData {
        &self.data
    }

    /// Mutable host data; revisions track edits
    pub fn data_mut(&mut self) -> &mut VolumeData {
        &mut self.data
    }

    /// Appearance
    pub const fn property(&self) -> &VolumeProperty {
        &self.property
    }

    /// Mutable appearance
    pub fn property_mut(&mut self) -> &mut VolumeProperty {
        &mut self.property
    }

    /// Show or hide the volume
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.toggled = true;
        }
    }

    /// Handles submitted in the most recent frame
    pub const fn last_handles(&self) -> Option<VolumeHandles> {
        self.last_handles
    }

    fn revisions(&self) -> (Revision, Revision, Timestep) {
        (self.data.revision(), self.property.revision(), self.data.timestep())
    }
}

impl SceneParticipant for VolumeActor {
    fn is_visible(&self) -> bool {
        self.visible
    }

    fn take_changed(&mut self) -> bool {
        let now = self.revisions();
        let changed = std::mem::take(&mut self.toggled) || self.observed != Some(now);
        self.observed = Some(now);
        changed
    }

    fn contribute(&mut self, frame: &mut FrameContext<'_>) -> RenderResult<()> {
        self.last_handles = frame.volume_cache.get_or_create(
            &mut *frame.backend,
            &self.data,
            &self.property,
            frame.config,
        )?;
        if let Some(handles) = self.last_handles {
            frame.add_volume(handles.volume)?;
        }
        Ok(())
    }

    fn release(&mut self, _backend: &mut dyn RayBackend) {
        self.last_handles = None;
    }
}
