//! Host scene
//!
//! Holds the camera, the geometry and volume actors and the lights the
//! synchronizer turns into backend objects each frame. Actors and lights are
//! addressed by slotmap keys that stay valid across removals.
//!
//! Change tracking is pull-based: the synchronizer calls
//! [`Scene::take_changes`] once per frame and every object reports whether it
//! changed since the previous call.

use crate::backend::RayBackend;
use crate::foundation::collections::{ActorId, LightId, SlotMap, VolumeActorId};
use crate::render::{
    ChangeFlags, FrameContext, GeometryActor, HostCamera, HostLight, RenderResult, SceneLight,
    SceneParticipant, VolumeActor, VolumeId,
};

/// Everything the host wants rendered
#[derive(Debug, Default)]
pub struct Scene {
    camera: HostCamera,
    actors: SlotMap<ActorId, GeometryActor>,
    volumes: SlotMap<VolumeActorId, VolumeActor>,
    lights: SlotMap<LightId, HostLight>,
    retired: Vec<GeometryActor>,
    pending: ChangeFlags,
}

impl Scene {
    /// Empty scene with a default camera
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty scene viewed through `camera`
    pub fn with_camera(camera: HostCamera) -> Self {
        Self {
            camera,
            ..Self::default()
        }
    }

    /// Active camera
    pub const fn camera(&self) -> &HostCamera {
        &self.camera
    }

    /// Mutable active camera; pose changes are detected by the synchronizer
    pub fn camera_mut(&mut self) -> &mut HostCamera {
        &mut self.camera
    }

    /// Add a geometry actor
    pub fn add_actor(&mut self, actor: GeometryActor) -> ActorId {
        self.pending |= ChangeFlags::CONTENT;
        self.actors.insert(actor)
    }

    /// Geometry actor by id
    pub fn actor(&self, id: ActorId) -> Option<&GeometryActor> {
        self.actors.get(id)
    }

    /// Mutable geometry actor by id
    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut GeometryActor> {
        self.actors.get_mut(id)
    }

    /// Remove a geometry actor; its backend objects are released next frame
    pub fn remove_actor(&mut self, id: ActorId) -> bool {
        let Some(actor) = self.actors.remove(id) else {
            return false;
        };
        self.retired.push(actor);
        self.pending |= ChangeFlags::CONTENT;
        true
    }

    /// Add a volume actor
    pub fn add_volume(&mut self, volume: VolumeActor) -> VolumeActorId {
        self.pending |= ChangeFlags::CONTENT;
        self.volumes.insert(volume)
    }

    /// Volume actor by id
    pub fn volume(&self, id: VolumeActorId) -> Option<&VolumeActor> {
        self.volumes.get(id)
    }

    /// Mutable volume actor by id
    pub fn volume_mut(&mut self, id: VolumeActorId) -> Option<&mut VolumeActor> {
        self.volumes.get_mut(id)
    }

    /// Remove a volume actor
    ///
    /// Its uploads stay in the volume cache; evict them through the render
    /// context with the returned id if they are no longer wanted.
    pub fn remove_volume(&mut self, id: VolumeActorId) -> Option<VolumeId> {
        let volume = self.volumes.remove(id)?;
        self.pending |= ChangeFlags::CONTENT;
        Some(volume.data().id())
    }

    /// Add a light
    pub fn add_light(&mut self, light: HostLight) -> LightId {
        self.pending |= ChangeFlags::LIGHTS;
        self.lights.insert(light)
    }

    /// Light by id
    pub fn light(&self, id: LightId) -> Option<&HostLight> {
        self.lights.get(id)
    }

    /// Mutable light by id
    pub fn light_mut(&mut self, id: LightId) -> Option<&mut HostLight> {
        self.lights.get_mut(id)
    }

    /// Remove a light
    pub fn remove_light(&mut self, id: LightId) -> bool {
        let removed = self.lights.remove(id).is_some();
        if removed {
            self.pending |= ChangeFlags::LIGHTS;
        }
        removed
    }

    /// Number of geometry actors
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    /// Number of volume actors
    pub fn volume_count(&self) -> usize {
        self.volumes.len()
    }

    /// Number of lights
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    /// Collect and reset content and light changes since the last call
    ///
    /// Every participant and light is asked, so each one's flag is reset
    /// even when an earlier one already reported a change.
    pub fn take_changes(&mut self) -> ChangeFlags {
        let mut changes = std::mem::take(&mut self.pending);
        for participant in self.participants_mut() {
            if participant.take_changed() {
                changes |= ChangeFlags::CONTENT;
            }
        }
        for light in self.lights.values_mut() {
            if light.take_changed() {
                changes |= ChangeFlags::LIGHTS;
            }
        }
        changes
    }

    /// Let every visible participant contribute to the frame
    ///
    /// # Returns
    /// Number of participants asked
    pub fn contribute_all(&mut self, frame: &mut FrameContext<'_>) -> RenderResult<usize> {
        let mut asked = 0;
        for participant in self.participants_mut() {
            if participant.is_visible() {
                participant.contribute(frame)?;
                asked += 1;
            }
        }
        Ok(asked)
    }

    /// Lights that are switched on
    pub fn active_lights(&self) -> impl Iterator<Item = &HostLight> {
        self.lights.values().filter(|light| light.is_on())
    }

    /// Release backend objects of actors removed since the last call
    pub fn release_retired(&mut self, backend: &mut dyn RayBackend) {
        for mut actor in self.retired.drain(..) {
            actor.release(backend);
        }
    }

    /// Release the backend objects of every participant
    pub fn release_all(&mut self, backend: &mut dyn RayBackend) {
        self.release_retired(backend);
        for participant in self.participants_mut() {
            participant.release(backend);
        }
    }

    fn participants_mut(&mut self) -> impl Iterator<Item = &mut dyn SceneParticipant> {
        self.actors
            .values_mut()
            .map(|actor| actor as &mut dyn SceneParticipant)
            .chain(
                self.volumes
                    .values_mut()
                    .map(|volume| volume as &mut dyn SceneParticipant),
            )
    }
}
