//! Host lights and their backend counterparts
//!
//! Lights are cheap, so the bridge recreates every backend light each frame
//! and attaches the list to both renderers. A positional host light becomes a
//! point light; anything else becomes a directional light shining from the
//! light's position towards its focal point.

use crate::backend::{LightKind, ObjectHandle, ObjectKind, Param, RayBackend};
use crate::foundation::math::Vec3;

use super::RenderResult;

/// Anything that can be turned into a backend light
pub trait SceneLight {
    /// Whether the light contributes this frame
    fn is_on(&self) -> bool;

    /// Report and reset whether the light changed since the last call
    fn take_changed(&mut self) -> bool;

    /// Create and commit a backend light for this frame
    fn to_backend_light(&self, backend: &mut dyn RayBackend) -> RenderResult<ObjectHandle>;
}

/// Light source owned by the host scene
#[derive(Debug, Clone)]
pub struct HostLight {
    color: Vec3,
    intensity: f32,
    position: Vec3,
    focal_point: Vec3,
    positional: bool,
    switched_on: bool,
    changed: bool,
}

impl Default for HostLight {
    fn default() -> Self {
        Self {
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            position: Vec3::new(0.0, 0.0, 1.0),
            focal_point: Vec3::zeros(),
            positional: false,
            switched_on: true,
            changed: true,
        }
    }
}

impl HostLight {
    /// Directional light shining from `position` towards `focal_point`
    pub fn directional(position: Vec3, focal_point: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            color,
            intensity,
            position,
            focal_point,
            ..Self::default()
        }
    }

    /// Positional light at `position`
    pub fn positional(position: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            color,
            intensity,
            position,
            positional: true,
            ..Self::default()
        }
    }

    /// Light color
    pub const fn color(&self) -> Vec3 {
        self.color
    }

    /// Light intensity
    pub const fn intensity(&self) -> f32 {
        self.intensity
    }

    /// Whether the light is positional
    pub const fn is_positional(&self) -> bool {
        self.positional
    }

    /// Change the light color
    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
        self.changed = true;
    }

    /// Change the intensity
    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity;
        self.changed = true;
    }

    /// Move the light
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.changed = true;
    }

    /// Change where a directional light points
    pub fn set_focal_point(&mut self, focal_point: Vec3) {
        self.focal_point = focal_point;
        self.changed = true;
    }

    /// Switch between positional and directional
    pub fn set_positional(&mut self, positional: bool) {
        self.positional = positional;
        self.changed = true;
    }

    /// Switch the light on or off
    pub fn set_switch(&mut self, on: bool) {
        self.switched_on = on;
        self.changed = true;
    }

    /// Direction light travels, from position towards focal point
    pub fn direction(&self) -> Vec3 {
        (self.focal_point - self.position)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(|| Vec3::new(0.0, 0.0, -1.0))
    }
}

impl SceneLight for HostLight {
    fn is_on(&self) -> bool {
        self.switched_on
    }

    fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn to_backend_light(&self, backend: &mut dyn RayBackend) -> RenderResult<ObjectHandle> {
        let light = if self.positional {
            let light = backend.create(ObjectKind::Light(LightKind::Point))?;
            backend.set_param(light, "position", Param::Vec3(self.position))?;
            light
        } else {
            let light = backend.create(ObjectKind::Light(LightKind::Directional))?;
            backend.set_param(light, "direction", Param::Vec3(self.direction()))?;
            light
        };
        backend.set_param(light, "color", Param::Vec3(self.color))?;
        backend.set_param(light, "intensity", Param::Float(self.intensity))?;
        backend.commit(light)?;
        Ok(light)
    }
}

/// Create the uniform ambient light every frame carries
pub fn ambient_light(backend: &mut dyn RayBackend, intensity: f32) -> RenderResult<ObjectHandle> {
    let light = backend.create(ObjectKind::Light(LightKind::Ambient))?;
    backend.set_param(light, "color", Param::Vec3(Vec3::new(1.0, 1.0, 1.0)))?;
    backend.set_param(light, "intensity", Param::Float(intensity))?;
    backend.commit(light)?;
    Ok(light)
}
