//! Surface appearance of geometry actors
//!
//! Maps the host's surface property onto the backend's OBJ-style material
//! (`Kd`, `Ks`, `Ns`, `d`, optional `map_Kd`). Features the backend cannot
//! express are logged and ignored.

use crate::backend::{ObjectHandle, ObjectKind, Param, RayBackend};
use crate::foundation::collections::Revision;
use crate::foundation::math::Vec3;

use super::RenderResult;

/// How the host wants a surface drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Representation {
    /// Filled triangles
    #[default]
    Surface,
    /// Edges only
    Wireframe,
    /// Vertices only
    Points,
}

/// Surface property of a geometry actor
#[derive(Debug, Clone)]
pub struct SurfaceProperty {
    color: Vec3,
    diffuse: f32,
    specular: f32,
    specular_color: Vec3,
    specular_power: f32,
    opacity: f32,
    revision: Revision,
}

impl Default for SurfaceProperty {
    fn default() -> Self {
        Self {
            color: Vec3::new(1.0, 1.0, 1.0),
            diffuse: 1.0,
            specular: 0.0,
            specular_color: Vec3::new(1.0, 1.0, 1.0),
            specular_power: 1.0,
            opacity: 1.0,
            revision: Revision::new(),
        }
    }
}

impl SurfaceProperty {
    /// Diffuse-only property of the given color
    pub fn with_color(color: Vec3) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    /// Revision bumped by every setter
    pub const fn revision(&self) -> Revision {
        self.revision
    }

    /// Base color
    pub const fn color(&self) -> Vec3 {
        self.color
    }

    /// Opacity in `[0, 1]`
    pub const fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Set the base color
    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
        self.revision.bump();
    }

    /// Set the diffuse coefficient
    pub fn set_diffuse(&mut self, diffuse: f32) {
        self.diffuse = diffuse;
        self.revision.bump();
    }

    /// Set specular coefficient, color and exponent
    pub fn set_specular(&mut self, specular: f32, color: Vec3, power: f32) {
        self.specular = specular;
        self.specular_color = color;
        self.specular_power = power;
        self.revision.bump();
    }

    /// Set opacity, clamped to `[0, 1]`
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.revision.bump();
    }

    /// Backface properties are not supported by the backend
    pub fn set_backface_property(&mut self, _backface: &Self) {
        log::warn!("Backface properties are not supported by the ray-tracing backend; ignored");
    }

    /// Only filled surfaces are supported by the backend
    pub fn set_representation(&mut self, representation: Representation) {
        if representation != Representation::Surface {
            log::warn!("{representation:?} representation is not supported by the ray-tracing backend; ignored");
        }
    }

    /// Create and commit a backend material
    ///
    /// # Arguments
    /// * `texture` - Committed backend texture bound as the diffuse map
    pub fn to_backend_material(
        &self,
        backend: &mut dyn RayBackend,
        texture: Option<ObjectHandle>,
    ) -> RenderResult<ObjectHandle> {
        let material = backend.create(ObjectKind::Material)?;
        backend.set_param(material, "Kd", Param::Vec3(self.color * self.diffuse))?;
        backend.set_param(material, "Ks", Param::Vec3(self.specular_color * self.specular))?;
        backend.set_param(material, "Ns", Param::Float(self.specular_power))?;
        backend.set_param(material, "d", Param::Float(self.opacity))?;
        if let Some(texture) = texture {
            backend.set_param(material, "map_Kd", Param::Object(texture))?;
        }
        backend.commit(material)?;
        Ok(material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;

    #[test]
    fn test_material_parameters() {
        let mut backend = RecordingBackend::new();
        backend.initialize(0).expect("init");

        let mut property = SurfaceProperty::with_color(Vec3::new(1.0, 0.0, 0.0));
        property.set_diffuse(0.5);
        property.set_specular(0.25, Vec3::new(1.0, 1.0, 1.0), 20.0);
        property.set_opacity(2.0);

        let material = property.to_backend_material(&mut backend, None).expect("material");
        assert_eq!(backend.param(material, "Kd"), Some(&Param::Vec3(Vec3::new(0.5, 0.0, 0.0))));
        assert_eq!(backend.param(material, "Ks"), Some(&Param::Vec3(Vec3::new(0.25, 0.25, 0.25))));
        assert_eq!(backend.param(material, "Ns"), Some(&Param::Float(20.0)));
        assert_eq!(backend.param(material, "d"), Some(&Param::Float(1.0)));
        assert!(backend.param(material, "map_Kd").is_none());
    }

    #[test]
    fn test_unsupported_requests_do_not_change_revision() {
        let mut property = SurfaceProperty::default();
        let before = property.revision();
        property.set_backface_property(&SurfaceProperty::default());
        property.set_representation(Representation::Wireframe);
        assert_eq!(property.revision(), before);

        property.set_color(Vec3::new(0.0, 1.0, 0.0));
        assert!(property.revision() > before);
    }
}
