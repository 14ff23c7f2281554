//! Geometry actors
//!
//! A `GeometryActor` keeps one persistent backend model per mesh revision and
//! places it into every frame through a fresh [`Renderable`]. Property and
//! texture changes only rebuild the material; a new mesh rebuilds the
//! geometry and its model.

use crate::backend::{ObjectHandle, ObjectKind, Param, RayBackend};
use crate::foundation::collections::Revision;
use crate::foundation::math::{Transform, Vec2, Vec3, Vec4};

use super::material::SurfaceProperty;
use super::participant::{FrameContext, Renderable, SceneParticipant};
use super::texture::Texture;
use super::RenderResult;

/// Indexed triangle mesh with optional per-vertex attributes
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    /// Vertex positions
    pub vertices: Vec<Vec3>,
    /// Triangle vertex indices
    pub indices: Vec<[u32; 3]>,
    /// Per-vertex normals
    pub normals: Option<Vec<Vec3>>,
    /// Per-vertex RGBA colors, overriding the material color
    pub colors: Option<Vec<Vec4>>,
    /// Per-vertex texture coordinates
    pub texcoords: Option<Vec<Vec2>>,
}

impl TriangleMesh {
    /// Mesh from positions and indices only
    pub fn new(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            indices,
            ..Self::default()
        }
    }

    /// Whether there is anything to draw
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    fn upload(&self, backend: &mut dyn RayBackend, material: ObjectHandle) -> RenderResult<ObjectHandle> {
        let geometry = backend.create(ObjectKind::Triangles)?;
        backend.set_param(geometry, "vertex", Param::Vec3Array(self.vertices.clone()))?;
        backend.set_param(geometry, "index", Param::IndexArray(self.indices.clone()))?;
        if let Some(normals) = &self.normals {
            backend.set_param(geometry, "vertex.normal", Param::Vec3Array(normals.clone()))?;
        }
        if let Some(colors) = &self.colors {
            backend.set_param(geometry, "vertex.color", Param::Vec4Array(colors.clone()))?;
        }
        if let Some(texcoords) = &self.texcoords {
            backend.set_param(geometry, "vertex.texcoord", Param::Vec2Array(texcoords.clone()))?;
        }
        backend.set_param(geometry, "material", Param::Object(material))?;
        backend.commit(geometry)?;
        Ok(geometry)
    }
}

/// Binding counter of the actor plus the bound texture's own revision
type TextureState = (Revision, Option<Revision>);

/// Backend objects built from one set of revisions
#[derive(Debug, Clone)]
struct BuiltModel {
    model: ObjectHandle,
    geometry: ObjectHandle,
    material: ObjectHandle,
    texture: Option<ObjectHandle>,
    mesh_revision: Revision,
    property_revision: Revision,
    texture_state: TextureState,
}

/// Surface geometry owned by the host scene
#[derive(Debug, Clone)]
pub struct GeometryActor {
    mesh: TriangleMesh,
    mesh_revision: Revision,
    property: SurfaceProperty,
    texture: Option<Texture>,
    texture_binding: Revision,
    transform: Transform,
    visible: bool,
    moved: bool,
    observed: Option<(Revision, Revision, TextureState)>,
    built: Option<BuiltModel>,
    last_renderable: Option<Renderable>,
    reported_empty: bool,
}

impl GeometryActor {
    /// Actor drawing `mesh` with `property`
    pub fn new(mesh: TriangleMesh, property: SurfaceProperty) -> Self {
        Self {
            mesh,
            mesh_revision: Revision::new(),
            property,
            texture: None,
            texture_binding: Revision::new(),
            transform: Transform::identity(),
            visible: true,
            moved: false,
            observed: None,
            built: None,
            last_renderable: None,
            reported_empty: false,
        }
    }

    /// Current mesh
    pub const fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    /// Replace the mesh
    pub fn set_mesh(&mut self, mesh: TriangleMesh) {
        self.mesh = mesh;
        self.mesh_revision.bump();
        self.reported_empty = false;
    }

    /// Surface property
    pub const fn property(&self) -> &SurfaceProperty {
        &self.property
    }

    /// Mutable surface property; edits are picked up through its revision
    pub fn property_mut(&mut self) -> &mut SurfaceProperty {
        &mut self.property
    }

    /// Bind or unbind a diffuse texture
    pub fn set_texture(&mut self, texture: Option<Texture>) {
        self.texture = texture;
        self.texture_binding.bump();
    }

    /// Mutable texture, if bound
    pub fn texture_mut(&mut self) -> Option<&mut Texture> {
        self.texture.as_mut()
    }

    /// Placement of the actor
    pub const fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Move the actor
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.moved = true;
    }

    /// Show or hide the actor
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.moved = true;
        }
    }

    /// Renderable submitted in the most recent frame
    pub const fn last_renderable(&self) -> Option<Renderable> {
        self.last_renderable
    }

    /// Persistent backend model, once built
    pub fn backend_model(&self) -> Option<ObjectHandle> {
        self.built.as_ref().map(|built| built.model)
    }

    fn texture_state(&self) -> TextureState {
        (self.texture_binding, self.texture.as_ref().map(Texture::revision))
    }

    fn revisions(&self) -> (Revision, Revision, TextureState) {
        (self.mesh_revision, self.property.revision(), self.texture_state())
    }

    /// Bring the persistent model up to date, rebuilding only stale parts
    fn sync_model(&mut self, backend: &mut dyn RayBackend) -> RenderResult<ObjectHandle> {
        let texture_state = self.texture_state();

        if let Some(built) = self.built.as_mut() {
            if built.mesh_revision == self.mesh_revision {
                let texture_stale = built.texture_state != texture_state;
                if texture_stale {
                    if let Some(old) = built.texture.take() {
                        backend.release(old);
                    }
                    built.texture = match &self.texture {
                        Some(texture) => Some(texture.upload(backend)?),
                        None => None,
                    };
                    built.texture_state = texture_state;
                }
                if texture_stale || built.property_revision != self.property.revision() {
                    backend.release(built.material);
                    built.material = self.property.to_backend_material(backend, built.texture)?;
                    built.property_revision = self.property.revision();
                    backend.set_param(built.geometry, "material", Param::Object(built.material))?;
                    backend.commit(built.geometry)?;
                    backend.commit(built.model)?;
                    log::debug!("Rebuilt material for geometry actor");
                }
                return Ok(built.model);
            }
        }

        self.release_model(backend);
        let texture = match &self.texture {
            Some(texture) => Some(texture.upload(backend)?),
            None => None,
        };
        let material = self.property.to_backend_material(backend, texture)?;
        let geometry = self.mesh.upload(backend, material)?;
        let model = backend.create(ObjectKind::Model)?;
        backend.add_to_model(model, geometry)?;
        backend.commit(model)?;
        log::debug!(
            "Built geometry model: {} vertices, {} triangles",
            self.mesh.vertices.len(),
            self.mesh.indices.len()
        );

        self.built = Some(BuiltModel {
            model,
            geometry,
            material,
            texture,
            mesh_revision: self.mesh_revision,
            property_revision: self.property.revision(),
            texture_state,
        });
        Ok(model)
    }

    fn release_model(&mut self, backend: &mut dyn RayBackend) {
        if let Some(built) = self.built.take() {
            backend.release(built.model);
            backend.release(built.geometry);
            backend.release(built.material);
            if let Some(texture) = built.texture {
                backend.release(texture);
            }
        }
    }
}

impl SceneParticipant for GeometryActor {
    fn is_visible(&self) -> bool {
        self.visible
    }

    fn take_changed(&mut self) -> bool {
        let now = self.revisions();
        let changed = std::mem::take(&mut self.moved) || self.observed != Some(now);
        self.observed = Some(now);
        changed
    }

    fn contribute(&mut self, frame: &mut FrameContext<'_>) -> RenderResult<()> {
        self.last_renderable = None;
        if self.mesh.is_empty() {
            if !self.reported_empty {
                log::error!("Geometry actor has no triangles; nothing submitted");
                self.reported_empty = true;
            }
            return Ok(());
        }
        let model = self.sync_model(&mut *frame.backend)?;
        let renderable = Renderable::register(frame, model, &self.transform.to_matrix())?;
        self.last_renderable = Some(renderable);
        Ok(())
    }

    fn release(&mut self, backend: &mut dyn RayBackend) {
        self.release_model(backend);
        self.last_renderable = None;
    }
}
