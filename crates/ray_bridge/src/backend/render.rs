//! # Ray Backend Abstraction
//!
//! This module defines the `RayBackend` trait: the fixed object/parameter API
//! of the ray-tracing library the bridge drives. Objects are created, mutated
//! through named-parameter setters, then explicitly committed before a render
//! call can see them.
//!
//! ## Object Model
//!
//! - **Models**: containers of geometry, instances and volumes
//! - **Renderers**: one surface renderer and one volume renderer per context
//! - **Frame buffers**: sized color/depth/accumulation targets
//!
//! Handles are opaque [`ObjectHandle`] keys; only the backend that issued a
//! handle can interpret it.

use bitflags::bitflags;
use slotmap::new_key_type;

use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};
use crate::render::RenderError;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

new_key_type! {
    /// Opaque reference to a backend object
    pub struct ObjectHandle;
}

/// Which renderer implementation a renderer object uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererType {
    /// Surface renderer; supports ambient occlusion and shadows
    Surface,
    /// Volume ray-cast renderer
    Volume,
}

/// Light flavours the bridge creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    /// Light from a direction, no position
    Directional,
    /// Positional light
    Point,
    /// Uniform ambient term
    Ambient,
}

/// Kinds of backend objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Container of geometry, instances and volumes
    Model,
    /// Perspective camera
    Camera,
    /// Renderer of the given type
    Renderer(RendererType),
    /// Light source
    Light(LightKind),
    /// Surface material
    Material,
    /// 2D texture
    Texture,
    /// Triangle mesh geometry
    Triangles,
    /// Placement of a model inside another model
    Instance,
    /// Structured scalar volume
    Volume,
    /// Color/opacity lookup table for volumes
    TransferFunction,
}

/// A named-parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i32),
    /// Integer triple (dimensions)
    Int3([i32; 3]),
    /// Scalar
    Float(f32),
    /// 2-vector (ranges)
    Vec2(Vec2),
    /// 3-vector (positions, directions, colors)
    Vec3(Vec3),
    /// 4-vector (RGBA colors)
    Vec4(Vec4),
    /// Affine transform
    Mat4(Mat4),
    /// String value
    Str(String),
    /// Reference to another object
    Object(ObjectHandle),
    /// List of objects
    ObjectList(Vec<ObjectHandle>),
    /// Scalar array
    FloatArray(Vec<f32>),
    /// Texture coordinate array
    Vec2Array(Vec<Vec2>),
    /// Vector array
    Vec3Array(Vec<Vec3>),
    /// RGBA array
    Vec4Array(Vec<Vec4>),
    /// Triangle index array
    IndexArray(Vec<[u32; 3]>),
    /// Raw bytes (texture texels)
    Bytes(Vec<u8>),
}

bitflags! {
    /// Channels of a frame buffer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FrameBufferChannels: u32 {
        /// RGBA8 color
        const COLOR = 1 << 0;
        /// Per-pixel hit distance
        const DEPTH = 1 << 1;
        /// Accumulation buffer for progressive refinement
        const ACCUM = 1 << 2;
    }
}

/// # Ray Backend Trait
///
/// Every call is synchronous. `render_frame` blocks until the pass has
/// finished; the backend may parallelize internally.
pub trait RayBackend {
    /// Initialize the device
    ///
    /// # Arguments
    /// * `num_threads` - Worker count for the backend, 0 for its default
    fn initialize(&mut self, num_threads: usize) -> BackendResult<()>;

    /// Create a new object of the given kind
    fn create(&mut self, kind: ObjectKind) -> BackendResult<ObjectHandle>;

    /// Set a named parameter; takes effect on the next `commit`
    fn set_param(&mut self, handle: ObjectHandle, name: &str, value: Param) -> BackendResult<()>;

    /// Remove a named parameter; takes effect on the next `commit`
    fn remove_param(&mut self, handle: ObjectHandle, name: &str) -> BackendResult<()>;

    /// Finalize pending parameter changes
    fn commit(&mut self, handle: ObjectHandle) -> BackendResult<()>;

    /// Drop the caller's reference to an object
    ///
    /// Releasing a model also releases the instances it owns. Unknown handles
    /// are ignored.
    fn release(&mut self, handle: ObjectHandle);

    /// Add a geometry, instance or volume to a model
    fn add_to_model(&mut self, model: ObjectHandle, object: ObjectHandle) -> BackendResult<()>;

    /// Copy a brick of voxels into a volume
    ///
    /// # Arguments
    /// * `volume` - Target volume; its `dimensions` must already be set
    /// * `data` - `count[0] * count[1] * count[2]` voxels, x fastest
    /// * `offset` - Voxel index of the brick's lower corner
    /// * `count` - Brick extent in voxels
    fn set_region(
        &mut self,
        volume: ObjectHandle,
        data: &[f32],
        offset: [usize; 3],
        count: [usize; 3],
    ) -> BackendResult<()>;

    /// Allocate a frame buffer
    fn create_frame_buffer(
        &mut self,
        width: u32,
        height: u32,
        channels: FrameBufferChannels,
    ) -> BackendResult<ObjectHandle>;

    /// Clear the given channels of a frame buffer
    fn clear_frame_buffer(
        &mut self,
        frame_buffer: ObjectHandle,
        channels: FrameBufferChannels,
    ) -> BackendResult<()>;

    /// Render one pass into a frame buffer
    ///
    /// # Returns
    /// Estimated variance of the accumulated image
    fn render_frame(
        &mut self,
        frame_buffer: ObjectHandle,
        renderer: ObjectHandle,
        channels: FrameBufferChannels,
    ) -> BackendResult<f32>;

    /// Map the color channel as tightly packed RGBA8
    fn map_color(&self, frame_buffer: ObjectHandle) -> BackendResult<&[u8]>;

    /// Map the depth channel as per-pixel hit distances
    fn map_depth(&self, frame_buffer: ObjectHandle) -> BackendResult<&[f32]>;
}
