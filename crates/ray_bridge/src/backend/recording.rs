//! In-memory reference backend
//!
//! `RecordingBackend` implements the full `RayBackend` contract without a
//! native library: it stores every object with its pending and committed
//! parameters, enforces the create/set/commit discipline, and produces a
//! deterministic image so frame pacing and read back can be observed.

use std::collections::HashMap;

use slotmap::SlotMap;

use super::render::{
    BackendResult, FrameBufferChannels, ObjectHandle, ObjectKind, Param, RayBackend, RendererType,
};
use crate::render::RenderError;

/// Counters of backend traffic
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendStats {
    /// Objects created through `create`
    pub objects_created: u64,
    /// Successful commits
    pub commits: u64,
    /// Render passes
    pub render_calls: u64,
    /// Frame buffers allocated
    pub frame_buffers_created: u64,
    /// Frame buffer clear requests
    pub frame_buffer_clears: u64,
    /// Whole-array voxel uploads (`voxelData` parameter sets)
    pub voxel_uploads: u64,
    /// Region copies into volumes
    pub region_uploads: u64,
    /// Renderer type used by the most recent pass
    pub last_renderer: Option<RendererType>,
}

/// A backend object as the recording backend sees it
#[derive(Debug, Clone)]
pub struct RecordedObject {
    /// Object kind
    pub kind: ObjectKind,
    /// Objects added through `add_to_model`
    pub children: Vec<ObjectHandle>,
    /// Number of commits
    pub commit_count: u32,
    pending: HashMap<String, Option<Param>>,
    committed: HashMap<String, Param>,
    voxels: Vec<f32>,
}

impl RecordedObject {
    fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            commit_count: 0,
            pending: HashMap::new(),
            committed: HashMap::new(),
            voxels: Vec::new(),
        }
    }

    /// Committed value of a parameter
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.committed.get(name)
    }

    /// Whether uncommitted changes are waiting
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Latest value including uncommitted changes
    fn latest(&self, name: &str) -> Option<&Param> {
        match self.pending.get(name) {
            Some(value) => value.as_ref(),
            None => self.committed.get(name),
        }
    }
}

#[derive(Debug, Clone)]
struct FrameBufferState {
    width: u32,
    height: u32,
    channels: FrameBufferChannels,
    color: Vec<u8>,
    depth: Vec<f32>,
    accumulated: u32,
}

#[derive(Debug, Clone)]
enum Slot {
    Object(RecordedObject),
    FrameBuffer(FrameBufferState),
}

/// Reference backend that records everything it is asked to do
#[derive(Debug, Default)]
pub struct RecordingBackend {
    slots: SlotMap<ObjectHandle, Slot>,
    stats: BackendStats,
    initialized: bool,
    fail_initialization: bool,
    threads: usize,
}

impl RecordingBackend {
    /// Create an uninitialized backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend whose `initialize` always fails
    pub fn failing() -> Self {
        Self {
            fail_initialization: true,
            ..Self::default()
        }
    }

    /// Traffic counters
    pub const fn stats(&self) -> &BackendStats {
        &self.stats
    }

    /// Worker count requested at initialization
    pub const fn threads(&self) -> usize {
        self.threads
    }

    /// Look up a live object
    pub fn object(&self, handle: ObjectHandle) -> Option<&RecordedObject> {
        match self.slots.get(handle)? {
            Slot::Object(object) => Some(object),
            Slot::FrameBuffer(_) => None,
        }
    }

    /// Committed value of a parameter
    pub fn param(&self, handle: ObjectHandle, name: &str) -> Option<&Param> {
        self.object(handle)?.param(name)
    }

    /// Objects added to a model
    pub fn children(&self, model: ObjectHandle) -> &[ObjectHandle] {
        self.object(model).map_or(&[][..], |object| object.children.as_slice())
    }

    /// Whether a handle still refers to a live object or frame buffer
    pub fn is_alive(&self, handle: ObjectHandle) -> bool {
        self.slots.contains_key(handle)
    }

    /// Number of live objects of a kind
    pub fn live_count(&self, kind: ObjectKind) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Object(object) if object.kind == kind))
            .count()
    }

    /// Number of live frame buffers
    pub fn live_frame_buffers(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::FrameBuffer(_)))
            .count()
    }

    /// Voxels currently held by a volume, from either upload path
    pub fn voxels(&self, volume: ObjectHandle) -> Option<&[f32]> {
        let object = self.object(volume)?;
        if !object.voxels.is_empty() {
            return Some(object.voxels.as_slice());
        }
        match object.param("voxelData") {
            Some(Param::FloatArray(data)) => Some(data.as_slice()),
            _ => None,
        }
    }

    /// Size of a frame buffer
    pub fn frame_buffer_size(&self, frame_buffer: ObjectHandle) -> Option<(u32, u32)> {
        match self.slots.get(frame_buffer)? {
            Slot::FrameBuffer(fb) => Some((fb.width, fb.height)),
            Slot::Object(_) => None,
        }
    }

    /// Passes accumulated since the last accumulation clear
    pub fn accumulated_passes(&self, frame_buffer: ObjectHandle) -> Option<u32> {
        match self.slots.get(frame_buffer)? {
            Slot::FrameBuffer(fb) => Some(fb.accumulated),
            Slot::Object(_) => None,
        }
    }

    fn ensure_initialized(&self) -> BackendResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(RenderError::BackendError("device not initialized".to_string()))
        }
    }

    fn object_mut(&mut self, handle: ObjectHandle) -> BackendResult<&mut RecordedObject> {
        match self.slots.get_mut(handle) {
            Some(Slot::Object(object)) => Ok(object),
            _ => Err(RenderError::InvalidHandle(format!("{handle:?}"))),
        }
    }

    fn frame_buffer(&self, handle: ObjectHandle) -> BackendResult<&FrameBufferState> {
        match self.slots.get(handle) {
            Some(Slot::FrameBuffer(fb)) => Ok(fb),
            _ => Err(RenderError::InvalidHandle(format!("{handle:?}"))),
        }
    }

    fn committed_object(&self, owner: &RecordedObject, name: &str) -> Option<&RecordedObject> {
        match owner.param(name)? {
            Param::Object(handle) => self.object(*handle),
            _ => None,
        }
    }

    /// Number of things a renderer would hit, and the camera distance to the origin
    fn scene_summary(&self, renderer: &RecordedObject) -> (usize, f32) {
        let mut hits = self
            .committed_object(renderer, "model")
            .map_or(0, |model| model.children.len());
        if renderer.kind == ObjectKind::Renderer(RendererType::Volume) {
            hits += self
                .committed_object(renderer, "volumeModel")
                .map_or(0, |model| model.children.len());
        }
        let distance = match self
            .committed_object(renderer, "camera")
            .and_then(|camera| camera.param("pos"))
        {
            Some(Param::Vec3(pos)) => pos.norm(),
            _ => 1.0,
        };
        (hits, distance)
    }
}

impl RayBackend for RecordingBackend {
    fn initialize(&mut self, num_threads: usize) -> BackendResult<()> {
        if self.fail_initialization {
            return Err(RenderError::InitializationFailed(
                "recording backend configured to fail".to_string(),
            ));
        }
        self.initialized = true;
        self.threads = num_threads;
        log::debug!("Recording backend initialized with {num_threads} threads");
        Ok(())
    }

    fn create(&mut self, kind: ObjectKind) -> BackendResult<ObjectHandle> {
        self.ensure_initialized()?;
        self.stats.objects_created += 1;
        Ok(self.slots.insert(Slot::Object(RecordedObject::new(kind))))
    }

    fn set_param(&mut self, handle: ObjectHandle, name: &str, value: Param) -> BackendResult<()> {
        let object = self.object_mut(handle)?;
        object.pending.insert(name.to_string(), Some(value));
        if name == "voxelData" {
            self.stats.voxel_uploads += 1;
        }
        Ok(())
    }

    fn remove_param(&mut self, handle: ObjectHandle, name: &str) -> BackendResult<()> {
        let object = self.object_mut(handle)?;
        object.pending.insert(name.to_string(), None);
        Ok(())
    }

    fn commit(&mut self, handle: ObjectHandle) -> BackendResult<()> {
        let object = self.object_mut(handle)?;
        for (name, value) in object.pending.drain() {
            match value {
                Some(value) => {
                    object.committed.insert(name, value);
                }
                None => {
                    object.committed.remove(&name);
                }
            }
        }
        object.commit_count += 1;
        self.stats.commits += 1;
        Ok(())
    }

    fn release(&mut self, handle: ObjectHandle) {
        let Some(slot) = self.slots.remove(handle) else {
            return;
        };
        if let Slot::Object(object) = slot {
            if object.kind == ObjectKind::Model {
                let owned: Vec<_> = object
                    .children
                    .into_iter()
                    .filter(|child| {
                        self.object(*child)
                            .is_some_and(|c| c.kind == ObjectKind::Instance)
                    })
                    .collect();
                for child in owned {
                    self.release(child);
                }
            }
        }
    }

    fn add_to_model(&mut self, model: ObjectHandle, object: ObjectHandle) -> BackendResult<()> {
        let child_kind = self
            .object(object)
            .map(|o| o.kind)
            .ok_or_else(|| RenderError::InvalidHandle(format!("{object:?}")))?;
        if !matches!(
            child_kind,
            ObjectKind::Triangles | ObjectKind::Instance | ObjectKind::Volume
        ) {
            return Err(RenderError::RenderingFailed(format!(
                "{child_kind:?} cannot be added to a model"
            )));
        }
        let container = self.object_mut(model)?;
        if container.kind != ObjectKind::Model {
            return Err(RenderError::RenderingFailed(format!(
                "{:?} is not a model",
                container.kind
            )));
        }
        container.children.push(object);
        Ok(())
    }

    fn set_region(
        &mut self,
        volume: ObjectHandle,
        data: &[f32],
        offset: [usize; 3],
        count: [usize; 3],
    ) -> BackendResult<()> {
        let object = self.object_mut(volume)?;
        if object.kind != ObjectKind::Volume {
            return Err(RenderError::RenderingFailed("region upload into non-volume".to_string()));
        }
        let dims = match object.latest("dimensions") {
            Some(Param::Int3(d)) => d.map(|v| usize::try_from(v).unwrap_or(0)),
            _ => {
                return Err(RenderError::RenderingFailed(
                    "volume dimensions must be set before region uploads".to_string(),
                ))
            }
        };
        let expected = count[0] * count[1] * count[2];
        if data.len() != expected || (0..3).any(|axis| offset[axis] + count[axis] > dims[axis]) {
            return Err(RenderError::RenderingFailed(format!(
                "region {offset:?}+{count:?} does not fit volume {dims:?} with {} voxels",
                data.len()
            )));
        }
        let total = dims[0] * dims[1] * dims[2];
        if object.voxels.len() != total {
            object.voxels = vec![0.0; total];
        }
        for z in 0..count[2] {
            for y in 0..count[1] {
                let src = (z * count[1] + y) * count[0];
                let dst = ((offset[2] + z) * dims[1] + offset[1] + y) * dims[0] + offset[0];
                object.voxels[dst..dst + count[0]].copy_from_slice(&data[src..src + count[0]]);
            }
        }
        self.stats.region_uploads += 1;
        Ok(())
    }

    fn create_frame_buffer(
        &mut self,
        width: u32,
        height: u32,
        channels: FrameBufferChannels,
    ) -> BackendResult<ObjectHandle> {
        self.ensure_initialized()?;
        if width == 0 || height == 0 {
            return Err(RenderError::ResourceCreationFailed(format!(
                "frame buffer of {width}x{height}"
            )));
        }
        let pixels = width as usize * height as usize;
        let depth = if channels.contains(FrameBufferChannels::DEPTH) {
            vec![f32::INFINITY; pixels]
        } else {
            Vec::new()
        };
        self.stats.frame_buffers_created += 1;
        Ok(self.slots.insert(Slot::FrameBuffer(FrameBufferState {
            width,
            height,
            channels,
            color: vec![0; pixels * 4],
            depth,
            accumulated: 0,
        })))
    }

    fn clear_frame_buffer(
        &mut self,
        frame_buffer: ObjectHandle,
        channels: FrameBufferChannels,
    ) -> BackendResult<()> {
        let Some(Slot::FrameBuffer(fb)) = self.slots.get_mut(frame_buffer) else {
            return Err(RenderError::InvalidHandle(format!("{frame_buffer:?}")));
        };
        if channels.contains(FrameBufferChannels::COLOR) {
            fb.color.fill(0);
        }
        if channels.contains(FrameBufferChannels::DEPTH) {
            fb.depth.fill(f32::INFINITY);
        }
        if channels.contains(FrameBufferChannels::ACCUM) {
            fb.accumulated = 0;
        }
        self.stats.frame_buffer_clears += 1;
        Ok(())
    }

    fn render_frame(
        &mut self,
        frame_buffer: ObjectHandle,
        renderer: ObjectHandle,
        channels: FrameBufferChannels,
    ) -> BackendResult<f32> {
        let renderer_object = self
            .object(renderer)
            .ok_or_else(|| RenderError::InvalidHandle(format!("{renderer:?}")))?;
        let ObjectKind::Renderer(renderer_type) = renderer_object.kind else {
            return Err(RenderError::RenderingFailed(format!(
                "{:?} is not a renderer",
                renderer_object.kind
            )));
        };
        if renderer_object.commit_count == 0 {
            return Err(RenderError::RenderingFailed("renderer was never committed".to_string()));
        }
        let background = match renderer_object.param("bgColor") {
            Some(Param::Vec4(c)) => [c.x, c.y, c.z, c.w],
            _ => [0.0, 0.0, 0.0, 1.0],
        };
        let (hits, distance) = self.scene_summary(renderer_object);

        let Some(Slot::FrameBuffer(fb)) = self.slots.get_mut(frame_buffer) else {
            return Err(RenderError::InvalidHandle(format!("{frame_buffer:?}")));
        };
        let texel = if hits == 0 {
            background.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
        } else {
            let shade = 55 + (40 * hits).min(200) as u8;
            [shade, shade, shade, 255]
        };
        for pixel in fb.color.chunks_exact_mut(4) {
            pixel.copy_from_slice(&texel);
        }
        if fb.channels.contains(FrameBufferChannels::DEPTH) {
            let depth = if hits == 0 { f32::INFINITY } else { distance };
            fb.depth.fill(depth);
        }
        if channels.contains(FrameBufferChannels::ACCUM) {
            fb.accumulated += 1;
        } else {
            fb.accumulated = 1;
        }
        let variance = 1.0 / fb.accumulated as f32;

        self.stats.render_calls += 1;
        self.stats.last_renderer = Some(renderer_type);
        Ok(variance)
    }

    fn map_color(&self, frame_buffer: ObjectHandle) -> BackendResult<&[u8]> {
        Ok(self.frame_buffer(frame_buffer)?.color.as_slice())
    }

    fn map_depth(&self, frame_buffer: ObjectHandle) -> BackendResult<&[f32]> {
        let fb = self.frame_buffer(frame_buffer)?;
        if fb.channels.contains(FrameBufferChannels::DEPTH) {
            Ok(fb.depth.as_slice())
        } else {
            Err(RenderError::RenderingFailed("frame buffer has no depth channel".to_string()))
        }
    }
}
