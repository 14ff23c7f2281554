//! Per-synchronizer frame bookkeeping
//!
//! `FrameState` holds everything the synchronizer remembers between frames:
//! the accumulation counter and its cap, the pending clear request, the frame
//! index, and the last image size, aspect ratio and camera pose used for
//! change detection.

use bitflags::bitflags;

use super::camera::CameraPose;

bitflags! {
    /// Reasons the accumulation buffer must be cleared
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChangeFlags: u32 {
        /// Camera pose moved
        const CAMERA = 1 << 0;
        /// Viewport aspect ratio changed
        const ASPECT = 1 << 1;
        /// Frame buffer reallocated
        const RESIZE = 1 << 2;
        /// Geometry, material or volume appearance changed
        const CONTENT = 1 << 3;
        /// A light changed or was added/removed
        const LIGHTS = 1 << 4;
        /// Renderer settings changed
        const SETTINGS = 1 << 5;
        /// Explicit clear request
        const REQUESTED = 1 << 6;
    }
}

/// Phases of one synchronized frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    /// Between frames
    #[default]
    Idle,
    /// Accumulation decision, container rebuild, camera orientation
    PreparingFrame,
    /// Participants and lights register into the containers
    GeometrySubmission,
    /// The backend renders one pass
    BackendRender,
    /// Color and depth are copied to the display surface
    PixelReadback,
}

/// Mutable per-renderer frame state
#[derive(Debug, Clone)]
pub struct FrameState {
    accumulation: u32,
    max_accumulation: u32,
    has_volume: bool,
    clear_requested: bool,
    frame_index: u64,
    image_size: (u32, u32),
    aspect: Option<f32>,
    pose: Option<CameraPose>,
}

impl FrameState {
    /// Create state for a synchronizer that has never rendered
    ///
    /// A clear is pending so the first frame starts from an empty buffer.
    pub fn new(max_accumulation: u32) -> Self {
        Self {
            accumulation: 0,
            max_accumulation: max_accumulation.max(1),
            has_volume: false,
            clear_requested: true,
            frame_index: 0,
            image_size: (0, 0),
            aspect: None,
            pose: None,
        }
    }

    /// Passes accumulated since the last clear
    pub const fn accumulation(&self) -> u32 {
        self.accumulation
    }

    /// Accumulation cap
    pub const fn max_accumulation(&self) -> u32 {
        self.max_accumulation
    }

    /// Change the accumulation cap
    pub fn set_max_accumulation(&mut self, max_accumulation: u32) {
        self.max_accumulation = max_accumulation.max(1);
    }

    /// Completed frames
    pub const fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Whether the last submission contained volume content
    pub const fn has_volume(&self) -> bool {
        self.has_volume
    }

    /// Image size of the current frame buffer
    pub const fn image_size(&self) -> (u32, u32) {
        self.image_size
    }

    /// Whether a clear is waiting for the next prepare
    pub const fn clear_requested(&self) -> bool {
        self.clear_requested
    }

    /// Ask for the accumulation buffer to be cleared on the next frame
    pub fn request_clear(&mut self) {
        self.clear_requested = true;
    }

    /// Whether the current image has reached the accumulation cap
    pub const fn is_converged(&self) -> bool {
        self.accumulation >= self.max_accumulation
    }

    /// Compare the camera pose against the last frame and remember it
    pub(crate) fn observe_pose(&mut self, pose: CameraPose) -> ChangeFlags {
        if self.pose.as_ref() == Some(&pose) {
            ChangeFlags::empty()
        } else {
            self.pose = Some(pose);
            ChangeFlags::CAMERA
        }
    }

    /// Compare the aspect ratio against the last frame and remember it
    pub(crate) fn observe_aspect(&mut self, aspect: Option<f32>) -> ChangeFlags {
        let Some(aspect) = aspect else {
            return ChangeFlags::empty();
        };
        if self.aspect.is_some_and(|last| (last - aspect).abs() <= f32::EPSILON) {
            ChangeFlags::empty()
        } else {
            self.aspect = Some(aspect);
            ChangeFlags::ASPECT
        }
    }

    /// Remember a new frame buffer size
    pub(crate) fn observe_size(&mut self, size: (u32, u32)) -> ChangeFlags {
        if self.image_size == size {
            ChangeFlags::empty()
        } else {
            self.image_size = size;
            ChangeFlags::RESIZE
        }
    }

    /// Decide whether this frame starts a new accumulation sequence
    pub(crate) fn should_clear(&self, changes: ChangeFlags, progressive: bool) -> bool {
        !progressive || self.clear_requested || !changes.is_empty()
    }

    /// Reset the counter after the backend buffer has been cleared
    pub(crate) fn reset_accumulation(&mut self) {
        self.accumulation = 0;
        self.clear_requested = false;
    }

    pub(crate) fn set_has_volume(&mut self, has_volume: bool) {
        self.has_volume = has_volume;
    }

    /// Count one finished render pass
    pub(crate) fn record_pass(&mut self) {
        self.accumulation = self.accumulation.saturating_add(1);
    }

    pub(crate) fn finish_frame(&mut self) {
        self.frame_index += 1;
    }
}
