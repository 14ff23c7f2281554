//! # Frame Synchronizer
//!
//! Drives one frame through four phases:
//!
//! 1. **PreparingFrame**: gather changes, (re)allocate the frame buffer,
//!    clear accumulation when needed, create fresh containers, orient the
//!    backend camera
//! 2. **GeometrySubmission**: visible participants contribute, lights are
//!    recreated and bound
//! 3. **BackendRender**: one accumulation pass with the volume or surface
//!    renderer
//! 4. **PixelReadback**: color, and optionally linearized depth, is copied
//!    to the display surface
//!
//! Once an unchanged image has reached the accumulation cap the frame skips
//! straight to read back.

use crate::backend::{FrameBufferChannels, ObjectHandle, RayBackend, RendererType};
use crate::foundation::collections::Revision;
use crate::scene::Scene;

use super::frame_state::{ChangeFlags, FramePhase, FrameState};
use super::lighting::{ambient_light, SceneLight};
use super::surface::{DisplaySurface, Viewport};
use super::context::RenderContext;
use super::{RenderError, RenderResult};

/// Which renderer the host has attached to the window
///
/// Decided once when the synchronizer is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostRenderer {
    /// The ray backend draws the window
    #[default]
    Backend,
    /// A native rasterizer draws the window; the bridge stays idle
    Native,
}

/// How a frame ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A backend pass ran and pixels were read back
    Rendered,
    /// The image had converged; pixels were read back without a pass
    Converged,
    /// The viewport has no pixels; nothing was rendered
    EmptyViewport,
    /// The host renders natively; nothing was done
    Skipped,
}

/// Summary of one `render_frame` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Index of this frame
    pub frame_index: u64,
    /// How the frame ended
    pub outcome: FrameOutcome,
    /// Changes observed while preparing
    pub changes: ChangeFlags,
    /// Whether accumulation restarted this frame
    pub cleared: bool,
    /// Whether the frame buffer was reallocated
    pub reallocated: bool,
    /// Renderer used for the pass
    pub renderer: Option<RendererType>,
    /// Accumulated passes after this frame
    pub accumulation: u32,
    /// Variance estimate returned by the pass
    pub variance: Option<f32>,
}

impl FrameReport {
    const fn idle(frame_index: u64, outcome: FrameOutcome, accumulation: u32) -> Self {
        Self {
            frame_index,
            outcome,
            changes: ChangeFlags::empty(),
            cleared: false,
            reallocated: false,
            renderer: None,
            accumulation,
            variance: None,
        }
    }
}

/// Per-window frame driver
#[derive(Debug)]
pub struct FrameSynchronizer {
    host: HostRenderer,
    state: FrameState,
    phase: FramePhase,
    frame_buffer: Option<ObjectHandle>,
    allocated_channels: FrameBufferChannels,
    lights: Vec<ObjectHandle>,
    settings_seen: Option<Revision>,
    orient_pending: bool,
}

impl FrameSynchronizer {
    /// Synchronizer for a window drawn by `host`
    pub fn new(host: HostRenderer) -> Self {
        Self {
            host,
            // cap is replaced from the context config on the first frame
            state: FrameState::new(1),
            phase: FramePhase::Idle,
            frame_buffer: None,
            allocated_channels: FrameBufferChannels::empty(),
            lights: Vec::new(),
            settings_seen: None,
            orient_pending: true,
        }
    }

    /// Accumulation and frame bookkeeping
    pub const fn state(&self) -> &FrameState {
        &self.state
    }

    /// Phase the synchronizer is in; `Idle` between frames
    pub const fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Renderer attached to the window
    pub const fn host_renderer(&self) -> HostRenderer {
        self.host
    }

    /// Current frame buffer, once allocated
    pub const fn frame_buffer(&self) -> Option<ObjectHandle> {
        self.frame_buffer
    }

    /// Restart accumulation on the next frame
    pub fn request_clear(&mut self) {
        self.state.request_clear();
    }

    /// Render one frame of `scene` into `surface`
    ///
    /// Blocks until the backend pass has finished.
    pub fn render_frame<B: RayBackend>(
        &mut self,
        context: &mut RenderContext<B>,
        scene: &mut Scene,
        viewport: Viewport,
        surface: &mut DisplaySurface,
    ) -> RenderResult<FrameReport> {
        if self.host == HostRenderer::Native {
            log::trace!("Native host renderer attached; skipping frame");
            return Ok(FrameReport::idle(
                self.state.frame_index(),
                FrameOutcome::Skipped,
                self.state.accumulation(),
            ));
        }

        let result = self.run_frame(context, scene, viewport, surface);
        self.phase = FramePhase::Idle;
        result
    }

    fn run_frame<B: RayBackend>(
        &mut self,
        context: &mut RenderContext<B>,
        scene: &mut Scene,
        viewport: Viewport,
        surface: &mut DisplaySurface,
    ) -> RenderResult<FrameReport> {
        let frame_index = self.state.frame_index();

        self.phase = FramePhase::PreparingFrame;
        log::trace!("Frame {frame_index}: preparing");
        scene.release_retired(context.backend_mut());

        let mut changes = scene.take_changes();
        if self.settings_seen != Some(context.settings_revision()) {
            self.settings_seen = Some(context.settings_revision());
            self.state.set_max_accumulation(context.config().max_accumulation);
            changes |= ChangeFlags::SETTINGS;
        }
        changes |= self.state.observe_pose(scene.camera().pose());
        changes |= self.state.observe_aspect(viewport.aspect());

        let reallocated = !viewport.is_empty() && self.ensure_frame_buffer(context, viewport)?;
        if reallocated {
            changes |= ChangeFlags::RESIZE;
        }
        if self.state.clear_requested() {
            changes |= ChangeFlags::REQUESTED;
        }

        let cleared = self.state.should_clear(changes, context.config().progressive);
        if cleared {
            if let Some(frame_buffer) = self.frame_buffer {
                let channels = context.frame_buffer_channels();
                context
                    .backend_mut()
                    .clear_frame_buffer(frame_buffer, channels)?;
            }
            self.state.reset_accumulation();
            log::debug!("Frame {frame_index}: accumulation cleared ({changes:?})");
        }

        let mut report = FrameReport {
            frame_index,
            outcome: FrameOutcome::Rendered,
            changes,
            cleared,
            reallocated,
            renderer: None,
            accumulation: self.state.accumulation(),
            variance: None,
        };

        if !cleared && !viewport.is_empty() && self.state.is_converged() {
            log::trace!("Frame {frame_index}: converged, reusing image");
            self.read_back(context, scene, viewport, surface)?;
            report.outcome = FrameOutcome::Converged;
            self.state.finish_frame();
            return Ok(report);
        }

        context.begin_models()?;
        if changes.intersects(ChangeFlags::CAMERA | ChangeFlags::ASPECT | ChangeFlags::SETTINGS) {
            self.orient_pending = true;
        }
        if self.orient_pending {
            match viewport.aspect().filter(|_| !viewport.is_empty()) {
                Some(aspect) => {
                    context.orient_camera(scene.camera(), aspect)?;
                    self.orient_pending = false;
                }
                None => log::trace!("Frame {frame_index}: zero-area viewport, camera left as is"),
            }
        }

        self.phase = FramePhase::GeometrySubmission;
        let has_volume = {
            let mut frame = context.frame_context();
            scene.contribute_all(&mut frame)?;
            frame.has_volume()
        };
        self.state.set_has_volume(has_volume);
        self.replace_lights(context, scene)?;
        context.commit_models()?;

        if viewport.is_empty() {
            log::trace!("Frame {frame_index}: empty viewport, nothing to render");
            report.outcome = FrameOutcome::EmptyViewport;
            self.state.finish_frame();
            return Ok(report);
        }

        self.phase = FramePhase::BackendRender;
        let renderer = if has_volume && context.config().allows_volume_renderer() {
            RendererType::Volume
        } else {
            RendererType::Surface
        };
        let frame_buffer = self
            .frame_buffer
            .ok_or_else(|| RenderError::RenderingFailed("no frame buffer allocated".to_string()))?;
        let variance = context.render(renderer, frame_buffer)?;
        self.state.record_pass();
        log::trace!(
            "Frame {frame_index}: {renderer:?} pass {} of {}",
            self.state.accumulation(),
            self.state.max_accumulation()
        );

        self.read_back(context, scene, viewport, surface)?;

        report.renderer = Some(renderer);
        report.accumulation = self.state.accumulation();
        report.variance = Some(variance);
        self.state.finish_frame();
        Ok(report)
    }

    /// Allocate a frame buffer matching the viewport and channels
    ///
    /// # Returns
    /// `true` when a new buffer was created
    fn ensure_frame_buffer<B: RayBackend>(
        &mut self,
        context: &mut RenderContext<B>,
        viewport: Viewport,
    ) -> RenderResult<bool> {
        let channels = context.frame_buffer_channels();
        let resized = !self.state.observe_size(viewport.size()).is_empty();
        let channels_changed = self.allocated_channels != channels;
        if self.frame_buffer.is_some() && !resized && !channels_changed {
            return Ok(false);
        }

        if let Some(old) = self.frame_buffer.take() {
            context.backend_mut().release(old);
        }
        let frame_buffer =
            context
                .backend_mut()
                .create_frame_buffer(viewport.width, viewport.height, channels)?;
        self.frame_buffer = Some(frame_buffer);
        self.allocated_channels = channels;
        log::debug!(
            "Frame buffer allocated at {}x{} ({channels:?})",
            viewport.width,
            viewport.height
        );
        Ok(true)
    }

    fn replace_lights<B: RayBackend>(
        &mut self,
        context: &mut RenderContext<B>,
        scene: &Scene,
    ) -> RenderResult<()> {
        let backend = context.backend_mut();
        for light in self.lights.drain(..) {
            backend.release(light);
        }
        for light in scene.active_lights() {
            self.lights.push(light.to_backend_light(backend)?);
        }
        let ambient_intensity = context.config().ambient_intensity;
        if ambient_intensity > 0.0 {
            self.lights
                .push(ambient_light(context.backend_mut(), ambient_intensity)?);
        }
        context.set_lights(&self.lights)
    }

    fn read_back<B: RayBackend>(
        &mut self,
        context: &RenderContext<B>,
        scene: &Scene,
        viewport: Viewport,
        surface: &mut DisplaySurface,
    ) -> RenderResult<()> {
        self.phase = FramePhase::PixelReadback;
        let frame_buffer = self
            .frame_buffer
            .ok_or_else(|| RenderError::RenderingFailed("no frame buffer to read".to_string()))?;
        if surface.size() != viewport.size() {
            surface.resize(viewport.width, viewport.height);
        }
        surface.write_color(context.backend().map_color(frame_buffer)?)?;
        if context.config().depth_compositing {
            let camera = scene.camera();
            surface.write_depth(context.backend().map_depth(frame_buffer)?, |distance| {
                camera.linear_depth(distance)
            })?;
        }
        Ok(())
    }

    /// Release the frame buffer and this frame's lights
    pub fn release(&mut self, backend: &mut dyn RayBackend) {
        if let Some(frame_buffer) = self.frame_buffer.take() {
            backend.release(frame_buffer);
        }
        for light in self.lights.drain(..) {
            backend.release(light);
        }
        self.state.request_clear();
    }
}
