//! # Render Context
//!
//! Owns the backend device and every object that lives as long as the
//! application: the camera, the surface and volume renderers, the current
//! frame's root containers and the volume cache.
//!
//! The application creates exactly one context at startup and passes it by
//! `&mut` into each frame. Dropping it releases everything it created.
//!
//! ## Usage
//!
//! ```ignore
//! let mut context = RenderContext::new(backend, &BridgeConfig::default())?;
//! let mut synchronizer = FrameSynchronizer::new(HostRenderer::Backend);
//! synchronizer.render_frame(&mut context, &mut scene, viewport, &mut surface)?;
//! ```

use crate::backend::{FrameBufferChannels, ObjectHandle, ObjectKind, Param, RayBackend, RendererType};
use crate::config::BridgeConfig;
use crate::foundation::collections::Revision;
use crate::foundation::math::Vec4;

use super::camera::HostCamera;
use super::participant::FrameContext;
use super::volume::{Timestep, VolumeCache, VolumeId};
use super::{RenderError, RenderResult};

/// Backend device plus the handles shared by every frame
pub struct RenderContext<B: RayBackend> {
    backend: B,
    config: BridgeConfig,
    settings_revision: Revision,
    camera: ObjectHandle,
    surface_renderer: ObjectHandle,
    volume_renderer: ObjectHandle,
    model: ObjectHandle,
    volume_model: ObjectHandle,
    volume_cache: VolumeCache,
}

impl<B: RayBackend> RenderContext<B> {
    /// Initialize the backend and create the long-lived objects
    ///
    /// # Errors
    /// `RenderError::InitializationFailed` when the device cannot be
    /// initialized. Callers treat this as fatal.
    pub fn new(mut backend: B, config: &BridgeConfig) -> RenderResult<Self> {
        log::info!("Initializing ray backend with {} threads", config.num_threads);
        backend.initialize(config.num_threads).map_err(|e| match e {
            RenderError::InitializationFailed(_) => e,
            other => RenderError::InitializationFailed(other.to_string()),
        })?;

        let camera = backend.create(ObjectKind::Camera)?;
        let surface_renderer = backend.create(ObjectKind::Renderer(RendererType::Surface))?;
        let volume_renderer = backend.create(ObjectKind::Renderer(RendererType::Volume))?;
        let model = backend.create(ObjectKind::Model)?;
        backend.commit(model)?;
        let volume_model = backend.create(ObjectKind::Model)?;
        backend.commit(volume_model)?;

        let mut context = Self {
            backend,
            config: config.clone(),
            settings_revision: Revision::new(),
            camera,
            surface_renderer,
            volume_renderer,
            model,
            volume_model,
            volume_cache: VolumeCache::new(),
        };
        context.apply_settings()?;
        log::info!("Render context ready");
        Ok(context)
    }

    /// Backend device
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable backend device
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Current settings
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Revision bumped by every settings update
    pub const fn settings_revision(&self) -> Revision {
        self.settings_revision
    }

    /// Replace the settings and push them to both renderers
    ///
    /// The worker count only takes effect at initialization.
    pub fn update_config(&mut self, config: BridgeConfig) -> RenderResult<()> {
        if config.num_threads != self.config.num_threads {
            log::warn!("Backend worker count is fixed after initialization; ignoring change");
        }
        self.config = BridgeConfig {
            num_threads: self.config.num_threads,
            ..config
        };
        self.settings_revision.bump();
        self.apply_settings()
    }

    /// Backend camera
    pub const fn camera(&self) -> ObjectHandle {
        self.camera
    }

    /// Renderer of the given type
    pub const fn renderer(&self, renderer: RendererType) -> ObjectHandle {
        match renderer {
            RendererType::Surface => self.surface_renderer,
            RendererType::Volume => self.volume_renderer,
        }
    }

    /// Root geometry container of the current frame
    pub const fn model(&self) -> ObjectHandle {
        self.model
    }

    /// Volume container of the current frame
    pub const fn volume_model(&self) -> ObjectHandle {
        self.volume_model
    }

    /// Uploaded volumes
    pub const fn volume_cache(&self) -> &VolumeCache {
        &self.volume_cache
    }

    /// Release cached uploads of `id` older than `timestep`
    pub fn evict_volume_timesteps_before(&mut self, id: VolumeId, timestep: Timestep) -> usize {
        self.volume_cache
            .evict_timesteps_before(&mut self.backend, id, timestep)
    }

    /// Release every cached upload of `id`
    pub fn evict_volume(&mut self, id: VolumeId) {
        self.volume_cache.evict_volume(&mut self.backend, id);
    }

    /// Release every cached upload
    pub fn clear_volume_cache(&mut self) {
        self.volume_cache.clear(&mut self.backend);
    }

    /// Replace the frame's containers with fresh empty ones
    ///
    /// Instances owned by the old root container go with it. Volumes belong
    /// to the cache and survive.
    pub fn begin_models(&mut self) -> RenderResult<()> {
        self.backend.release(self.model);
        self.backend.release(self.volume_model);
        self.model = self.backend.create(ObjectKind::Model)?;
        self.volume_model = self.backend.create(ObjectKind::Model)?;

        for renderer in [self.surface_renderer, self.volume_renderer] {
            self.backend.set_param(renderer, "model", Param::Object(self.model))?;
        }
        self.backend
            .set_param(self.volume_renderer, "volumeModel", Param::Object(self.volume_model))?;
        log::trace!("Fresh frame containers created");
        Ok(())
    }

    /// Submission context for the current containers
    pub fn frame_context(&mut self) -> FrameContext<'_> {
        FrameContext::new(
            &mut self.backend,
            &self.config,
            &mut self.volume_cache,
            self.model,
            self.volume_model,
        )
    }

    /// Commit the containers and renderers once submission is finished
    pub fn commit_models(&mut self) -> RenderResult<()> {
        self.backend.commit(self.model)?;
        self.backend.commit(self.volume_model)?;
        self.backend.commit(self.surface_renderer)?;
        self.backend.commit(self.volume_renderer)?;
        Ok(())
    }

    /// Bind this frame's lights to both renderers
    pub fn set_lights(&mut self, lights: &[ObjectHandle]) -> RenderResult<()> {
        for renderer in [self.surface_renderer, self.volume_renderer] {
            self.backend
                .set_param(renderer, "lights", Param::ObjectList(lights.to_vec()))?;
        }
        Ok(())
    }

    /// Push a host camera into the backend camera
    pub fn orient_camera(&mut self, camera: &HostCamera, aspect: f32) -> RenderResult<()> {
        camera.orient(&mut self.backend, self.camera, aspect)
    }

    /// Channels a frame buffer needs under the current settings
    pub fn frame_buffer_channels(&self) -> FrameBufferChannels {
        let mut channels = FrameBufferChannels::COLOR | FrameBufferChannels::ACCUM;
        if self.config.depth_compositing {
            channels |= FrameBufferChannels::DEPTH;
        }
        channels
    }

    /// Render one pass with the chosen renderer
    pub fn render(&mut self, renderer: RendererType, frame_buffer: ObjectHandle) -> RenderResult<f32> {
        let channels = self.frame_buffer_channels();
        let handle = self.renderer(renderer);
        self.backend.render_frame(frame_buffer, handle, channels)
    }

    fn apply_settings(&mut self) -> RenderResult<()> {
        let [r, g, b, a] = self.config.background_color;
        let samples = i32::try_from(self.config.samples_per_pixel).unwrap_or(i32::MAX);
        let ao_samples = i32::try_from(self.config.ao_samples).unwrap_or(i32::MAX);

        for renderer in [self.surface_renderer, self.volume_renderer] {
            self.backend.set_param(renderer, "camera", Param::Object(self.camera))?;
            self.backend.set_param(renderer, "model", Param::Object(self.model))?;
            self.backend.set_param(renderer, "spp", Param::Int(samples))?;
            self.backend.set_param(renderer, "bgColor", Param::Vec4(Vec4::new(r, g, b, a)))?;
        }
        self.backend.set_param(self.surface_renderer, "aoSamples", Param::Int(ao_samples))?;
        self.backend
            .set_param(self.surface_renderer, "shadowsEnabled", Param::Bool(self.config.shadows))?;
        self.backend
            .set_param(self.volume_renderer, "volumeModel", Param::Object(self.volume_model))?;

        self.backend.commit(self.surface_renderer)?;
        self.backend.commit(self.volume_renderer)?;
        log::debug!(
            "Renderer settings applied: spp={}, ao={}, shadows={}",
            self.config.samples_per_pixel,
            self.config.ao_samples,
            self.config.shadows
        );
        Ok(())
    }
}

impl<B: RayBackend> Drop for RenderContext<B> {
    fn drop(&mut self) {
        self.volume_cache.clear(&mut self.backend);
        for handle in [
            self.model,
            self.volume_model,
            self.surface_renderer,
            self.volume_renderer,
            self.camera,
        ] {
            self.backend.release(handle);
        }
        log::debug!("Render context released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;

    #[test]
    fn test_new_creates_long_lived_objects() {
        let config = BridgeConfig::default().with_threads(3);
        let context = RenderContext::new(RecordingBackend::new(), &config).expect("context");
        let backend = context.backend();
        assert_eq!(backend.threads(), 3);
        assert_eq!(backend.live_count(ObjectKind::Camera), 1);
        assert_eq!(backend.live_count(ObjectKind::Renderer(RendererType::Surface)), 1);
        assert_eq!(backend.live_count(ObjectKind::Renderer(RendererType::Volume)), 1);
        assert_eq!(
            backend.param(context.renderer(RendererType::Volume), "volumeModel"),
            Some(&Param::Object(context.volume_model()))
        );
    }

    #[test]
    fn test_initialization_failure_is_reported() {
        let result = RenderContext::new(RecordingBackend::failing(), &BridgeConfig::default());
        assert!(matches!(result, Err(RenderError::InitializationFailed(_))));
    }

    #[test]
    fn test_begin_models_replaces_containers() {
        let mut context =
            RenderContext::new(RecordingBackend::new(), &BridgeConfig::default()).expect("context");
        let old = context.model();
        context.begin_models().expect("begin");
        context.commit_models().expect("commit");
        assert_ne!(context.model(), old);
        assert!(!context.backend().is_alive(old));
        assert_eq!(context.backend().live_count(ObjectKind::Model), 2);
        assert_eq!(
            context.backend().param(context.renderer(RendererType::Surface), "model"),
            Some(&Param::Object(context.model()))
        );
    }

    #[test]
    fn test_update_config_bumps_revision_and_applies() {
        let mut context =
            RenderContext::new(RecordingBackend::new(), &BridgeConfig::default()).expect("context");
        let before = context.settings_revision();
        context
            .update_config(BridgeConfig::default().with_ao_samples(4).with_threads(8))
            .expect("update");
        assert!(context.settings_revision() > before);
        assert_eq!(context.config().num_threads, 0);
        assert_eq!(
            context.backend().param(context.renderer(RendererType::Surface), "aoSamples"),
            Some(&Param::Int(4))
        );
    }

    #[test]
    fn test_depth_channel_follows_config() {
        let mut context =
            RenderContext::new(RecordingBackend::new(), &BridgeConfig::default()).expect("context");
        assert!(!context.frame_buffer_channels().contains(FrameBufferChannels::DEPTH));
        context
            .update_config(BridgeConfig::default().with_depth_compositing(true))
            .expect("update");
        assert!(context.frame_buffer_channels().contains(FrameBufferChannels::DEPTH));
    }
}
