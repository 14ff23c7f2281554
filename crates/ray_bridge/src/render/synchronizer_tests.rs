//! Frame-level scenarios for the synchronizer against the recording backend

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::backend::{
        FrameBufferChannels, LightKind, ObjectKind, Param, RayBackend, RecordingBackend, RendererType,
    };
    use crate::config::BridgeConfig;
    use crate::foundation::collections::VolumeActorId;
    use crate::foundation::math::Vec3;
    use crate::scene::Scene;
    use approx::assert_relative_eq;

    struct Harness {
        context: RenderContext<RecordingBackend>,
        synchronizer: FrameSynchronizer,
        scene: Scene,
        surface: DisplaySurface,
    }

    impl Harness {
        fn new(config: BridgeConfig) -> Self {
            crate::foundation::logging::init_for_tests();
            let context = RenderContext::new(RecordingBackend::new(), &config).expect("context");
            let camera = HostCamera::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros());
            Self {
                context,
                synchronizer: FrameSynchronizer::new(HostRenderer::Backend),
                scene: Scene::with_camera(camera),
                surface: DisplaySurface::new(),
            }
        }

        fn with_triangle(mut self) -> Self {
            self.scene.add_actor(GeometryActor::new(
                TriangleMesh::new(
                    vec![Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
                    vec![[0, 1, 2]],
                ),
                SurfaceProperty::with_color(Vec3::new(0.8, 0.2, 0.2)),
            ));
            self.scene.add_light(HostLight::directional(
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::zeros(),
                Vec3::new(1.0, 1.0, 1.0),
                1.0,
            ));
            self
        }

        fn add_volume(&mut self, scalars: Option<Vec<f32>>) -> VolumeActorId {
            let mut data =
                VolumeData::new(VolumeId::unique(), [4, 4, 4], Vec3::zeros(), Vec3::new(0.5, 0.5, 0.5));
            if let Some(scalars) = scalars {
                data.set_scalars(scalars).expect("scalars");
            }
            let property = VolumeProperty::new(TransferFunction::grayscale((0.0, 63.0)));
            self.scene.add_volume(VolumeActor::new(data, property))
        }

        fn frame(&mut self, width: u32, height: u32) -> FrameReport {
            self.synchronizer
                .render_frame(
                    &mut self.context,
                    &mut self.scene,
                    Viewport::new(width, height),
                    &mut self.surface,
                )
                .expect("frame")
        }

        fn backend(&self) -> &RecordingBackend {
            self.context.backend()
        }
    }

    fn ramp() -> Vec<f32> {
        (0..64).map(|v| v as f32).collect()
    }

    #[test]
    fn test_accumulation_counts_one_per_frame() {
        let mut harness = Harness::new(BridgeConfig::default()).with_triangle();

        for expected in 1..=5 {
            let report = harness.frame(64, 48);
            assert_eq!(report.outcome, FrameOutcome::Rendered);
            assert_eq!(report.accumulation, expected);
            assert_eq!(report.cleared, expected == 1);
        }
        assert_eq!(harness.synchronizer.state().frame_index(), 5);
        assert_eq!(harness.synchronizer.phase(), FramePhase::Idle);
        assert_eq!(harness.backend().stats().frame_buffer_clears, 1);
    }

    #[test]
    fn test_volume_uploaded_once_for_repeated_timestep() {
        let mut harness = Harness::new(BridgeConfig::default());
        let id = harness.add_volume(Some(ramp()));

        let mut seen = Vec::new();
        for _ in 0..3 {
            harness.frame(32, 32);
            let handles = harness.scene.volume(id).and_then(VolumeActor::last_handles).expect("handles");
            assert_eq!(
                harness.backend().children(harness.context.volume_model()),
                &[handles.volume]
            );
            seen.push(handles);
        }
        assert!(seen.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(harness.context.volume_cache().uploads(), 1);
        assert_eq!(harness.backend().stats().voxel_uploads, 1);
        assert_eq!(harness.context.volume_cache().len(), 1);
    }

    #[test]
    fn test_transfer_function_change_updates_cached_volume() {
        let mut harness = Harness::new(BridgeConfig::default());
        let id = harness.add_volume(Some(ramp()));
        harness.frame(32, 32);
        let before = harness.scene.volume(id).and_then(VolumeActor::last_handles).expect("handles");

        let warm = TransferFunction::from_control_points(
            &[(0.0, Vec3::new(0.2, 0.0, 0.0)), (63.0, Vec3::new(1.0, 0.8, 0.0))],
            &[(0.0, 0.0), (63.0, 0.7)],
            (0.0, 63.0),
            8,
        );
        harness
            .scene
            .volume_mut(id)
            .expect("volume")
            .property_mut()
            .set_transfer_function(warm.clone());
        let report = harness.frame(32, 32);

        let after = harness.scene.volume(id).and_then(VolumeActor::last_handles).expect("handles");
        assert_eq!(before, after);
        assert!(report.cleared);
        assert!(report.changes.contains(ChangeFlags::CONTENT));
        assert_eq!(harness.context.volume_cache().uploads(), 1);
        assert_eq!(
            harness.backend().param(after.transfer_function, "colors"),
            Some(&Param::Vec3Array(warm.colors))
        );
        assert_eq!(
            harness.backend().param(after.transfer_function, "opacities"),
            Some(&Param::FloatArray(warm.opacities))
        );
    }

    #[test]
    fn test_resize_reallocates_exactly_once() {
        let mut harness = Harness::new(BridgeConfig::default()).with_triangle();
        assert!(harness.frame(800, 600).reallocated);
        assert!(!harness.frame(800, 600).reallocated);
        assert!(!harness.frame(800, 600).reallocated);
        assert_eq!(harness.backend().stats().frame_buffers_created, 1);

        let report = harness.frame(1024, 768);
        assert!(report.reallocated);
        assert!(report.cleared);
        assert!(report.changes.contains(ChangeFlags::RESIZE));
        assert_eq!(report.accumulation, 1);
        assert_eq!(harness.backend().stats().frame_buffers_created, 2);
        assert_eq!(harness.backend().live_frame_buffers(), 1);
        let frame_buffer = harness.synchronizer.frame_buffer().expect("frame buffer");
        assert_eq!(harness.backend().frame_buffer_size(frame_buffer), Some((1024, 768)));

        let report = harness.frame(1024, 768);
        assert!(!report.reallocated);
        assert_eq!(report.accumulation, 2);
        assert_eq!(harness.surface.size(), (1024, 768));
    }

    #[test]
    fn test_static_scene_converges_at_cap() {
        let mut harness = Harness::new(BridgeConfig::default().with_max_accumulation(1024)).with_triangle();

        for _ in 0..1024 {
            harness.frame(4, 4);
        }
        assert_eq!(harness.synchronizer.state().accumulation(), 1024);
        assert!(harness.synchronizer.state().is_converged());
        assert_eq!(harness.backend().stats().render_calls, 1024);

        for _ in 0..8 {
            let report = harness.frame(4, 4);
            assert_eq!(report.outcome, FrameOutcome::Converged);
            assert!(!report.cleared);
            assert_eq!(report.accumulation, 1024);
        }
        assert_eq!(harness.backend().stats().render_calls, 1024);
        assert_eq!(harness.backend().stats().frame_buffer_clears, 1);
        assert_eq!(harness.synchronizer.state().frame_index(), 1032);
    }

    #[test]
    fn test_zero_height_viewport_skips_camera_orientation() {
        let mut harness = Harness::new(BridgeConfig::default()).with_triangle();
        let camera = harness.context.camera();

        let report = harness.frame(640, 0);
        assert_eq!(report.outcome, FrameOutcome::EmptyViewport);
        assert!(harness.backend().param(camera, "aspect").is_none());
        assert_eq!(harness.backend().stats().render_calls, 0);
        assert_eq!(harness.synchronizer.frame_buffer(), None);

        let report = harness.frame(640, 480);
        assert_eq!(report.outcome, FrameOutcome::Rendered);
        match harness.backend().param(camera, "aspect") {
            Some(Param::Float(aspect)) => assert_relative_eq!(*aspect, 640.0 / 480.0),
            other => panic!("camera not oriented: {other:?}"),
        }
    }

    #[test]
    fn test_volume_without_scalars_is_skipped_once() {
        let mut harness = Harness::new(BridgeConfig::default()).with_triangle();
        harness.add_volume(None);

        for _ in 0..3 {
            let report = harness.frame(16, 16);
            assert_eq!(report.renderer, Some(RendererType::Surface));
            assert!(harness.backend().children(harness.context.volume_model()).is_empty());
        }
        assert_eq!(harness.context.volume_cache().missing_scalar_reports(), 1);
        assert!(harness.context.volume_cache().is_empty());
        assert_eq!(harness.backend().live_count(ObjectKind::Volume), 0);
        assert!(!harness.synchronizer.state().has_volume());
    }

    #[test]
    fn test_volume_renderer_used_only_without_ambient_occlusion() {
        let mut harness = Harness::new(BridgeConfig::default());
        harness.add_volume(Some(ramp()));
        let report = harness.frame(16, 16);
        assert_eq!(report.renderer, Some(RendererType::Volume));
        assert!(harness.synchronizer.state().has_volume());

        let mut harness = Harness::new(BridgeConfig::default().with_ao_samples(4));
        harness.add_volume(Some(ramp()));
        let report = harness.frame(16, 16);
        assert_eq!(report.renderer, Some(RendererType::Surface));
        assert_eq!(harness.backend().stats().last_renderer, Some(RendererType::Surface));
    }

    #[test]
    fn test_native_host_renderer_skips_frame() {
        let mut harness = Harness::new(BridgeConfig::default()).with_triangle();
        harness.synchronizer = FrameSynchronizer::new(HostRenderer::Native);

        let report = harness.frame(64, 64);
        assert_eq!(report.outcome, FrameOutcome::Skipped);
        assert_eq!(harness.backend().stats().render_calls, 0);
        assert_eq!(harness.backend().stats().frame_buffers_created, 0);
        assert_eq!(harness.synchronizer.state().frame_index(), 0);
    }

    #[test]
    fn test_camera_move_restarts_accumulation() {
        let mut harness = Harness::new(BridgeConfig::default()).with_triangle();
        for _ in 0..3 {
            harness.frame(32, 32);
        }
        harness.scene.camera_mut().set_position(Vec3::new(0.0, 2.0, 5.0));
        let report = harness.frame(32, 32);
        assert!(report.cleared);
        assert!(report.changes.contains(ChangeFlags::CAMERA));
        assert_eq!(report.accumulation, 1);
        assert_eq!(
            harness.backend().param(harness.context.camera(), "pos"),
            Some(&Param::Vec3(Vec3::new(0.0, 2.0, 5.0)))
        );
    }

    #[test]
    fn test_explicit_clear_request() {
        let mut harness = Harness::new(BridgeConfig::default()).with_triangle();
        harness.frame(8, 8);
        harness.frame(8, 8);
        harness.synchronizer.request_clear();
        let report = harness.frame(8, 8);
        assert!(report.cleared);
        assert!(report.changes.contains(ChangeFlags::REQUESTED));
        assert_eq!(report.accumulation, 1);
    }

    #[test]
    fn test_non_progressive_clears_every_frame() {
        let mut harness = Harness::new(BridgeConfig::default().with_progressive(false)).with_triangle();
        for _ in 0..4 {
            let report = harness.frame(8, 8);
            assert!(report.cleared);
            assert_eq!(report.accumulation, 1);
        }
    }

    #[test]
    fn test_settings_update_restarts_accumulation() {
        let mut harness = Harness::new(BridgeConfig::default()).with_triangle();
        harness.frame(8, 8);
        harness.frame(8, 8);
        harness
            .context
            .update_config(BridgeConfig::default().with_background([0.0, 0.0, 1.0, 1.0]))
            .expect("update");
        let report = harness.frame(8, 8);
        assert!(report.changes.contains(ChangeFlags::SETTINGS));
        assert!(report.cleared);
        assert_eq!(report.accumulation, 1);
    }

    #[test]
    fn test_lights_recreated_without_leaking() {
        let mut harness = Harness::new(BridgeConfig::default()).with_triangle();
        for _ in 0..4 {
            harness.frame(8, 8);
        }
        let backend = harness.backend();
        assert_eq!(backend.live_count(ObjectKind::Light(LightKind::Directional)), 1);
        assert_eq!(backend.live_count(ObjectKind::Light(LightKind::Ambient)), 1);
        match backend.param(harness.context.renderer(RendererType::Surface), "lights") {
            Some(Param::ObjectList(lights)) => assert_eq!(lights.len(), 2),
            other => panic!("lights not bound: {other:?}"),
        }
    }

    #[test]
    fn test_light_change_restarts_accumulation() {
        let mut harness = Harness::new(BridgeConfig::default());
        let light = harness.scene.add_light(HostLight::default());
        harness.frame(8, 8);
        harness.frame(8, 8);
        harness.scene.light_mut(light).expect("light").set_color(Vec3::new(1.0, 0.5, 0.0));
        let report = harness.frame(8, 8);
        assert!(report.changes.contains(ChangeFlags::LIGHTS));
        assert_eq!(report.accumulation, 1);
    }

    #[test]
    fn test_surface_receives_color() {
        let mut harness = Harness::new(BridgeConfig::default()).with_triangle();
        harness.frame(4, 2);
        assert_eq!(harness.surface.size(), (4, 2));
        assert_eq!(harness.surface.pixel(3, 1), Some([95, 95, 95, 255]));
    }

    #[test]
    fn test_depth_compositing_linearizes_hits_and_misses() {
        let config = BridgeConfig::default().with_depth_compositing(true);
        let mut harness = Harness::new(config.clone()).with_triangle();
        harness.frame(4, 4);
        let expected = harness.scene.camera().linear_depth(5.0);
        assert_relative_eq!(harness.surface.depth_at(0, 0).expect("depth"), expected, epsilon = 1e-6);
        assert!(expected > 0.0 && expected < 1.0);

        let mut empty = Harness::new(config);
        empty.frame(4, 4);
        assert_relative_eq!(empty.surface.depth_at(2, 2).expect("depth"), 1.0);
    }

    #[test]
    fn test_depth_channel_only_when_compositing() {
        let mut harness = Harness::new(BridgeConfig::default()).with_triangle();
        harness.frame(4, 4);
        assert!(!harness.context.frame_buffer_channels().contains(FrameBufferChannels::DEPTH));
        let frame_buffer = harness.synchronizer.frame_buffer().expect("frame buffer");
        assert!(harness.backend().map_depth(frame_buffer).is_err());

        harness
            .context
            .update_config(BridgeConfig::default().with_depth_compositing(true))
            .expect("update");
        let report = harness.frame(4, 4);
        assert!(report.reallocated);
        let frame_buffer = harness.synchronizer.frame_buffer().expect("frame buffer");
        assert!(harness.backend().map_depth(frame_buffer).is_ok());
    }

    #[test]
    fn test_shared_data_streams_regions() {
        let mut harness =
            Harness::new(BridgeConfig::default().with_shared_data(true).with_upload_chunk_voxels(16));
        let id = harness.add_volume(Some(ramp()));
        harness.frame(8, 8);

        let handles = harness.scene.volume(id).and_then(VolumeActor::last_handles).expect("handles");
        assert_eq!(harness.backend().stats().voxel_uploads, 0);
        assert_eq!(harness.backend().stats().region_uploads, 4);
        assert_eq!(harness.backend().voxels(handles.volume), Some(ramp().as_slice()));
    }

    #[test]
    fn test_removed_actor_released_and_clears() {
        let mut harness = Harness::new(BridgeConfig::default());
        let id = harness.scene.add_actor(GeometryActor::new(
            TriangleMesh::new(
                vec![Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
                vec![[0, 1, 2]],
            ),
            SurfaceProperty::default(),
        ));
        harness.frame(8, 8);
        harness.frame(8, 8);
        assert_eq!(harness.backend().live_count(ObjectKind::Triangles), 1);

        assert!(harness.scene.remove_actor(id));
        let report = harness.frame(8, 8);
        assert!(report.cleared);
        assert_eq!(harness.backend().live_count(ObjectKind::Triangles), 0);
        assert!(harness.backend().children(harness.context.model()).is_empty());
    }

    #[test]
    fn test_release_frees_frame_resources() {
        let mut harness = Harness::new(BridgeConfig::default()).with_triangle();
        harness.frame(8, 8);
        harness.synchronizer.release(harness.context.backend_mut());
        assert_eq!(harness.backend().live_frame_buffers(), 0);
        assert_eq!(harness.backend().live_count(ObjectKind::Light(LightKind::Directional)), 0);

        let report = harness.frame(8, 8);
        assert!(report.reallocated);
        assert!(report.cleared);
    }

    #[test]
    fn test_first_frame_adopts_configured_cap() {
        let mut harness = Harness::new(BridgeConfig::default().with_max_accumulation(3)).with_triangle();

        for expected in 1..=3 {
            assert_eq!(harness.frame(16, 16).accumulation, expected);
        }
        assert_eq!(harness.synchronizer.state().max_accumulation(), 3);
        assert_eq!(harness.frame(16, 16).outcome, FrameOutcome::Converged);
    }

    #[test]
    fn test_animated_volume_revisits_cached_timesteps() {
        let mut harness = Harness::new(BridgeConfig::default());
        let id = harness.add_volume(Some(ramp()));
        let times = [0.0, 1.0, 0.0, 1.0];

        let mut handles = Vec::new();
        for time in times {
            let volume = harness.scene.volume_mut(id).expect("volume");
            let scalars = ramp().into_iter().map(|v| v + time as f32).collect();
            volume
                .data_mut()
                .set_timestep(Timestep::new(time), Some(scalars))
                .expect("timestep");
            harness.frame(16, 16);
            handles.push(harness.scene.volume(id).and_then(VolumeActor::last_handles).expect("handles"));
        }

        assert_eq!(handles[0], handles[2]);
        assert_eq!(handles[1], handles[3]);
        assert_ne!(handles[0], handles[1]);
        assert_eq!(harness.context.volume_cache().uploads(), 2);
        assert_eq!(harness.context.volume_cache().len(), 2);
    }
}
