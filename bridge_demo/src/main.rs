//! Bridge demo application
//!
//! Renders a textured quad and a time-varying scalar volume through the
//! in-memory recording backend, steps the volume through a few timesteps and
//! writes the final image to a PNG.
//!
//! Usage: `bridge_demo [config.toml|config.ron] [output.png]`

use ray_bridge::config::ConfigError;
use ray_bridge::foundation::logging;
use ray_bridge::foundation::math::Vec2;
use ray_bridge::prelude::*;
use thiserror::Error;

const VIEWPORT: Viewport = Viewport::new(320, 240);
const GRID: usize = 16;
const FRAMES_PER_TIMESTEP: usize = 8;
const TIMESTEPS: usize = 3;

#[derive(Error, Debug)]
enum DemoError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("rendering: {0}")]
    Render(#[from] RenderError),
}

fn quad() -> TriangleMesh {
    let mut mesh = TriangleMesh::new(
        vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
        ],
        vec![[0, 1, 2], [0, 2, 3]],
    );
    mesh.texcoords = Some(vec![
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 1.0),
    ]);
    mesh
}

fn checkerboard(size: u32) -> Result<Texture, RenderError> {
    let texels = (0..size * size)
        .flat_map(|i| {
            let (x, y) = (i % size, i / size);
            if (x / 4 + y / 4) % 2 == 0 {
                [230, 230, 230, 255]
            } else {
                [40, 40, 40, 255]
            }
        })
        .collect();
    Texture::from_rgba(size, size, texels)
}

/// Radial falloff whose center drifts with time
fn blob(time: f32) -> Vec<f32> {
    let center = Vec3::new(0.3f32.mul_add(time, 0.5), 0.5, 0.5) * (GRID - 1) as f32;
    let mut scalars = Vec::with_capacity(GRID * GRID * GRID);
    for z in 0..GRID {
        for y in 0..GRID {
            for x in 0..GRID {
                let p = Vec3::new(x as f32, y as f32, z as f32);
                scalars.push((1.0 - (p - center).norm() / GRID as f32).max(0.0));
            }
        }
    }
    scalars
}

fn run() -> Result<(), DemoError> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => BridgeConfig::load_from_file(&path)?,
        None => BridgeConfig::default().with_max_accumulation(64),
    };
    let output = args.next().unwrap_or_else(|| "bridge_demo.png".to_string());

    let mut context = RenderContext::new(RecordingBackend::new(), &config)?;
    let mut synchronizer = FrameSynchronizer::new(HostRenderer::Backend);
    let mut surface = DisplaySurface::new();
    let mut scene = Scene::with_camera(HostCamera::looking_at(Vec3::new(0.0, 0.0, 6.0), Vec3::zeros()));

    let mut actor = GeometryActor::new(quad(), SurfaceProperty::with_color(Vec3::new(0.9, 0.9, 0.9)));
    actor.set_texture(Some(checkerboard(32)?));
    scene.add_actor(actor);
    scene.add_light(HostLight::directional(
        Vec3::new(2.0, 3.0, 4.0),
        Vec3::zeros(),
        Vec3::new(1.0, 0.95, 0.9),
        1.0,
    ));

    let volume_id = VolumeId::unique();
    let data = VolumeData::new(
        volume_id,
        [GRID; 3],
        Vec3::new(-1.0, -1.0, -1.0),
        Vec3::new(2.0, 2.0, 2.0) / (GRID - 1) as f32,
    )
    .with_scalars(blob(0.0))?;
    let transfer_function = TransferFunction::from_control_points(
        &[(0.0, Vec3::new(0.0, 0.0, 0.4)), (1.0, Vec3::new(1.0, 0.6, 0.1))],
        &[(0.0, 0.0), (0.3, 0.0), (1.0, 0.8)],
        (0.0, 1.0),
        64,
    );
    let volume = scene.add_volume(VolumeActor::new(data, VolumeProperty::new(transfer_function)));

    for step in 0..TIMESTEPS {
        if step > 0 {
            let time = step as f32 / TIMESTEPS as f32;
            if let Some(volume) = scene.volume_mut(volume) {
                volume
                    .data_mut()
                    .set_timestep(Timestep::new(f64::from(time)), Some(blob(time)))?;
            }
        }
        for _ in 0..FRAMES_PER_TIMESTEP {
            let report = synchronizer.render_frame(&mut context, &mut scene, VIEWPORT, &mut surface)?;
            log::debug!(
                "frame {}: {:?}, {:?} renderer, {} passes",
                report.frame_index,
                report.outcome,
                report.renderer,
                report.accumulation
            );
        }
        if let Some(current) = scene.volume(volume).map(|v| v.data().timestep()) {
            let evicted = context.evict_volume_timesteps_before(volume_id, current);
            if evicted > 0 {
                log::info!("Evicted {evicted} old timestep(s)");
            }
        }
    }

    surface.save_png(&output)?;
    let stats = context.backend().stats();
    log::info!(
        "Done: {} render calls, {} voxel uploads, {} frames",
        stats.render_calls,
        stats.voxel_uploads + stats.region_uploads,
        synchronizer.state().frame_index()
    );

    scene.release_all(context.backend_mut());
    synchronizer.release(context.backend_mut());
    Ok(())
}

fn main() {
    logging::init();
    if let Err(e) = run() {
        log::error!("bridge_demo failed: {e}");
        std::process::exit(1);
    }
}
