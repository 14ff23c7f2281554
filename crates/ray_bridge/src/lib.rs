//! # Ray Bridge
//!
//! Per-frame scene synchronization between a host scene graph and a
//! ray-tracing backend.
//!
//! ## Features
//!
//! - **Frame Synchronizer**: decides when to clear accumulation, rebuilds the
//!   frame's containers, renders and reads pixels back
//! - **Volume Cache**: one upload per (volume, timestep), appearance applied
//!   every frame
//! - **Progressive Rendering**: accumulation up to a configurable cap, then
//!   the converged image is reused
//! - **Pluggable Backend**: anything implementing [`backend::RayBackend`];
//!   [`backend::RecordingBackend`] runs in memory for tests and tools
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ray_bridge::prelude::*;
//!
//! fn main() -> Result<(), RenderError> {
//!     let config = BridgeConfig::default();
//!     let mut context = RenderContext::new(RecordingBackend::new(), &config)?;
//!     let mut synchronizer = FrameSynchronizer::new(HostRenderer::Backend);
//!     let mut scene = Scene::new();
//!     let mut surface = DisplaySurface::new();
//!
//!     synchronizer.render_frame(&mut context, &mut scene, Viewport::new(640, 480), &mut surface)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod backend;
pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for bridge users
pub mod prelude {
    pub use crate::{
        backend::{RayBackend, RecordingBackend, RendererType},
        config::{BridgeConfig, Config},
        foundation::math::{Transform, Vec3},
        render::{
            DisplaySurface, FrameOutcome, FrameReport, FrameSynchronizer, GeometryActor, HostCamera,
            HostLight, HostRenderer, RenderContext, RenderError, RenderResult, SurfaceProperty,
            Texture, Timestep, TransferFunction, TriangleMesh, Viewport, VolumeActor, VolumeData,
            VolumeId, VolumeProperty,
        },
        scene::Scene,
    };
}
