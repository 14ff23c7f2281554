//! # Render Bridge
//!
//! Translates host scene-graph state into backend objects once per frame.
//!
//! ## Architecture
//!
//! - **RenderContext**: owns the backend, the camera, both renderers, the
//!   per-frame root containers and the volume cache
//! - **FrameSynchronizer**: drives one frame through prepare, submission,
//!   render and read back
//! - **Participants**: geometry and volume actors that contribute backend
//!   objects into the frame's containers
//! - **Lights**: host lights converted into backend lights every frame

pub mod context;
pub mod frame_state;
pub mod camera;
pub mod lighting;
pub mod material;
pub mod texture;
pub mod participant;
pub mod actor;
pub mod volume;
pub mod surface;
pub mod synchronizer;

#[cfg(test)]
mod synchronizer_tests;

pub use context::RenderContext;
pub use frame_state::{ChangeFlags, FramePhase, FrameState};
pub use camera::{CameraPose, HostCamera, linearize_depth};
pub use lighting::{HostLight, SceneLight};
pub use material::SurfaceProperty;
pub use texture::Texture;
pub use participant::{FrameContext, Renderable, SceneParticipant};
pub use actor::{GeometryActor, TriangleMesh};
pub use volume::{
    Timestep, TransferFunction, VolumeActor, VolumeCache, VolumeData, VolumeHandles, VolumeId,
    VolumeProperty,
};
pub use surface::{DisplaySurface, Viewport};
pub use synchronizer::{FrameOutcome, FrameReport, FrameSynchronizer, HostRenderer};

use thiserror::Error;

/// Render bridge errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// Backend initialization failed during setup
    ///
    /// Fatal: the application is expected to abort; nothing retries.
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// A rendering operation failed during execution
    #[error("Rendering failed: {0}")]
    RenderingFailed(String),

    /// Backend object or frame buffer creation failed
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// Backend-specific error occurred
    #[error("Backend error: {0}")]
    BackendError(String),

    /// A handle that the backend does not know
    #[error("Invalid backend handle: {0}")]
    InvalidHandle(String),

    /// Writing the display surface to an image file failed
    #[error("Image export failed: {0}")]
    ImageExport(#[from] image::ImageError),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
