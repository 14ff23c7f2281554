//! # Backend Module
//!
//! The `RayBackend` trait describes the ray-tracing library the bridge talks
//! to. `recording` provides an in-memory implementation that keeps every
//! object and parameter inspectable; tests and the demo run against it.

pub mod render;
pub mod recording;

// Re-export commonly used backend types
pub use render::{
    RayBackend, BackendResult, ObjectHandle, ObjectKind, Param, RendererType, LightKind,
    FrameBufferChannels,
};
pub use recording::{RecordingBackend, RecordedObject, BackendStats};
