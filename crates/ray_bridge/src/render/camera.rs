//! # Host Camera
//!
//! The host toolkit's perspective camera as the bridge sees it: position,
//! focal point, view-up, vertical view angle and clipping range. The pose
//! (everything except the clipping range) drives change detection; the
//! clipping range is only used to linearize read-back depth.

use crate::backend::{ObjectHandle, Param, RayBackend};
use crate::foundation::math::{utils, Vec3};

use super::RenderResult;

/// The part of the camera whose change invalidates accumulated passes
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPose {
    /// Eye position in world space
    pub position: Vec3,
    /// Point the camera looks at
    pub focal_point: Vec3,
    /// Up vector
    pub view_up: Vec3,
    /// Vertical view angle in degrees
    pub view_angle: f32,
}

/// Perspective camera owned by the host scene
#[derive(Debug, Clone)]
pub struct HostCamera {
    /// Eye position in world space
    pub position: Vec3,
    /// Point the camera looks at
    pub focal_point: Vec3,
    /// Up vector
    pub view_up: Vec3,
    /// Vertical view angle in degrees
    pub view_angle: f32,
    /// Near and far clipping distances
    pub clipping_range: (f32, f32),
}

impl Default for HostCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 1.0),
            focal_point: Vec3::zeros(),
            view_up: Vec3::new(0.0, 1.0, 0.0),
            view_angle: 30.0,
            clipping_range: (0.01, 1000.01),
        }
    }
}

impl HostCamera {
    /// Create a camera looking from `position` at `focal_point`
    pub fn looking_at(position: Vec3, focal_point: Vec3) -> Self {
        Self {
            position,
            focal_point,
            ..Self::default()
        }
    }

    /// Move the eye
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        log::trace!("Camera position updated to: {:?}", position);
    }

    /// Change the look-at point
    pub fn set_focal_point(&mut self, focal_point: Vec3) {
        self.focal_point = focal_point;
        log::trace!("Camera focal point updated to: {:?}", focal_point);
    }

    /// Set near and far clipping distances
    pub fn set_clipping_range(&mut self, near: f32, far: f32) {
        self.clipping_range = (near, far);
    }

    /// Snapshot of the pose for change detection
    pub fn pose(&self) -> CameraPose {
        CameraPose {
            position: self.position,
            focal_point: self.focal_point,
            view_up: self.view_up,
            view_angle: self.view_angle,
        }
    }

    /// Normalized view direction; falls back to -Z for a degenerate pose
    pub fn direction(&self) -> Vec3 {
        (self.focal_point - self.position)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(|| Vec3::new(0.0, 0.0, -1.0))
    }

    /// Push the pose and aspect ratio into a backend camera and commit it
    pub fn orient(
        &self,
        backend: &mut dyn RayBackend,
        camera: ObjectHandle,
        aspect: f32,
    ) -> RenderResult<()> {
        backend.set_param(camera, "pos", Param::Vec3(self.position))?;
        backend.set_param(camera, "dir", Param::Vec3(self.direction()))?;
        backend.set_param(camera, "up", Param::Vec3(self.view_up))?;
        backend.set_param(camera, "aspect", Param::Float(aspect))?;
        backend.set_param(camera, "fovy", Param::Float(self.view_angle))?;
        backend.commit(camera)?;
        log::trace!("Backend camera oriented, aspect {aspect}");
        Ok(())
    }

    /// Linearize one read-back hit distance against this camera
    pub fn linear_depth(&self, distance: f32) -> f32 {
        let (near, far) = self.clipping_range;
        linearize_depth(distance, near, far, self.view_angle)
    }
}

/// Map a ray hit distance into `[0, 1]` between the clipping planes
///
/// Rays leave the eye at up to half the view angle off axis, so the far
/// plane is widened by `1 / cos(view_angle / 2)` before the usual
/// `(z - near) / (far - near)`. Misses (non-finite distances) map to 1.
pub fn linearize_depth(distance: f32, near: f32, far: f32, view_angle_degrees: f32) -> f32 {
    if !distance.is_finite() {
        return 1.0;
    }
    let half_angle = utils::deg_to_rad(view_angle_degrees * 0.5);
    let correction = 1.0 / half_angle.cos().max(f32::EPSILON);
    let span = far.mul_add(correction, -near);
    if span <= 0.0 {
        return 1.0;
    }
    ((distance - near) / span).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ObjectKind, RecordingBackend};
    use approx::assert_relative_eq;

    #[test]
    fn test_depth_bounds() {
        assert_relative_eq!(linearize_depth(1.0, 1.0, 11.0, 0.0), 0.0);
        assert_relative_eq!(linearize_depth(11.0, 1.0, 11.0, 0.0), 1.0);
        assert_relative_eq!(linearize_depth(6.0, 1.0, 11.0, 0.0), 0.5);
        assert_relative_eq!(linearize_depth(f32::INFINITY, 1.0, 11.0, 30.0), 1.0);
        assert_relative_eq!(linearize_depth(0.5, 1.0, 11.0, 30.0), 0.0);
    }

    #[test]
    fn test_depth_widened_by_view_angle() {
        let narrow = linearize_depth(6.0, 1.0, 11.0, 0.0);
        let wide = linearize_depth(6.0, 1.0, 11.0, 90.0);
        assert!(wide < narrow);
        let far_corner = 11.0 / (45.0_f32).to_radians().cos();
        assert_relative_eq!(linearize_depth(far_corner, 1.0, 11.0, 90.0), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_orient_commits_pose() {
        let mut backend = RecordingBackend::new();
        backend.initialize(0).expect("init");
        let handle = backend.create(ObjectKind::Camera).expect("camera");
        let camera = HostCamera::looking_at(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros());
        camera.orient(&mut backend, handle, 2.0).expect("orient");

        assert_eq!(backend.param(handle, "dir"), Some(&Param::Vec3(Vec3::new(0.0, 0.0, -1.0))));
        assert_eq!(backend.param(handle, "aspect"), Some(&Param::Float(2.0)));
        assert_eq!(backend.param(handle, "fovy"), Some(&Param::Float(30.0)));
    }

    #[test]
    fn test_degenerate_direction_falls_back() {
        let camera = HostCamera::looking_at(Vec3::zeros(), Vec3::zeros());
        assert_eq!(camera.direction(), Vec3::new(0.0, 0.0, -1.0));
    }
}
