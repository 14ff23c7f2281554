//! Volumes: host data, appearance, the per-volume cache and the actor
//!
//! Raw voxel data is uploaded once per (volume, timestep) and kept in the
//! [`VolumeCache`]; appearance (transfer function, sampling rate, shading,
//! clipping) is re-applied to the cached handle every frame.

mod cache;
mod actor;

pub use cache::{VolumeCache, VolumeHandles};
pub use actor::VolumeActor;

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::collections::Revision;
use crate::foundation::math::{utils, Vec3};

use super::{RenderError, RenderResult};

static NEXT_VOLUME_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one host volume object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VolumeId(u64);

impl VolumeId {
    /// Allocate an identity no other volume in the process shares
    pub fn unique() -> Self {
        Self(NEXT_VOLUME_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw identity value
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Simulation time of a volume's data
///
/// Compared bit-for-bit, with `-0.0` folded into `0.0`.
#[derive(Debug, Clone, Copy, PartialOrd)]
pub struct Timestep(f64);

impl Timestep {
    /// Wrap a time value
    pub fn new(time: f64) -> Self {
        Self(if time == 0.0 { 0.0 } else { time })
    }

    /// Time value
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Default for Timestep {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl PartialEq for Timestep {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Timestep {}

impl Hash for Timestep {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// Structured scalar volume supplied by the host
#[derive(Debug, Clone)]
pub struct VolumeData {
    id: VolumeId,
    timestep: Timestep,
    dimensions: [usize; 3],
    origin: Vec3,
    spacing: Vec3,
    scalars: Option<Vec<f32>>,
    revision: Revision,
    data_revisions: HashMap<Timestep, Revision>,
}

impl VolumeData {
    /// Grid without a scalar array
    pub fn new(id: VolumeId, dimensions: [usize; 3], origin: Vec3, spacing: Vec3) -> Self {
        Self {
            id,
            timestep: Timestep::default(),
            dimensions,
            origin,
            spacing,
            scalars: None,
            revision: Revision::new(),
            data_revisions: HashMap::new(),
        }
    }

    /// Attach point scalars, x fastest
    pub fn with_scalars(mut self, scalars: Vec<f32>) -> RenderResult<Self> {
        self.set_scalars(scalars)?;
        Ok(self)
    }

    /// Set the timestep this data belongs to
    pub fn with_timestep(mut self, timestep: Timestep) -> Self {
        self.timestep = timestep;
        self
    }

    /// Host identity
    pub const fn id(&self) -> VolumeId {
        self.id
    }

    /// Current timestep
    pub const fn timestep(&self) -> Timestep {
        self.timestep
    }

    /// Grid dimensions in voxels
    pub const fn dimensions(&self) -> [usize; 3] {
        self.dimensions
    }

    /// Grid origin
    pub const fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Grid spacing
    pub const fn spacing(&self) -> Vec3 {
        self.spacing
    }

    /// Point scalars, if any
    pub fn scalars(&self) -> Option<&[f32]> {
        self.scalars.as_deref()
    }

    /// Revision of the whole object; moves on every edit
    pub const fn revision(&self) -> Revision {
        self.revision
    }

    /// Revision of the raw data at the current timestep
    ///
    /// Only [`set_scalars`](Self::set_scalars) moves it, so other timesteps
    /// keep theirs while the data steps through time.
    pub fn data_revision(&self) -> Revision {
        self.data_revisions
            .get(&self.timestep)
            .copied()
            .unwrap_or_default()
    }

    /// Number of voxels the dimensions describe
    pub fn voxel_count(&self) -> usize {
        self.dimensions.iter().product()
    }

    /// Replace the scalars for the current timestep
    pub fn set_scalars(&mut self, scalars: Vec<f32>) -> RenderResult<()> {
        self.check_len(&scalars)?;
        self.scalars = Some(scalars);
        self.revision.bump();
        self.data_revisions.entry(self.timestep).or_default().bump();
        Ok(())
    }

    /// Drop the scalar array
    pub fn clear_scalars(&mut self) {
        self.scalars = None;
        self.revision.bump();
    }

    /// Move to another timestep with its data
    ///
    /// Data handed in for a timestep seen before is taken to be the data it
    /// had then; call [`set_scalars`](Self::set_scalars) afterwards to
    /// replace it.
    pub fn set_timestep(&mut self, timestep: Timestep, scalars: Option<Vec<f32>>) -> RenderResult<()> {
        if let Some(scalars) = &scalars {
            self.check_len(scalars)?;
        }
        self.timestep = timestep;
        self.scalars = scalars;
        self.revision.bump();
        Ok(())
    }

    fn check_len(&self, scalars: &[f32]) -> RenderResult<()> {
        if scalars.len() == self.voxel_count() {
            return Ok(());
        }
        Err(RenderError::ResourceCreationFailed(format!(
            "{} scalars for a {:?} grid",
            scalars.len(),
            self.dimensions
        )))
    }

    /// Minimum and maximum scalar
    pub fn scalar_range(&self) -> Option<(f32, f32)> {
        let scalars = self.scalars.as_ref()?;
        scalars.iter().fold(None, |range, &v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// Color and opacity lookup table over a scalar range
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFunction {
    /// Evenly spaced colors across the value range
    pub colors: Vec<Vec3>,
    /// Evenly spaced opacities across the value range
    pub opacities: Vec<f32>,
    /// Scalar range the tables span
    pub value_range: (f32, f32),
}

impl TransferFunction {
    /// Black-to-white ramp with linear opacity
    pub fn grayscale(value_range: (f32, f32)) -> Self {
        Self {
            colors: vec![Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0)],
            opacities: vec![0.0, 1.0],
            value_range,
        }
    }

    /// Sample piecewise-linear control points into tables
    ///
    /// Control points are `(scalar, value)` pairs and need not be sorted.
    /// Scalars outside the points clamp to the nearest point.
    pub fn from_control_points(
        color_points: &[(f32, Vec3)],
        opacity_points: &[(f32, f32)],
        value_range: (f32, f32),
        samples: usize,
    ) -> Self {
        let samples = samples.max(2);
        let (lo, hi) = value_range;
        let at = |i: usize| lo + (hi - lo) * i as f32 / (samples - 1) as f32;

        let mut color_points = color_points.to_vec();
        color_points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut opacity_points = opacity_points.to_vec();
        opacity_points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let colors = (0..samples)
            .map(|i| {
                let x = at(i);
                Vec3::new(
                    sample_piecewise(&color_points, x, |c| c.x),
                    sample_piecewise(&color_points, x, |c| c.y),
                    sample_piecewise(&color_points, x, |c| c.z),
                )
            })
            .collect();
        let opacities = (0..samples)
            .map(|i| sample_piecewise(&opacity_points, at(i), |o| *o))
            .collect();

        Self {
            colors,
            opacities,
            value_range,
        }
    }
}

fn sample_piecewise<T>(points: &[(f32, T)], x: f32, value: impl Fn(&T) -> f32) -> f32 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    if x <= first.0 {
        return value(&first.1);
    }
    for pair in points.windows(2) {
        let (x0, ref v0) = pair[0];
        let (x1, ref v1) = pair[1];
        if x <= x1 {
            let t = if x1 > x0 { (x - x0) / (x1 - x0) } else { 1.0 };
            return utils::lerp(value(v0), value(v1), t);
        }
    }
    points.last().map_or(0.0, |last| value(&last.1))
}

/// Per-frame appearance of a volume
#[derive(Debug, Clone)]
pub struct VolumeProperty {
    transfer_function: TransferFunction,
    sampling_rate: Option<f32>,
    gradient_shading: bool,
    clip_box: Option<(Vec3, Vec3)>,
    revision: Revision,
}

impl VolumeProperty {
    /// Property with the given transfer function and backend defaults
    pub fn new(transfer_function: TransferFunction) -> Self {
        Self {
            transfer_function,
            sampling_rate: None,
            gradient_shading: false,
            clip_box: None,
            revision: Revision::new(),
        }
    }

    /// Revision bumped by every setter
    pub const fn revision(&self) -> Revision {
        self.revision
    }

    /// Transfer function
    pub const fn transfer_function(&self) -> &TransferFunction {
        &self.transfer_function
    }

    /// Explicit sampling rate, if set
    pub const fn sampling_rate(&self) -> Option<f32> {
        self.sampling_rate
    }

    /// Whether gradient shading is on
    pub const fn gradient_shading(&self) -> bool {
        self.gradient_shading
    }

    /// Clip box lower and upper corners
    pub const fn clip_box(&self) -> Option<(Vec3, Vec3)> {
        self.clip_box
    }

    /// Replace the transfer function
    pub fn set_transfer_function(&mut self, transfer_function: TransferFunction) {
        self.transfer_function = transfer_function;
        self.revision.bump();
    }

    /// Set or clear the sampling rate override
    pub fn set_sampling_rate(&mut self, rate: Option<f32>) {
        self.sampling_rate = rate.map(|r| r.max(f32::EPSILON));
        self.revision.bump();
    }

    /// Toggle gradient shading
    pub fn set_gradient_shading(&mut self, enabled: bool) {
        self.gradient_shading = enabled;
        self.revision.bump();
    }

    /// Set or clear the clip box
    pub fn set_clip_box(&mut self, clip_box: Option<(Vec3, Vec3)>) {
        self.clip_box = clip_box;
        self.revision.bump();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_timestep_negative_zero_matches_zero() {
        assert_eq!(Timestep::new(-0.0), Timestep::new(0.0));
        assert_ne!(Timestep::new(1.0), Timestep::new(1.5));
    }

    #[test]
    fn test_volume_ids_unique() {
        assert_ne!(VolumeId::unique(), VolumeId::unique());
    }

    #[test]
    fn test_scalar_length_checked() {
        let data = VolumeData::new(VolumeId::unique(), [2, 2, 2], Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));
        assert!(data.clone().with_scalars(vec![0.0; 7]).is_err());
        let data = data.with_scalars((0..8).map(|v| v as f32).collect()).expect("scalars");
        assert_eq!(data.scalar_range(), Some((0.0, 7.0)));
    }

    #[test]
    fn test_scalar_update_bumps_revision() {
        let mut data = VolumeData::new(VolumeId::unique(), [1, 1, 1], Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));
        let before = data.revision();
        data.set_scalars(vec![1.0]).expect("scalars");
        assert!(data.revision() > before);
    }

    #[test]
    fn test_timestep_change_keeps_data_revisions() {
        let mut data = VolumeData::new(VolumeId::unique(), [1, 1, 1], Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0))
            .with_scalars(vec![0.0])
            .expect("scalars");
        let t0 = data.data_revision();

        data.set_timestep(Timestep::new(1.0), Some(vec![1.0])).expect("t1");
        data.set_timestep(Timestep::new(0.0), Some(vec![0.0])).expect("t0");
        assert_eq!(data.data_revision(), t0);

        data.set_scalars(vec![2.0]).expect("replace t0");
        assert!(data.data_revision() > t0);
        assert!(data.set_timestep(Timestep::new(2.0), Some(vec![0.0; 2])).is_err());
        assert_eq!(data.timestep(), Timestep::new(0.0));
    }

    #[test]
    fn test_control_points_sampled_linearly() {
        let tf = TransferFunction::from_control_points(
            &[(1.0, Vec3::new(1.0, 1.0, 1.0)), (0.0, Vec3::zeros())],
            &[(0.0, 0.0), (1.0, 0.5)],
            (0.0, 1.0),
            3,
        );
        assert_eq!(tf.colors.len(), 3);
        assert_relative_eq!(tf.colors[1].x, 0.5);
        assert_relative_eq!(tf.opacities[1], 0.25);
        assert_relative_eq!(tf.opacities[2], 0.5);
    }

    #[test]
    fn test_control_points_clamp_outside() {
        let tf = TransferFunction::from_control_points(
            &[(0.25, Vec3::new(0.2, 0.2, 0.2)), (0.75, Vec3::new(0.8, 0.8, 0.8))],
            &[(0.5, 0.3)],
            (0.0, 1.0),
            2,
        );
        assert_relative_eq!(tf.colors[0].y, 0.2);
        assert_relative_eq!(tf.colors[1].y, 0.8);
        assert_relative_eq!(tf.opacities[0], 0.3);
        assert_relative_eq!(tf.opacities[1], 0.3);
    }
}
