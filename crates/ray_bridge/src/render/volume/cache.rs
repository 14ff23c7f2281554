//! Per-volume cache of uploaded voxel data
//!
//! Uploading voxels is the expensive part of volume rendering, so each
//! (volume, timestep) pair is uploaded once and the backend handle reused for
//! every later frame. Entries are replaced when the host data revision moves
//! on and are otherwise kept until the owner evicts them; revisiting an
//! earlier timestep is a cache hit.
//!
//! Appearance is cheap and is pushed to the cached handle on every call, so a
//! transfer function edit shows up on the next frame without a re-upload.

use std::collections::{HashMap, HashSet};

use crate::backend::{ObjectHandle, ObjectKind, Param, RayBackend};
use crate::config::BridgeConfig;
use crate::foundation::collections::Revision;
use crate::foundation::math::Vec2;

use super::{Timestep, VolumeData, VolumeId, VolumeProperty};
use crate::render::{RenderError, RenderResult};

/// Backend objects holding one uploaded volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeHandles {
    /// Volume object with the voxel data
    pub volume: ObjectHandle,
    /// Transfer function bound to the volume
    pub transfer_function: ObjectHandle,
}

#[derive(Debug)]
struct CacheEntry {
    handles: VolumeHandles,
    data_revision: Revision,
}

/// Uploaded volumes keyed by (volume, timestep)
#[derive(Debug, Default)]
pub struct VolumeCache {
    entries: HashMap<(VolumeId, Timestep), CacheEntry>,
    reported_missing: HashSet<VolumeId>,
    missing_scalar_reports: usize,
    uploads: usize,
}

impl VolumeCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached (volume, timestep) entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an entry exists for the pair
    pub fn contains(&self, id: VolumeId, timestep: Timestep) -> bool {
        self.entries.contains_key(&(id, timestep))
    }

    /// Cached handles for the pair, without touching the backend
    pub fn handles(&self, id: VolumeId, timestep: Timestep) -> Option<VolumeHandles> {
        self.entries.get(&(id, timestep)).map(|entry| entry.handles)
    }

    /// Number of voxel uploads performed so far
    pub const fn uploads(&self) -> usize {
        self.uploads
    }

    /// Number of "no scalars" errors logged so far
    pub const fn missing_scalar_reports(&self) -> usize {
        self.missing_scalar_reports
    }

    /// Fetch the uploaded volume for the data's current timestep
    ///
    /// The voxels are uploaded on the first call for a (volume, timestep)
    /// pair and whenever the data revision changed since that upload. The
    /// property is applied to the handle on every call.
    ///
    /// # Returns
    /// `None` when the data has no scalars. That case is logged once per
    /// volume and leaves the cache untouched.
    pub fn get_or_create(
        &mut self,
        backend: &mut dyn RayBackend,
        data: &VolumeData,
        property: &VolumeProperty,
        config: &BridgeConfig,
    ) -> RenderResult<Option<VolumeHandles>> {
        let Some(scalars) = data.scalars() else {
            if self.reported_missing.insert(data.id()) {
                self.missing_scalar_reports += 1;
                log::error!(
                    "Volume {} has no point scalars at t={}; skipping it",
                    data.id().value(),
                    data.timestep().value()
                );
            }
            return Ok(None);
        };
        self.reported_missing.remove(&data.id());

        let key = (data.id(), data.timestep());
        let cached = self
            .entries
            .get(&key)
            .map(|entry| (entry.handles, entry.data_revision));
        let handles = match cached {
            Some((handles, revision)) if revision == data.data_revision() => handles,
            stale => {
                if let Some((stale, _)) = stale {
                    log::debug!("Volume {} data changed; re-uploading", data.id().value());
                    release_handles(backend, stale);
                }
                let handles = upload(backend, data, scalars, config)?;
                self.uploads += 1;
                self.entries.insert(
                    key,
                    CacheEntry {
                        handles,
                        data_revision: data.data_revision(),
                    },
                );
                handles
            }
        };

        apply_appearance(backend, handles, property, config)?;
        Ok(Some(handles))
    }

    /// Release every entry of `id` older than `timestep`
    pub fn evict_timesteps_before(
        &mut self,
        backend: &mut dyn RayBackend,
        id: VolumeId,
        timestep: Timestep,
    ) -> usize {
        let stale: Vec<_> = self
            .entries
            .keys()
            .filter(|(vid, t)| *vid == id && t.value() < timestep.value())
            .copied()
            .collect();
        for key in &stale {
            if let Some(entry) = self.entries.remove(key) {
                release_handles(backend, entry.handles);
            }
        }
        stale.len()
    }

    /// Release every entry of one volume
    pub fn evict_volume(&mut self, backend: &mut dyn RayBackend, id: VolumeId) {
        self.entries.retain(|(vid, _), entry| {
            if *vid == id {
                release_handles(backend, entry.handles);
                false
            } else {
                true
            }
        });
        self.reported_missing.remove(&id);
    }

    /// Release every entry
    pub fn clear(&mut self, backend: &mut dyn RayBackend) {
        for (_, entry) in self.entries.drain() {
            release_handles(backend, entry.handles);
        }
        self.reported_missing.clear();
    }
}

fn release_handles(backend: &mut dyn RayBackend, handles: VolumeHandles) {
    backend.release(handles.volume);
    backend.release(handles.transfer_function);
}

fn upload(
    backend: &mut dyn RayBackend,
    data: &VolumeData,
    scalars: &[f32],
    config: &BridgeConfig,
) -> RenderResult<VolumeHandles> {
    let dims = data.dimensions();
    let dims_i32 = dims
        .iter()
        .map(|&d| i32::try_from(d))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| RenderError::ResourceCreationFailed(format!("volume dimensions {dims:?} too large")))?;
    let range = data.scalar_range().unwrap_or((0.0, 1.0));

    let volume = backend.create(ObjectKind::Volume)?;
    backend.set_param(volume, "dimensions", Param::Int3([dims_i32[0], dims_i32[1], dims_i32[2]]))?;
    backend.set_param(volume, "gridOrigin", Param::Vec3(data.origin()))?;
    backend.set_param(volume, "gridSpacing", Param::Vec3(data.spacing()))?;
    backend.set_param(volume, "voxelType", Param::Str("float".to_string()))?;
    backend.set_param(volume, "voxelRange", Param::Vec2(Vec2::new(range.0, range.1)))?;

    if config.shared_data {
        upload_regions(backend, volume, dims, scalars, config.upload_chunk_voxels)?;
    } else {
        backend.set_param(volume, "voxelData", Param::FloatArray(scalars.to_vec()))?;
    }

    let transfer_function = backend.create(ObjectKind::TransferFunction)?;
    log::info!(
        "Uploaded volume {} at t={} ({}x{}x{} voxels)",
        data.id().value(),
        data.timestep().value(),
        dims[0],
        dims[1],
        dims[2]
    );
    Ok(VolumeHandles {
        volume,
        transfer_function,
    })
}

/// Copy voxels in bricks of at most `chunk` voxels
///
/// Bricks are whole z slabs when a slab fits in a chunk, otherwise whole x
/// rows within one slab.
fn upload_regions(
    backend: &mut dyn RayBackend,
    volume: ObjectHandle,
    dims: [usize; 3],
    scalars: &[f32],
    chunk: usize,
) -> RenderResult<()> {
    let [nx, ny, nz] = dims;
    let slab = nx * ny;
    if slab == 0 || nz == 0 {
        return Ok(());
    }
    let chunk = chunk.max(1);

    if slab <= chunk {
        let slabs_per_brick = chunk / slab;
        let mut z = 0;
        while z < nz {
            let depth = slabs_per_brick.min(nz - z);
            let start = z * slab;
            backend.set_region(
                volume,
                &scalars[start..start + depth * slab],
                [0, 0, z],
                [nx, ny, depth],
            )?;
            z += depth;
        }
    } else {
        let rows_per_brick = (chunk / nx).max(1);
        for z in 0..nz {
            let mut y = 0;
            while y < ny {
                let rows = rows_per_brick.min(ny - y);
                let start = z * slab + y * nx;
                backend.set_region(
                    volume,
                    &scalars[start..start + rows * nx],
                    [0, y, z],
                    [nx, rows, 1],
                )?;
                y += rows;
            }
        }
    }
    Ok(())
}

fn apply_appearance(
    backend: &mut dyn RayBackend,
    handles: VolumeHandles,
    property: &VolumeProperty,
    config: &BridgeConfig,
) -> RenderResult<()> {
    let tf = property.transfer_function();
    backend.set_param(handles.transfer_function, "colors", Param::Vec3Array(tf.colors.clone()))?;
    backend.set_param(handles.transfer_function, "opacities", Param::FloatArray(tf.opacities.clone()))?;
    backend.set_param(
        handles.transfer_function,
        "valueRange",
        Param::Vec2(Vec2::new(tf.value_range.0, tf.value_range.1)),
    )?;
    backend.commit(handles.transfer_function)?;

    let volume = handles.volume;
    backend.set_param(volume, "transferFunction", Param::Object(handles.transfer_function))?;
    backend.set_param(
        volume,
        "samplingRate",
        Param::Float(property.sampling_rate().unwrap_or(config.volume_sampling_rate)),
    )?;
    backend.set_param(volume, "gradientShadingEnabled", Param::Bool(property.gradient_shading()))?;
    match property.clip_box() {
        Some((lower, upper)) => {
            backend.set_param(volume, "volumeClippingBoxLower", Param::Vec3(lower))?;
            backend.set_param(volume, "volumeClippingBoxUpper", Param::Vec3(upper))?;
        }
        None => {
            backend.remove_param(volume, "volumeClippingBoxLower")?;
            backend.remove_param(volume, "volumeClippingBoxUpper")?;
        }
    }
    backend.commit(volume)?;
    Ok(())
}
