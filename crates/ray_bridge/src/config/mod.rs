//! Configuration system
//!
//! [`BridgeConfig`] carries every renderer-wide knob the bridge forwards to
//! the backend or uses to pace progressive rendering. It can be loaded from
//! TOML or RON through the [`Config`] trait.

use std::path::Path;

pub use serde::{Deserialize, Serialize};

/// File formats a config can be stored in, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Ron,
}

impl ConfigFormat {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a `.toml` or `.ron` file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::of(path)?;
        let contents = std::fs::read_to_string(path)?;
        let config = match format {
            ConfigFormat::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?,
            ConfigFormat::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?,
        };
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a `.toml` or `.ron` file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match ConfigFormat::of(path)? {
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Renderer-wide settings for the bridge
///
/// Missing keys in a config file fall back to [`BridgeConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Worker threads the backend may use; 0 lets the backend decide
    pub num_threads: usize,
    /// Accumulate successive passes of an unchanged scene
    pub progressive: bool,
    /// Passes after which an unchanged image is considered converged
    pub max_accumulation: u32,
    /// Primary samples per pixel for each pass
    pub samples_per_pixel: u32,
    /// Ambient occlusion samples; any value above 0 forces the surface renderer
    pub ao_samples: u32,
    /// Enable shadow rays in the surface renderer
    pub shadows: bool,
    /// Read back and linearize depth for compositing with host content
    pub depth_compositing: bool,
    /// Background color [R, G, B, A] (0.0-1.0 range)
    pub background_color: [f32; 4],
    /// Upload voxel data through bounded region copies instead of one array
    pub shared_data: bool,
    /// Maximum voxels per region copy when `shared_data` is set
    pub upload_chunk_voxels: usize,
    /// Default volume sampling rate when a volume property does not set one
    pub volume_sampling_rate: f32,
    /// Intensity of the ambient light added to every frame
    pub ambient_intensity: f32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            progressive: true,
            max_accumulation: 1024,
            samples_per_pixel: 1,
            ao_samples: 0,
            shadows: false,
            depth_compositing: false,
            background_color: [0.0, 0.0, 0.0, 1.0],
            shared_data: false,
            upload_chunk_voxels: 1 << 20,
            volume_sampling_rate: 0.125,
            ambient_intensity: 0.2,
        }
    }
}

impl Config for BridgeConfig {}

impl BridgeConfig {
    /// Set the backend worker count
    pub const fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Enable or disable progressive accumulation
    pub const fn with_progressive(mut self, progressive: bool) -> Self {
        self.progressive = progressive;
        self
    }

    /// Set the accumulation cap
    pub fn with_max_accumulation(mut self, max_accumulation: u32) -> Self {
        self.max_accumulation = max_accumulation.max(1);
        self
    }

    /// Set ambient occlusion samples
    pub const fn with_ao_samples(mut self, ao_samples: u32) -> Self {
        self.ao_samples = ao_samples;
        self
    }

    /// Enable or disable depth read back
    pub const fn with_depth_compositing(mut self, enable: bool) -> Self {
        self.depth_compositing = enable;
        self
    }

    /// Enable or disable region uploads of voxel data
    pub const fn with_shared_data(mut self, enable: bool) -> Self {
        self.shared_data = enable;
        self
    }

    /// Set the region upload size in voxels
    pub fn with_upload_chunk_voxels(mut self, voxels: usize) -> Self {
        self.upload_chunk_voxels = voxels.max(1);
        self
    }

    /// Set background clear color [R, G, B, A] (0.0-1.0 range)
    pub const fn with_background(mut self, color: [f32; 4]) -> Self {
        self.background_color = color;
        self
    }

    /// Whether the volume renderer may be used at all
    pub const fn allows_volume_renderer(&self) -> bool {
        self.ao_samples == 0
    }
}
