//! Bake configuration and the per-bake runtime context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use oven_core::compute::WorkerSource;

use crate::converter::TextureConverter;
use crate::error::ConfigError;

/// Settings shared by every bake started from one configuration.
///
/// Loaded from an `oven.toml` file:
///
/// ```toml
/// output_dir = "baked"
/// original_output_dir = "originals"
/// worker_threads = 4
/// unit_scale_factor = 100.0
/// texture_mip_levels = true
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BakeConfig {
    /// Folder that receives baked textures and the serialized tree.
    pub output_dir: PathBuf,
    /// Folder that receives copies of original external textures.
    pub original_output_dir: Option<PathBuf>,
    /// Number of worker threads; 0 uses the available parallelism.
    pub worker_threads: usize,
    /// Scene unit scale written into the settings node.
    pub unit_scale_factor: f64,
    /// Whether baked textures carry a full mip chain.
    pub texture_mip_levels: bool,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("baked"),
            original_output_dir: None,
            worker_threads: 0,
            unit_scale_factor: 100.0,
            texture_mip_levels: true,
        }
    }
}

impl BakeConfig {
    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a config file, falling back to defaults when it is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                log::info!("Loaded bake config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("No bake config ({e}), using defaults");
                Self::default()
            }
        }
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Set the output folder.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Enable archival copies of original textures.
    #[must_use]
    pub fn with_original_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.original_output_dir = Some(dir.into());
        self
    }

    /// Set the worker thread count.
    #[must_use]
    pub fn with_worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = count;
        self
    }

    /// Set the scene unit scale.
    #[must_use]
    pub fn with_unit_scale_factor(mut self, scale: f64) -> Self {
        self.unit_scale_factor = scale;
        self
    }

    /// Enable or disable mip generation.
    #[must_use]
    pub fn with_texture_mip_levels(mut self, enabled: bool) -> Self {
        self.texture_mip_levels = enabled;
        self
    }
}

/// Everything a bake needs at runtime besides the model itself.
///
/// Cheap to clone; concurrent bakes can share one context since all mutable
/// bake state lives in the coordinator.
#[derive(Clone)]
pub struct BakeContext {
    /// Settings.
    pub config: BakeConfig,
    /// Where texture jobs run.
    pub workers: Arc<dyn WorkerSource>,
    /// Texture conversion implementation.
    pub converter: Arc<dyn TextureConverter>,
}

impl BakeContext {
    /// Create a context from its parts.
    pub fn new(
        config: BakeConfig,
        workers: Arc<dyn WorkerSource>,
        converter: Arc<dyn TextureConverter>,
    ) -> Self {
        Self {
            config,
            workers,
            converter,
        }
    }
}

impl std::fmt::Debug for BakeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BakeContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
