//! # Oven Bake
//!
//! Bake orchestration for the Oven asset baker. Takes a parsed
//! [`BakeModel`], compresses its meshes, re-bakes every referenced texture
//! on worker threads, and assembles the resulting scene node tree.
//!
//! ```ignore
//! use std::sync::Arc;
//! use oven_bake::{BakeConfig, BakeContext, BakeCoordinator, KtxTextureConverter};
//! use oven_core::compute::WorkerThreads;
//!
//! let context = BakeContext::new(
//!     BakeConfig::default().with_output_dir("baked"),
//!     Arc::new(WorkerThreads::with_available_parallelism()?),
//!     Arc::new(KtxTextureConverter::default()),
//! );
//! let mut bake = BakeCoordinator::bake(model, context);
//! bake.wait();
//! let result = bake.into_result();
//! ```

mod config;
mod converter;
mod coordinator;
mod error;
mod ktx;
mod location;
mod model;
mod registry;
mod tree;

pub use config::{BakeConfig, BakeContext};
pub use converter::{ConversionRequest, TextureConverter};
pub use coordinator::{BakeCoordinator, BakeNotification, BakeResult, BakeState};
pub use error::{BakeError, BakeWarning, ConfigError, TextureError};
pub use ktx::KtxTextureConverter;
pub use location::{ModelLocation, TextureUrl};
pub use model::BakeModel;
pub use registry::{
    ContentSupplier, RegistryStatus, TextureJobRegistry, TextureJobStatus, TextureReference,
};
pub use tree::{BakedTree, Connection, MaterialTable, NO_MATERIAL_ID, NodeTreeBuilder};
