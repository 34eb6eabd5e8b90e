//! # Oven Core
//!
//! Leaf crate of the Oven asset baker: the editable mesh model, the
//! quantizing attribute encoder, material and texture metadata, the baked
//! scene node tree, and worker dispatch primitives.

pub mod compute;
pub mod material;
pub mod mesh;
pub mod profiling;
pub mod scene;
pub mod texture;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
