//! Scene node tree produced by a bake.
//!
//! - [`SceneNode`] - A named node with typed properties and children
//! - [`NodeProperty`] - Integer, float, string or byte property
//! - [`NodeId`] - Object identifier unique within one bake

mod types;

pub use types::{NodeId, NodeProperty, SceneNode};
