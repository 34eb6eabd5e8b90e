//! In-memory model handed to a bake by a model parser.

use std::collections::HashMap;
use std::sync::Arc;

use oven_core::material::BakeMaterial;
use oven_core::mesh::Mesh;

use crate::location::ModelLocation;

/// A parsed model ready to bake.
///
/// Parts reference materials by name. An empty name, a name with no entry in
/// `materials`, or the placeholder material name all mean "no material".
#[derive(Debug, Clone)]
pub struct BakeModel {
    /// Where the model was loaded from.
    pub location: ModelLocation,
    /// Meshes in file order.
    pub meshes: Vec<Mesh>,
    /// Material table.
    pub materials: Vec<BakeMaterial>,
    /// Texture content stored inside the model file, keyed by reference path.
    pub embedded_textures: HashMap<String, Arc<Vec<u8>>>,
}

impl BakeModel {
    /// Create an empty model at `location`.
    pub fn new(location: ModelLocation) -> Self {
        Self {
            location,
            meshes: Vec::new(),
            materials: Vec::new(),
            embedded_textures: HashMap::new(),
        }
    }

    /// Add a mesh.
    #[must_use]
    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.meshes.push(mesh);
        self
    }

    /// Add a material.
    #[must_use]
    pub fn with_material(mut self, material: BakeMaterial) -> Self {
        self.materials.push(material);
        self
    }

    /// Register embedded texture content under the path materials use.
    #[must_use]
    pub fn with_embedded_texture(mut self, path: impl Into<String>, content: Vec<u8>) -> Self {
        self.embedded_textures.insert(path.into(), Arc::new(content));
        self
    }

    /// Look up a material by name, ignoring the placeholder.
    pub fn material(&self, name: &str) -> Option<&BakeMaterial> {
        if name.is_empty() {
            return None;
        }
        self.materials
            .iter()
            .find(|m| m.name == name && !m.is_placeholder())
    }

    /// Embedded content for a texture path.
    pub fn embedded_texture(&self, path: &str) -> Option<&Arc<Vec<u8>>> {
        self.embedded_textures.get(path)
    }
}
