//! Material metadata carried through a bake.
//!
//! - [`BakeMaterial`] - Name, colour factors and texture slots of one material
//! - [`MaterialTexture`] - A texture path bound to a [`TextureUsage`]
//! - [`PLACEHOLDER_MATERIAL_NAME`] - Stand-in used by parsers for "no material"

use crate::texture::TextureUsage;

/// Name of the material a parser assigns to parts that have none.
///
/// Parts using it still encode, but the material itself never appears in
/// baked output.
pub const PLACEHOLDER_MATERIAL_NAME: &str = "__oven_placeholder__";

/// A texture path bound to a usage slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialTexture {
    /// How the material uses the texture.
    pub usage: TextureUsage,
    /// Path as written in the source model (relative, absolute, or embedded name).
    pub path: String,
}

/// A material referenced by mesh parts.
#[derive(Debug, Clone, PartialEq)]
pub struct BakeMaterial {
    /// Unique name within the model; parts refer to materials by this name.
    pub name: String,
    /// Diffuse colour, linear RGB.
    pub diffuse_color: [f32; 3],
    /// Specular colour, linear RGB.
    pub specular_color: [f32; 3],
    /// Specular exponent.
    pub shininess: f32,
    /// Opacity (1.0 = opaque).
    pub opacity: f32,
    /// Texture slots, in declaration order.
    pub textures: Vec<MaterialTexture>,
}

impl BakeMaterial {
    /// Creates a white, opaque material with no textures.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            diffuse_color: [1.0; 3],
            specular_color: [0.0; 3],
            shininess: 0.0,
            opacity: 1.0,
            textures: Vec::new(),
        }
    }

    /// The placeholder material.
    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER_MATERIAL_NAME)
    }

    /// Whether this is the placeholder material.
    pub fn is_placeholder(&self) -> bool {
        self.name == PLACEHOLDER_MATERIAL_NAME
    }

    /// Set the diffuse colour.
    #[must_use]
    pub fn with_diffuse_color(mut self, color: [f32; 3]) -> Self {
        self.diffuse_color = color;
        self
    }

    /// Set the specular colour.
    #[must_use]
    pub fn with_specular_color(mut self, color: [f32; 3]) -> Self {
        self.specular_color = color;
        self
    }

    /// Set the specular exponent.
    #[must_use]
    pub fn with_shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess;
        self
    }

    /// Set the opacity.
    #[must_use]
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// Bind a texture path to a usage slot.
    #[must_use]
    pub fn with_texture(mut self, usage: TextureUsage, path: impl Into<String>) -> Self {
        self.textures.push(MaterialTexture {
            usage,
            path: path.into(),
        });
        self
    }

    /// Texture slots with a non-empty path.
    pub fn referenced_textures(&self) -> impl Iterator<Item = &MaterialTexture> {
        self.textures.iter().filter(|t| !t.path.is_empty())
    }
}
