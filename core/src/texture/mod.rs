//! Texture usage types and baked texture naming rules.
//!
//! Provides [`TextureUsage`] (what a material does with a texture) along with
//! the extension of baked textures and the set of source formats the baker
//! knows how to convert.

/// Extension (without dot) of baked texture files.
pub const BAKED_TEXTURE_EXT: &str = "ktx";

/// Source image extensions the baker can convert, lowercase.
pub const SUPPORTED_TEXTURE_FORMATS: &[&str] = &[
    "png", "jpg", "jpeg", "bmp", "tga", "tif", "tiff", "webp", "gif",
];

/// Whether `extension` names a bakeable source format (case-insensitive).
pub fn is_supported_format(extension: &str) -> bool {
    SUPPORTED_TEXTURE_FORMATS
        .iter()
        .any(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Whether `extension` is the baked texture extension (case-insensitive).
pub fn is_baked_format(extension: &str) -> bool {
    extension.eq_ignore_ascii_case(BAKED_TEXTURE_EXT)
}

/// How a material uses a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureUsage {
    /// Base color.
    Albedo,
    /// Tangent-space normal map.
    Normal,
    /// Specular color.
    Specular,
    /// Metallic factor.
    Metallic,
    /// Roughness factor.
    Roughness,
    /// Emitted light.
    Emissive,
    /// Ambient occlusion.
    Occlusion,
}

impl TextureUsage {
    /// All usages.
    pub const ALL: [TextureUsage; 7] = [
        Self::Albedo,
        Self::Normal,
        Self::Specular,
        Self::Metallic,
        Self::Roughness,
        Self::Emissive,
        Self::Occlusion,
    ];

    /// Tag written into texture nodes.
    pub fn slot_tag(self) -> &'static str {
        match self {
            Self::Albedo => "Albedo",
            Self::Normal => "Normal",
            Self::Specular => "Specular",
            Self::Metallic => "Metallic",
            Self::Roughness => "Roughness",
            Self::Emissive => "Emissive",
            Self::Occlusion => "Occlusion",
        }
    }

    /// Material properties a texture of this usage is connected to.
    pub fn connection_properties(self) -> &'static [&'static str] {
        match self {
            Self::Albedo => &["AmbientFactor", "DiffuseColor"],
            Self::Normal => &["NormalMap"],
            Self::Specular => &["SpecularColor"],
            Self::Metallic => &["ReflectionFactor"],
            Self::Roughness => &["ShininessExponent"],
            Self::Emissive => &["EmissiveColor"],
            Self::Occlusion => &["AmbientColor"],
        }
    }

    /// Whether the baked texture only needs a single channel.
    pub fn is_grayscale(self) -> bool {
        matches!(self, Self::Metallic | Self::Roughness | Self::Occlusion)
    }
}

impl std::fmt::Display for TextureUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slot_tag())
    }
}
