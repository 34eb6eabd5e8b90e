//! Attribute channels carried by encoded geometry.
//!
//! A channel is one attribute stream (position, normal, ...) inside the
//! encoded mesh. Each channel gets a small integer unique id so that readers
//! can find it by meaning instead of by position in the channel table.
//!
//! Built-in channels use their insertion index as unique id. Custom channels
//! are re-tagged with the fixed ids below once the mesh is finalized.

use super::data::Mesh;

/// Unique id of the per-face material channel.
pub const MATERIAL_ID_UNIQUE_ID: u32 = 1000;
/// Unique id of the second texture coordinate channel.
pub const TEX_COORD_1_UNIQUE_ID: u32 = 1001;
/// Unique id of the original vertex index channel.
pub const ORIGINAL_INDEX_UNIQUE_ID: u32 = 1002;

/// Quantization bits used for positions.
pub const POSITION_QUANTIZATION_BITS: u8 = 14;
/// Quantization bits used for the first texture coordinate set.
pub const TEX_COORD_QUANTIZATION_BITS: u8 = 12;
/// Quantization bits used for normals.
pub const NORMAL_QUANTIZATION_BITS: u8 = 10;

/// Scalar type stored in a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelDataType {
    /// 32-bit float.
    Float32,
    /// 16-bit unsigned integer.
    UInt16,
    /// 32-bit signed integer.
    Int32,
}

impl ChannelDataType {
    pub(crate) fn to_tag(self) -> u8 {
        match self {
            Self::Float32 => 0,
            Self::UInt16 => 1,
            Self::Int32 => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Float32),
            1 => Some(Self::UInt16),
            2 => Some(Self::Int32),
            _ => None,
        }
    }
}

/// The kind of attribute a channel carries.
///
/// Variants are declared in channel insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKind {
    /// Vertex position `[x, y, z]`.
    Position,
    /// Source vertex index, kept for skinned meshes.
    OriginalIndex,
    /// Vertex normal `[x, y, z]`.
    Normal,
    /// Vertex color `[r, g, b]`.
    Color,
    /// First texture coordinate set `[u, v]`.
    TexCoord0,
    /// Second texture coordinate set `[u, v]`.
    TexCoord1,
    /// Per-face material index.
    MaterialId,
}

impl ChannelKind {
    /// All kinds, in insertion order.
    pub const ALL: [ChannelKind; 7] = [
        Self::Position,
        Self::OriginalIndex,
        Self::Normal,
        Self::Color,
        Self::TexCoord0,
        Self::TexCoord1,
        Self::MaterialId,
    ];

    /// Number of scalar components per value.
    pub fn components(self) -> usize {
        match self {
            Self::Position | Self::Normal | Self::Color => 3,
            Self::TexCoord0 | Self::TexCoord1 => 2,
            Self::OriginalIndex | Self::MaterialId => 1,
        }
    }

    /// Scalar type of the channel.
    pub fn data_type(self) -> ChannelDataType {
        match self {
            Self::OriginalIndex => ChannelDataType::Int32,
            Self::MaterialId => ChannelDataType::UInt16,
            _ => ChannelDataType::Float32,
        }
    }

    /// Fixed unique id for custom channels, `None` for built-in ones.
    pub fn custom_unique_id(self) -> Option<u32> {
        match self {
            Self::MaterialId => Some(MATERIAL_ID_UNIQUE_ID),
            Self::TexCoord1 => Some(TEX_COORD_1_UNIQUE_ID),
            Self::OriginalIndex => Some(ORIGINAL_INDEX_UNIQUE_ID),
            _ => None,
        }
    }

    /// Quantization bit depth, `None` for losslessly stored channels.
    pub fn quantization_bits(self) -> Option<u8> {
        match self {
            Self::Position => Some(POSITION_QUANTIZATION_BITS),
            Self::TexCoord0 => Some(TEX_COORD_QUANTIZATION_BITS),
            Self::Normal => Some(NORMAL_QUANTIZATION_BITS),
            _ => None,
        }
    }

    /// Whether the channel holds one value per face instead of per corner.
    pub fn is_per_face(self) -> bool {
        self == Self::MaterialId
    }

    /// Short lowercase name, used in logs and scene nodes.
    pub fn name(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::OriginalIndex => "original_index",
            Self::Normal => "normal",
            Self::Color => "color",
            Self::TexCoord0 => "tex_coord",
            Self::TexCoord1 => "tex_coord_1",
            Self::MaterialId => "material_id",
        }
    }

    pub(crate) fn to_tag(self) -> u8 {
        match self {
            Self::Position => 0,
            Self::Normal => 1,
            Self::Color => 2,
            Self::TexCoord0 => 3,
            Self::TexCoord1 => 4,
            Self::MaterialId => 5,
            Self::OriginalIndex => 6,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.to_tag() == tag)
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of channels active for one mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelSet {
    bits: u8,
}

impl ChannelSet {
    /// A set holding only positions.
    pub fn position_only() -> Self {
        Self {
            bits: ChannelKind::Position.bit(),
        }
    }

    /// Determine the active channels for a mesh.
    ///
    /// Optional arrays are active when non-empty. The material channel is
    /// active only for meshes with more than one part, and the original index
    /// channel only for meshes with deformers.
    pub fn for_mesh(mesh: &Mesh) -> Self {
        let mut set = Self::position_only();
        if mesh.has_deformers {
            set.insert(ChannelKind::OriginalIndex);
        }
        if !mesh.normals.is_empty() {
            set.insert(ChannelKind::Normal);
        }
        if !mesh.colors.is_empty() {
            set.insert(ChannelKind::Color);
        }
        if !mesh.tex_coords.is_empty() {
            set.insert(ChannelKind::TexCoord0);
        }
        if !mesh.tex_coords1.is_empty() {
            set.insert(ChannelKind::TexCoord1);
        }
        if mesh.parts.len() > 1 {
            set.insert(ChannelKind::MaterialId);
        }
        set
    }

    /// Add a channel.
    pub fn insert(&mut self, kind: ChannelKind) {
        self.bits |= kind.bit();
    }

    /// Whether the channel is active.
    pub fn contains(&self, kind: ChannelKind) -> bool {
        self.bits & kind.bit() != 0
    }

    /// Active channels in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = ChannelKind> + '_ {
        ChannelKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }

    /// Number of active channels.
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Whether no channel is active.
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

/// Mapping from channel kind to the unique id it was encoded with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMap {
    entries: Vec<(ChannelKind, u32)>,
}

impl ChannelMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) the unique id of a channel.
    pub fn insert(&mut self, kind: ChannelKind, unique_id: u32) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 = unique_id;
        } else {
            self.entries.push((kind, unique_id));
        }
    }

    /// Unique id of the given channel, if it was encoded.
    pub fn get(&self, kind: ChannelKind) -> Option<u32> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, id)| *id)
    }

    /// Entries in encoding order.
    pub fn iter(&self) -> impl Iterator<Item = (ChannelKind, u32)> + '_ {
        self.entries.iter().copied()
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Flat channel values (`count * components` scalars).
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValues {
    /// Float scalars.
    Float32(Vec<f32>),
    /// Unsigned 16-bit scalars.
    UInt16(Vec<u16>),
    /// Signed 32-bit scalars.
    Int32(Vec<i32>),
}

impl ChannelValues {
    /// Zero-filled storage for `len` scalars of the given type.
    pub fn zeroed(data_type: ChannelDataType, len: usize) -> Self {
        match data_type {
            ChannelDataType::Float32 => Self::Float32(vec![0.0; len]),
            ChannelDataType::UInt16 => Self::UInt16(vec![0; len]),
            ChannelDataType::Int32 => Self::Int32(vec![0; len]),
        }
    }

    /// Number of scalars.
    pub fn len(&self) -> usize {
        match self {
            Self::Float32(v) => v.len(),
            Self::UInt16(v) => v.len(),
            Self::Int32(v) => v.len(),
        }
    }

    /// Whether there are no scalars.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Float scalars, if this is a float channel.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            Self::Float32(v) => Some(v),
            _ => None,
        }
    }

    /// Unsigned 16-bit scalars, if this is a `u16` channel.
    pub fn as_u16(&self) -> Option<&[u16]> {
        match self {
            Self::UInt16(v) => Some(v),
            _ => None,
        }
    }

    /// Signed 32-bit scalars, if this is an `i32` channel.
    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            Self::Int32(v) => Some(v),
            _ => None,
        }
    }

    /// Rebuild typed values from raw bit patterns produced by [`bits_at`](Self::bits_at).
    pub(crate) fn from_bits(data_type: ChannelDataType, bits: &[u32]) -> Self {
        match data_type {
            ChannelDataType::Float32 => Self::Float32(bits.iter().map(|b| f32::from_bits(*b)).collect()),
            ChannelDataType::UInt16 => Self::UInt16(bits.iter().map(|b| *b as u16).collect()),
            ChannelDataType::Int32 => Self::Int32(bits.iter().map(|b| *b as i32).collect()),
        }
    }

    /// Raw bit pattern of the scalar at `index`, used for point de-duplication.
    pub(crate) fn bits_at(&self, index: usize) -> u32 {
        match self {
            Self::Float32(v) => v[index].to_bits(),
            Self::UInt16(v) => u32::from(v[index]),
            Self::Int32(v) => v[index] as u32,
        }
    }
}
