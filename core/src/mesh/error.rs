//! Error types for mesh encoding and decoding.

use super::channels::ChannelKind;

/// Reasons the triangle soup could not be turned into an encodable mesh.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeError {
    /// A face has no value for one of its channels.
    IncompleteFace {
        /// Face index.
        face: usize,
        /// Channel missing a value.
        channel: ChannelKind,
    },
    /// A channel holds a NaN or infinite value.
    NonFinite {
        /// Face index.
        face: usize,
        /// Offending channel.
        channel: ChannelKind,
    },
    /// Every face references the same point more than once.
    DegenerateTopology {
        /// Number of faces in the soup.
        faces: usize,
    },
    /// More unique points than a 32-bit index can address.
    TooManyPoints(usize),
}

impl std::fmt::Display for FinalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IncompleteFace { face, channel } => {
                write!(f, "face {face} has no {channel} value")
            }
            Self::NonFinite { face, channel } => {
                write!(f, "face {face} has a non-finite {channel} value")
            }
            Self::DegenerateTopology { faces } => {
                write!(f, "all {faces} faces are degenerate")
            }
            Self::TooManyPoints(count) => write!(f, "{count} points exceed the index range"),
        }
    }
}

impl std::error::Error for FinalizeError {}

/// Errors returned by [`compress_mesh`](super::compress_mesh).
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// The mesh was already compressed by an earlier bake.
    AlreadyCompressed,
    /// An attribute array length does not match the vertex count.
    ContractViolation {
        /// Channel whose array is mismatched.
        channel: ChannelKind,
        /// Vertex count of the mesh.
        expected: usize,
        /// Actual array length.
        actual: usize,
    },
    /// A part references a vertex that does not exist.
    IndexOutOfRange {
        /// Part index.
        part: usize,
        /// Offending vertex index.
        index: u32,
        /// Vertex count of the mesh.
        vertex_count: usize,
    },
    /// The encoder could not build a valid mesh.
    Finalize(FinalizeError),
}

impl EncodeError {
    /// Whether the error is a caller bug rather than a data problem.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::ContractViolation { .. } | Self::IndexOutOfRange { .. }
        )
    }
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyCompressed => f.write_str("cannot re-bake a mesh that is already compressed"),
            Self::ContractViolation {
                channel,
                expected,
                actual,
            } => write!(
                f,
                "{channel} array has {actual} entries, expected 0 or {expected}"
            ),
            Self::IndexOutOfRange {
                part,
                index,
                vertex_count,
            } => write!(
                f,
                "part {part} references vertex {index} but the mesh has {vertex_count}"
            ),
            Self::Finalize(e) => write!(f, "failed to finalize mesh: {e}"),
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Finalize(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FinalizeError> for EncodeError {
    fn from(e: FinalizeError) -> Self {
        Self::Finalize(e)
    }
}

/// Errors returned by [`decode_geometry`](super::decode_geometry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer does not start with the geometry magic.
    BadMagic,
    /// The buffer was written by an unknown format version.
    UnsupportedVersion(u8),
    /// The buffer ended early.
    Truncated,
    /// A channel header holds an unknown kind or data type tag.
    UnknownChannel(u8),
    /// Decoded data is inconsistent (e.g. a face index past the point count).
    Corrupt(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadMagic => f.write_str("not an encoded geometry buffer"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported geometry version {v}"),
            Self::Truncated => f.write_str("geometry buffer is truncated"),
            Self::UnknownChannel(tag) => write!(f, "unknown channel tag {tag}"),
            Self::Corrupt(msg) => write!(f, "corrupt geometry: {msg}"),
        }
    }
}

impl std::error::Error for DecodeError {}
