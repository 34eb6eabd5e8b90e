//! CPU-side mesh types and the quantizing attribute encoder.
//!
//! This module provides:
//!
//! - [`Mesh`] / [`MeshPart`] - Editable mesh data as produced by a model parser
//! - [`ChannelKind`], [`ChannelSet`], [`ChannelMap`] - Attribute channels and their ids
//! - [`compress_mesh`] - Quantized, de-duplicated geometry encoding
//! - [`decode_geometry`] - Reader for the encoded format
//! - Generators for common shapes (sphere, quad, cube)

mod channels;
mod data;
mod decoder;
mod encoder;
mod error;
pub mod generators;
mod quantize;
mod soup;

pub use channels::{
    ChannelDataType, ChannelKind, ChannelMap, ChannelSet, ChannelValues, MATERIAL_ID_UNIQUE_ID,
    NORMAL_QUANTIZATION_BITS, ORIGINAL_INDEX_UNIQUE_ID, POSITION_QUANTIZATION_BITS,
    TEX_COORD_1_UNIQUE_ID, TEX_COORD_QUANTIZATION_BITS,
};
pub use data::{Mesh, MeshPart};
pub use decoder::{DecodedChannel, DecodedGeometry, decode_geometry};
pub use encoder::{
    CompressedGeometry, CompressionOutcome, GEOMETRY_MAGIC, GEOMETRY_VERSION, MaterialIdLookup,
    compress_mesh,
};
pub use error::{DecodeError, EncodeError, FinalizeError};
