//! Quantizing attribute encoder.
//!
//! [`compress_mesh`] turns a [`Mesh`] into a compact byte buffer:
//!
//! ```text
//! "OVMC" | version u8 | face_count u32 | point_count u32 | channel_count u8
//! channel headers:  kind u8 | type u8 | components u8 | per_face u8 | unique_id u32 | bits u8
//! channel payloads: byte_len u32 | bytes
//!     quantized: min f32 x components | range f32 | packed values
//!     lossless:  little-endian scalars
//! index payload:    bits u8 | byte_len u32 | packed point indices
//! ```
//!
//! Corner values are written face by face, parts in order, and within a part
//! the quad-derived triangles come before the plain triangles.

use super::channels::{ChannelKind, ChannelMap, ChannelSet, ChannelValues};
use super::data::Mesh;
use super::error::EncodeError;
use super::quantize::{BitWriter, Quantizer, bits_needed};
use super::soup::{FinalChannel, SoupMesh, TriangleSoupBuilder};

/// Leading bytes of every encoded geometry buffer.
pub const GEOMETRY_MAGIC: [u8; 4] = *b"OVMC";
/// Current encoded geometry format version.
pub const GEOMETRY_VERSION: u8 = 1;

/// Encoded geometry plus the channel ids used to produce it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedGeometry {
    /// Encoded bytes.
    pub data: Vec<u8>,
    /// Unique id of every encoded channel.
    pub channels: ChannelMap,
    /// Number of encoded faces.
    pub face_count: usize,
    /// Number of de-duplicated points.
    pub point_count: usize,
}

/// Result of compressing one mesh.
#[derive(Debug, Clone, PartialEq)]
pub enum CompressionOutcome {
    /// The mesh has no valid triangles; no geometry is produced.
    Empty,
    /// The mesh was encoded.
    Compressed(CompressedGeometry),
}

impl CompressionOutcome {
    /// The geometry, if any was produced.
    pub fn geometry(&self) -> Option<&CompressedGeometry> {
        match self {
            Self::Empty => None,
            Self::Compressed(geometry) => Some(geometry),
        }
    }

    /// Consume the outcome, returning the geometry if any was produced.
    pub fn into_geometry(self) -> Option<CompressedGeometry> {
        match self {
            Self::Empty => None,
            Self::Compressed(geometry) => Some(geometry),
        }
    }
}

/// Maps a part index to the value written into the per-face material channel.
pub type MaterialIdLookup<'a> = &'a dyn Fn(usize) -> u16;

fn check_len(kind: ChannelKind, len: usize, expected: usize) -> Result<(), EncodeError> {
    if len != 0 && len != expected {
        return Err(EncodeError::ContractViolation {
            channel: kind,
            expected,
            actual: len,
        });
    }
    Ok(())
}

fn validate(mesh: &Mesh) -> Result<(), EncodeError> {
    let n = mesh.vertex_count();
    check_len(ChannelKind::Normal, mesh.normals.len(), n)?;
    check_len(ChannelKind::Color, mesh.colors.len(), n)?;
    check_len(ChannelKind::TexCoord0, mesh.tex_coords.len(), n)?;
    check_len(ChannelKind::TexCoord1, mesh.tex_coords1.len(), n)?;
    if mesh.has_deformers && mesh.original_indices.len() != n {
        return Err(EncodeError::ContractViolation {
            channel: ChannelKind::OriginalIndex,
            expected: n,
            actual: mesh.original_indices.len(),
        });
    }
    Ok(())
}

/// Channel slots inside the soup builder, by kind.
#[derive(Default)]
struct Slots {
    position: usize,
    original_index: Option<usize>,
    normal: Option<usize>,
    color: Option<usize>,
    tex_coord: Option<usize>,
    tex_coord1: Option<usize>,
    material_id: Option<usize>,
}

/// Compress a mesh into quantized, indexed geometry.
///
/// `material_id` maps a part index to the per-face material value; without
/// it the part index itself is written. The material channel is only emitted
/// for meshes with more than one part.
///
/// Malformed parts (index lists not a multiple of three) are skipped with a
/// warning. A mesh without any valid triangle yields
/// [`CompressionOutcome::Empty`].
///
/// # Errors
///
/// - [`EncodeError::AlreadyCompressed`] when the mesh is flagged compressed.
/// - [`EncodeError::ContractViolation`] / [`EncodeError::IndexOutOfRange`] on
///   attribute arrays or indices that do not match the vertex count.
/// - [`EncodeError::Finalize`] when no valid indexed mesh can be built.
pub fn compress_mesh(
    mesh: &Mesh,
    material_id: Option<MaterialIdLookup<'_>>,
) -> Result<CompressionOutcome, EncodeError> {
    crate::profile_function!();

    if mesh.was_compressed {
        return Err(EncodeError::AlreadyCompressed);
    }
    validate(mesh)?;

    for (index, part) in mesh.parts.iter().enumerate() {
        if !part.is_well_formed() {
            log::warn!(
                "Skipping malformed part {index} of {}: index counts {} and {} are not multiples of 3",
                mesh.display_name(),
                part.triangle_indices.len(),
                part.quad_triangle_indices.len()
            );
        }
    }

    let face_count = mesh.valid_triangle_count();
    if face_count == 0 {
        log::debug!("{} has no valid triangles", mesh.display_name());
        return Ok(CompressionOutcome::Empty);
    }

    let set = ChannelSet::for_mesh(mesh);
    let mut builder = TriangleSoupBuilder::new(face_count);
    let mut slots = Slots::default();
    for kind in set.iter() {
        let slot = builder.add_channel(kind);
        match kind {
            ChannelKind::Position => slots.position = slot,
            ChannelKind::OriginalIndex => slots.original_index = Some(slot),
            ChannelKind::Normal => slots.normal = Some(slot),
            ChannelKind::Color => slots.color = Some(slot),
            ChannelKind::TexCoord0 => slots.tex_coord = Some(slot),
            ChannelKind::TexCoord1 => slots.tex_coord1 = Some(slot),
            ChannelKind::MaterialId => slots.material_id = Some(slot),
        }
    }

    let vertex_count = mesh.vertex_count();
    let mut face = 0usize;
    for (part_index, part) in mesh.parts.iter().enumerate() {
        if !part.is_well_formed() {
            continue;
        }
        let material = material_id
            .map(|lookup| lookup(part_index))
            .unwrap_or_else(|| u16::try_from(part_index).unwrap_or(u16::MAX));

        let triangles = part
            .quad_triangle_indices
            .chunks_exact(3)
            .chain(part.triangle_indices.chunks_exact(3));
        for triangle in triangles {
            for (corner, &index) in triangle.iter().enumerate() {
                let v = index as usize;
                if v >= vertex_count {
                    return Err(EncodeError::IndexOutOfRange {
                        part: part_index,
                        index,
                        vertex_count,
                    });
                }
                builder.set_corner_f32(slots.position, face, corner, &mesh.vertices[v]);
                if let Some(slot) = slots.original_index {
                    builder.set_corner_i32(slot, face, corner, mesh.original_indices[v]);
                }
                if let Some(slot) = slots.normal {
                    builder.set_corner_f32(slot, face, corner, &mesh.normals[v]);
                }
                if let Some(slot) = slots.color {
                    builder.set_corner_f32(slot, face, corner, &mesh.colors[v]);
                }
                if let Some(slot) = slots.tex_coord {
                    builder.set_corner_f32(slot, face, corner, &mesh.tex_coords[v]);
                }
                if let Some(slot) = slots.tex_coord1 {
                    builder.set_corner_f32(slot, face, corner, &mesh.tex_coords1[v]);
                }
            }
            if let Some(slot) = slots.material_id {
                builder.set_face_u16(slot, face, material);
            }
            face += 1;
        }
    }

    let mut soup = builder.finalize()?;
    for kind in set.iter() {
        if let Some(id) = kind.custom_unique_id() {
            soup.set_unique_id(kind, id);
        }
    }

    let mut channels = ChannelMap::new();
    for ch in &soup.channels {
        channels.insert(ch.kind, ch.unique_id);
    }
    let data = write_geometry(&soup);
    log::debug!(
        "Compressed {}: {} faces, {} points, {} bytes",
        mesh.display_name(),
        soup.faces.len(),
        soup.point_count,
        data.len()
    );

    Ok(CompressionOutcome::Compressed(CompressedGeometry {
        data,
        channels,
        face_count: soup.faces.len(),
        point_count: soup.point_count,
    }))
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_f32(out: &mut Vec<u8>, value: f32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn channel_payload(ch: &FinalChannel) -> Vec<u8> {
    let components = ch.kind.components();
    let mut out = Vec::new();
    match (&ch.values, ch.kind.quantization_bits()) {
        (ChannelValues::Float32(values), Some(bits)) => {
            let quantizer = Quantizer::fit(values, components, bits);
            for &min in &quantizer.min {
                put_f32(&mut out, min);
            }
            put_f32(&mut out, quantizer.range);
            let mut writer = BitWriter::with_capacity(values.len() * usize::from(bits));
            for (i, &v) in values.iter().enumerate() {
                writer.write(quantizer.quantize(v, i % components), bits);
            }
            out.extend(writer.finish());
        }
        (ChannelValues::Float32(values), None) => {
            for &v in values {
                put_f32(&mut out, v);
            }
        }
        (ChannelValues::UInt16(values), _) => {
            for &v in values {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        (ChannelValues::Int32(values), _) => {
            for &v in values {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    out
}

fn write_geometry(soup: &SoupMesh) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&GEOMETRY_MAGIC);
    out.push(GEOMETRY_VERSION);
    put_u32(&mut out, soup.faces.len() as u32);
    put_u32(&mut out, soup.point_count as u32);
    out.push(soup.channels.len() as u8);

    for ch in &soup.channels {
        out.push(ch.kind.to_tag());
        out.push(ch.kind.data_type().to_tag());
        out.push(ch.kind.components() as u8);
        out.push(u8::from(ch.kind.is_per_face()));
        put_u32(&mut out, ch.unique_id);
        out.push(ch.kind.quantization_bits().unwrap_or(0));
    }

    for ch in &soup.channels {
        let payload = channel_payload(ch);
        put_u32(&mut out, payload.len() as u32);
        out.extend(payload);
    }

    let index_bits = bits_needed(soup.point_count.saturating_sub(1) as u32);
    let mut writer = BitWriter::with_capacity(soup.faces.len() * 3 * usize::from(index_bits));
    for face in &soup.faces {
        for &index in face {
            writer.write(index, index_bits);
        }
    }
    let indices = writer.finish();
    out.push(index_bits);
    put_u32(&mut out, indices.len() as u32);
    out.extend(indices);
    out
}
