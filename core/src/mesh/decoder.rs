//! Reader for buffers produced by [`compress_mesh`](super::compress_mesh).

use super::channels::{ChannelDataType, ChannelKind, ChannelValues};
use super::encoder::{GEOMETRY_MAGIC, GEOMETRY_VERSION};
use super::error::DecodeError;
use super::quantize::{BitReader, Quantizer};

/// One decoded channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedChannel {
    /// Attribute kind.
    pub kind: ChannelKind,
    /// Unique id the channel was encoded with.
    pub unique_id: u32,
    /// Whether values are per face rather than per point.
    pub per_face: bool,
    /// Flat values, dequantized where the channel was quantized.
    pub values: ChannelValues,
}

/// Geometry decoded from an encoded buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGeometry {
    /// Point indices of every face.
    pub faces: Vec<[u32; 3]>,
    /// Number of points.
    pub point_count: usize,
    /// Channels in encoding order.
    pub channels: Vec<DecodedChannel>,
}

impl DecodedGeometry {
    /// Find a channel by kind.
    pub fn channel(&self, kind: ChannelKind) -> Option<&DecodedChannel> {
        self.channels.iter().find(|ch| ch.kind == kind)
    }

    /// Find a channel by the unique id it was encoded with.
    pub fn channel_by_unique_id(&self, unique_id: u32) -> Option<&DecodedChannel> {
        self.channels.iter().find(|ch| ch.unique_id == unique_id)
    }

    /// Point positions.
    pub fn positions(&self) -> Vec<[f32; 3]> {
        self.channel(ChannelKind::Position)
            .and_then(|ch| ch.values.as_f32())
            .map(|values| {
                values
                    .chunks_exact(3)
                    .map(|p| [p[0], p[1], p[2]])
                    .collect()
            })
            .unwrap_or_default()
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::Truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or(DecodeError::Truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

fn le_f32(b: &[u8]) -> f32 {
    f32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

struct ChannelHeader {
    kind: ChannelKind,
    data_type: ChannelDataType,
    components: usize,
    per_face: bool,
    unique_id: u32,
    bits: u8,
}

fn read_header(cursor: &mut Cursor<'_>) -> Result<ChannelHeader, DecodeError> {
    let kind_tag = cursor.u8()?;
    let kind = ChannelKind::from_tag(kind_tag).ok_or(DecodeError::UnknownChannel(kind_tag))?;
    let type_tag = cursor.u8()?;
    let data_type =
        ChannelDataType::from_tag(type_tag).ok_or(DecodeError::UnknownChannel(type_tag))?;
    let components = usize::from(cursor.u8()?);
    let per_face = cursor.u8()? != 0;
    let unique_id = cursor.u32()?;
    let bits = cursor.u8()?;
    if components == 0 || bits > 32 {
        return Err(DecodeError::Corrupt(format!("bad header for {kind} channel")));
    }
    Ok(ChannelHeader {
        kind,
        data_type,
        components,
        per_face,
        unique_id,
        bits,
    })
}

fn read_values(header: &ChannelHeader, payload: &[u8], count: usize) -> Result<ChannelValues, DecodeError> {
    let scalars = count * header.components;
    if header.bits > 0 {
        if header.data_type != ChannelDataType::Float32 {
            return Err(DecodeError::Corrupt(format!(
                "quantized {} channel is not float",
                header.kind
            )));
        }
        let mut cursor = Cursor {
            bytes: payload,
            pos: 0,
        };
        let min = (0..header.components)
            .map(|_| cursor.take(4).map(le_f32))
            .collect::<Result<Vec<_>, _>>()?;
        let range = le_f32(cursor.take(4)?);
        let quantizer = Quantizer {
            min,
            range,
            bits: header.bits,
        };
        let mut reader = BitReader::new(&payload[cursor.pos..]);
        let values = (0..scalars)
            .map(|i| {
                reader
                    .read(header.bits)
                    .map(|q| quantizer.dequantize(q, i % header.components))
                    .ok_or(DecodeError::Truncated)
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(ChannelValues::Float32(values));
    }

    let width = match header.data_type {
        ChannelDataType::UInt16 => 2,
        ChannelDataType::Float32 | ChannelDataType::Int32 => 4,
    };
    if payload.len() != scalars * width {
        return Err(DecodeError::Corrupt(format!(
            "{} channel holds {} bytes, expected {}",
            header.kind,
            payload.len(),
            scalars * width
        )));
    }
    Ok(match header.data_type {
        ChannelDataType::Float32 => {
            ChannelValues::Float32(payload.chunks_exact(4).map(le_f32).collect())
        }
        ChannelDataType::UInt16 => ChannelValues::UInt16(
            payload
                .chunks_exact(2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
                .collect(),
        ),
        ChannelDataType::Int32 => ChannelValues::Int32(
            payload
                .chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        ),
    })
}

/// Decode a geometry buffer.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the buffer is not a valid encoded geometry.
pub fn decode_geometry(bytes: &[u8]) -> Result<DecodedGeometry, DecodeError> {
    let mut cursor = Cursor { bytes, pos: 0 };
    if cursor.take(4)? != GEOMETRY_MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let version = cursor.u8()?;
    if version != GEOMETRY_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let face_count = cursor.u32()? as usize;
    let point_count = cursor.u32()? as usize;
    let channel_count = usize::from(cursor.u8()?);

    let headers = (0..channel_count)
        .map(|_| read_header(&mut cursor))
        .collect::<Result<Vec<_>, _>>()?;

    let mut channels = Vec::with_capacity(channel_count);
    for header in headers {
        let len = cursor.u32()? as usize;
        let payload = cursor.take(len)?;
        let count = if header.per_face { face_count } else { point_count };
        let values = read_values(&header, payload, count)?;
        channels.push(DecodedChannel {
            kind: header.kind,
            unique_id: header.unique_id,
            per_face: header.per_face,
            values,
        });
    }

    let index_bits = cursor.u8()?;
    if index_bits == 0 || index_bits > 32 {
        return Err(DecodeError::Corrupt(format!("index width {index_bits}")));
    }
    let len = cursor.u32()? as usize;
    let mut reader = BitReader::new(cursor.take(len)?);
    let mut faces = Vec::with_capacity(face_count.min(bytes.len()));
    for _ in 0..face_count {
        let mut face = [0u32; 3];
        for index in &mut face {
            *index = reader.read(index_bits).ok_or(DecodeError::Truncated)?;
            if *index as usize >= point_count {
                return Err(DecodeError::Corrupt(format!(
                    "face index {index} past {point_count} points"
                )));
            }
        }
        faces.push(face);
    }

    Ok(DecodedGeometry {
        faces,
        point_count,
        channels,
    })
}
