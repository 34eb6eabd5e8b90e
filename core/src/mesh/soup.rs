//! Triangle soup accumulation and point de-duplication.
//!
//! The encoder writes attribute values per face corner. [`TriangleSoupBuilder`]
//! collects those values and, on [`finalize`](TriangleSoupBuilder::finalize),
//! merges identical corners into shared points and produces an indexed mesh.

use std::collections::HashMap;

use super::channels::{ChannelKind, ChannelValues};
use super::error::FinalizeError;

struct SoupChannel {
    kind: ChannelKind,
    unique_id: u32,
    values: ChannelValues,
    written: Vec<bool>,
}

impl SoupChannel {
    fn slots_per_face(&self) -> usize {
        if self.kind.is_per_face() { 1 } else { 3 }
    }
}

/// Collects per-corner attribute values for a fixed number of faces.
pub(crate) struct TriangleSoupBuilder {
    face_count: usize,
    channels: Vec<SoupChannel>,
}

impl TriangleSoupBuilder {
    pub(crate) fn new(face_count: usize) -> Self {
        Self {
            face_count,
            channels: Vec::new(),
        }
    }

    /// Add a channel. Its unique id is its insertion index.
    pub(crate) fn add_channel(&mut self, kind: ChannelKind) -> usize {
        let slots = if kind.is_per_face() {
            self.face_count
        } else {
            self.face_count * 3
        };
        let index = self.channels.len();
        self.channels.push(SoupChannel {
            kind,
            unique_id: index as u32,
            values: ChannelValues::zeroed(kind.data_type(), slots * kind.components()),
            written: vec![false; slots],
        });
        index
    }

    pub(crate) fn set_corner_f32(&mut self, channel: usize, face: usize, corner: usize, value: &[f32]) {
        let ch = &mut self.channels[channel];
        let slot = face * 3 + corner;
        let n = ch.kind.components();
        if let ChannelValues::Float32(values) = &mut ch.values {
            values[slot * n..slot * n + n].copy_from_slice(&value[..n]);
            ch.written[slot] = true;
        }
    }

    pub(crate) fn set_corner_i32(&mut self, channel: usize, face: usize, corner: usize, value: i32) {
        let ch = &mut self.channels[channel];
        let slot = face * 3 + corner;
        if let ChannelValues::Int32(values) = &mut ch.values {
            values[slot] = value;
            ch.written[slot] = true;
        }
    }

    pub(crate) fn set_face_u16(&mut self, channel: usize, face: usize, value: u16) {
        let ch = &mut self.channels[channel];
        if let ChannelValues::UInt16(values) = &mut ch.values {
            values[face] = value;
            ch.written[face] = true;
        }
    }

    fn validate(&self) -> Result<(), FinalizeError> {
        for face in 0..self.face_count {
            for ch in &self.channels {
                let per_face = ch.slots_per_face();
                let first = face * per_face;
                if ch.written[first..first + per_face].iter().any(|w| !w) {
                    return Err(FinalizeError::IncompleteFace {
                        face,
                        channel: ch.kind,
                    });
                }
                if let Some(values) = ch.values.as_f32() {
                    let n = ch.kind.components();
                    let scalars = &values[first * n..(first + per_face) * n];
                    if scalars.iter().any(|v| !v.is_finite()) {
                        return Err(FinalizeError::NonFinite {
                            face,
                            channel: ch.kind,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Merge identical corners into points and build the face list.
    pub(crate) fn finalize(self) -> Result<SoupMesh, FinalizeError> {
        self.validate()?;

        let corner_channels: Vec<&SoupChannel> = self
            .channels
            .iter()
            .filter(|ch| !ch.kind.is_per_face())
            .collect();

        let mut lookup: HashMap<Vec<u32>, u32> = HashMap::with_capacity(self.face_count * 3);
        let mut point_bits: Vec<Vec<u32>> = vec![Vec::new(); corner_channels.len()];
        let mut faces = Vec::with_capacity(self.face_count);
        let mut key = Vec::new();
        let mut degenerate = 0usize;

        for face in 0..self.face_count {
            let mut indices = [0u32; 3];
            for (corner, index) in indices.iter_mut().enumerate() {
                let slot = face * 3 + corner;
                key.clear();
                for ch in &corner_channels {
                    let n = ch.kind.components();
                    key.extend((0..n).map(|c| ch.values.bits_at(slot * n + c)));
                }
                let next = lookup.len();
                let existing = lookup.get(&key).copied();
                *index = match existing {
                    Some(point) => point,
                    None => {
                        let point = u32::try_from(next)
                            .map_err(|_| FinalizeError::TooManyPoints(next + 1))?;
                        let mut offset = 0;
                        for (bits, ch) in point_bits.iter_mut().zip(&corner_channels) {
                            let n = ch.kind.components();
                            bits.extend_from_slice(&key[offset..offset + n]);
                            offset += n;
                        }
                        lookup.insert(key.clone(), point);
                        point
                    }
                };
            }
            if indices[0] == indices[1] || indices[1] == indices[2] || indices[0] == indices[2] {
                degenerate += 1;
            }
            faces.push(indices);
        }

        if self.face_count > 0 && degenerate == self.face_count {
            return Err(FinalizeError::DegenerateTopology {
                faces: self.face_count,
            });
        }
        if degenerate > 0 {
            log::debug!("{degenerate} of {} faces are degenerate", self.face_count);
        }

        let point_count = lookup.len();
        let mut corner_bits = point_bits.into_iter();
        let channels = self
            .channels
            .iter()
            .map(|ch| {
                let values = if ch.kind.is_per_face() {
                    ch.values.clone()
                } else {
                    let bits = corner_bits.next().unwrap_or_default();
                    ChannelValues::from_bits(ch.kind.data_type(), &bits)
                };
                FinalChannel {
                    kind: ch.kind,
                    unique_id: ch.unique_id,
                    values,
                }
            })
            .collect();

        Ok(SoupMesh {
            faces,
            point_count,
            channels,
        })
    }
}

/// One channel of a finalized mesh, holding per-point or per-face values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FinalChannel {
    pub(crate) kind: ChannelKind,
    pub(crate) unique_id: u32,
    pub(crate) values: ChannelValues,
}

/// Indexed mesh produced by [`TriangleSoupBuilder::finalize`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SoupMesh {
    pub(crate) faces: Vec<[u32; 3]>,
    pub(crate) point_count: usize,
    pub(crate) channels: Vec<FinalChannel>,
}

impl SoupMesh {
    /// Re-tag a channel with a new unique id.
    pub(crate) fn set_unique_id(&mut self, kind: ChannelKind, unique_id: u32) {
        if let Some(ch) = self.channels.iter_mut().find(|ch| ch.kind == kind) {
            ch.unique_id = unique_id;
        }
    }
}
