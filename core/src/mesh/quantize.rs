//! Fixed bit-depth quantization and bit packing.

/// Number of bits needed to store values in `0..=max_value` (at least 1).
pub(crate) fn bits_needed(max_value: u32) -> u8 {
    (u32::BITS - max_value.leading_zeros()).max(1) as u8
}

/// Packs unsigned values of arbitrary width (1..=32 bits) LSB-first.
pub(crate) struct BitWriter {
    bytes: Vec<u8>,
    acc: u64,
    pending: u32,
}

impl BitWriter {
    pub(crate) fn with_capacity(bits: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bits.div_ceil(8)),
            acc: 0,
            pending: 0,
        }
    }

    pub(crate) fn write(&mut self, value: u32, bits: u8) {
        debug_assert!((1..=32).contains(&bits));
        let mask = if bits == 32 { u32::MAX } else { (1u32 << bits) - 1 };
        self.acc |= u64::from(value & mask) << self.pending;
        self.pending += u32::from(bits);
        while self.pending >= 8 {
            self.bytes.push(self.acc as u8);
            self.acc >>= 8;
            self.pending -= 8;
        }
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        if self.pending > 0 {
            self.bytes.push(self.acc as u8);
        }
        self.bytes
    }
}

/// Reads values written by [`BitWriter`].
pub(crate) struct BitReader<'a> {
    bytes: &'a [u8],
    byte_pos: usize,
    acc: u64,
    available: u32,
}

impl<'a> BitReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            byte_pos: 0,
            acc: 0,
            available: 0,
        }
    }

    /// Reads the next `bits` wide value, `None` when the input runs out.
    pub(crate) fn read(&mut self, bits: u8) -> Option<u32> {
        let bits = u32::from(bits);
        while self.available < bits {
            let byte = *self.bytes.get(self.byte_pos)?;
            self.acc |= u64::from(byte) << self.available;
            self.available += 8;
            self.byte_pos += 1;
        }
        let mask = if bits == 32 { u64::from(u32::MAX) } else { (1u64 << bits) - 1 };
        let value = (self.acc & mask) as u32;
        self.acc >>= bits;
        self.available -= bits;
        Some(value)
    }
}

/// Uniform quantizer over a per-component minimum and one shared range.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Quantizer {
    pub(crate) min: Vec<f32>,
    pub(crate) range: f32,
    pub(crate) bits: u8,
}

impl Quantizer {
    /// Fit a quantizer to interleaved values with `components` per entry.
    pub(crate) fn fit(values: &[f32], components: usize, bits: u8) -> Self {
        let mut min = vec![f32::MAX; components];
        let mut max = vec![f32::MIN; components];
        for chunk in values.chunks_exact(components) {
            for (c, &v) in chunk.iter().enumerate() {
                min[c] = min[c].min(v);
                max[c] = max[c].max(v);
            }
        }
        if values.is_empty() {
            min.iter_mut().for_each(|m| *m = 0.0);
            max.iter_mut().for_each(|m| *m = 0.0);
        }
        let range = min
            .iter()
            .zip(&max)
            .map(|(lo, hi)| hi - lo)
            .fold(0.0f32, f32::max);
        Self {
            min,
            range: if range > 0.0 { range } else { 1.0 },
            bits,
        }
    }

    pub(crate) fn max_quantized(&self) -> u32 {
        (1u32 << self.bits) - 1
    }

    pub(crate) fn quantize(&self, value: f32, component: usize) -> u32 {
        let max_q = self.max_quantized();
        let normalized = (value - self.min[component]) / self.range;
        let q = (normalized * max_q as f32 + 0.5).floor();
        q.clamp(0.0, max_q as f32) as u32
    }

    pub(crate) fn dequantize(&self, quantized: u32, component: usize) -> f32 {
        self.min[component] + quantized as f32 / self.max_quantized() as f32 * self.range
    }

    /// Largest reconstruction error for values inside the fitted bounds.
    pub(crate) fn max_error(&self) -> f32 {
        self.range / self.max_quantized() as f32 * 0.5
    }
}
