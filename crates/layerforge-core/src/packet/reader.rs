use super::error::PacketError;

/// Missing-input report from `LayerReader`, turned into a `PacketError` by
/// the layer being dissected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub needed: usize,
    pub actual: usize,
}

impl Shortfall {
    pub fn into_error(self, layer: &str) -> PacketError {
        PacketError::TooShort {
            layer: layer.to_string(),
            needed: self.needed,
            actual: self.actual,
        }
    }
}

/// Cursor over a dissected byte sequence, with MSB-first bit access.
pub struct LayerReader<'a> {
    payload: &'a [u8],
    pos: usize,
    bit: u32,
}

impl<'a> LayerReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            payload,
            pos: 0,
            bit: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_aligned(&self) -> bool {
        self.bit == 0
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.payload[self.pos.min(self.payload.len())..]
    }

    pub fn require_len(&self, needed: usize) -> Result<(), Shortfall> {
        let end = self.pos + needed;
        if self.payload.len() < end {
            return Err(Shortfall {
                needed: end,
                actual: self.payload.len(),
            });
        }
        Ok(())
    }

    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], Shortfall> {
        self.require_len(len)?;
        let bytes = &self.payload[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_uint(&mut self, width: usize) -> Result<u64, Shortfall> {
        let bytes = self.read_slice(width)?;
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    pub fn read_bits(&mut self, count: u32) -> Result<u64, Shortfall> {
        let mut value = 0u64;
        for _ in 0..count {
            let byte = *self.payload.get(self.pos).ok_or(Shortfall {
                needed: self.pos + 1,
                actual: self.payload.len(),
            })?;
            let bit = (byte >> (7 - self.bit)) & 1;
            value = (value << 1) | u64::from(bit);
            self.bit += 1;
            if self.bit == 8 {
                self.bit = 0;
                self.pos += 1;
            }
        }
        Ok(value)
    }

    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = self.remaining();
        self.pos = self.payload.len();
        rest
    }
}

/// Accumulates consecutive bit fields until they fill whole bytes.
#[derive(Debug, Default)]
pub struct BitWriter {
    acc: u64,
    count: u32,
}

impl BitWriter {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append the low `bits` bits of `value`. A run longer than 64 bits
    /// before a byte boundary cannot be held and is reported against `field`.
    pub fn push(&mut self, field: &str, value: u64, bits: u32) -> Result<(), PacketError> {
        let total = self.count + bits;
        if total > u64::BITS {
            return Err(PacketError::encode(
                field,
                format!("bit run of {total} bits does not fit in 64 bits"),
            ));
        }
        self.acc = match bits {
            0 => self.acc,
            64 => value,
            _ => (self.acc << bits) | (value & ((1u64 << bits) - 1)),
        };
        self.count = total;
        Ok(())
    }

    /// Drain the accumulated bits into `out` once they form whole bytes.
    pub fn flush_into(&mut self, out: &mut Vec<u8>) {
        if self.count == 0 || self.count % 8 != 0 {
            return;
        }
        let bytes = (self.count / 8) as usize;
        for idx in (0..bytes).rev() {
            out.push((self.acc >> (idx * 8)) as u8);
        }
        self.acc = 0;
        self.count = 0;
    }
}
