//! Compact-size integers and length-prefixed vectors.
//!
//! The envelope concatenates variable-length fields, each prefixed by
//! the chain's "compact size" integer: one byte below 253, otherwise a
//! marker byte (253/254/255) followed by a 2-, 4-, or 8-byte
//! little-endian extension. Truncation is detected at every frame
//! boundary.

use depinchat_types::{DepinError, Result};

/// Largest value accepted from an 8-byte extension (2^53 − 1), so the
/// value survives a round-trip through JSON numbers.
pub const MAX_COMPACT_SIZE: u64 = (1 << 53) - 1;

/// A cursor over envelope bytes.
///
/// All reads advance the offset; any read past the end fails rather
/// than panicking.
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Bytes remaining after the cursor.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(DepinError::Message {
                reason: format!(
                    "envelope truncated: need {n} bytes at offset {}, have {}",
                    self.offset,
                    self.remaining()
                ),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    /// Reads exactly `N` bytes.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Reads a compact-size integer.
    pub fn read_compact_size(&mut self) -> Result<u64> {
        let first = self.take(1)?[0];
        let value = match first {
            0..=252 => u64::from(first),
            253 => {
                let b = self.take(2)?;
                u64::from(u16::from_le_bytes([b[0], b[1]]))
            }
            254 => {
                let b = self.take(4)?;
                u64::from(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }
            255 => {
                let b = self.take(8)?;
                let v = u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]);
                if v > MAX_COMPACT_SIZE {
                    return Err(DepinError::Message {
                        reason: format!("compact size {v} exceeds 2^53-1"),
                    });
                }
                v
            }
        };
        Ok(value)
    }

    /// Reads a length-prefixed vector.
    pub fn read_vector(&mut self) -> Result<&'a [u8]> {
        let len = self.read_compact_size()?;
        let len = usize::try_from(len).map_err(|_| DepinError::Message {
            reason: format!("vector length {len} does not fit this platform"),
        })?;
        self.take(len)
    }

    /// Skips a length-prefixed vector without keeping the bytes.
    pub fn skip_vector(&mut self) -> Result<()> {
        self.read_vector().map(|_| ())
    }
}

/// Appends a compact-size integer to `out`.
pub fn write_compact_size(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=252 => out.push(value as u8),
        253..=0xFFFF => {
            out.push(253);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(254);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(255);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Appends a length-prefixed vector to `out`.
pub fn write_vector(out: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
