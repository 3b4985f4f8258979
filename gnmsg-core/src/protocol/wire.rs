//! Binary field reader over a captured wire buffer.
//!
//! Trace lines carry protocol bytes as text: packed hex digit pairs in
//! current clients, space-separated decimal byte values in 9.x clients.
//! Both normalize to a plain byte vector here, and every decoder then walks
//! that vector with a [`WireReader`] cursor.
//!
//! All multi-byte integers are big-endian two's-complement.

use crate::error::DecodeError;

/// Result type for field reads.
pub type Result<T> = std::result::Result<T, DecodeError>;

// =============================================================================
// Payload text normalization
// =============================================================================

/// Parse a packed hex payload (`"0000000700"...`) into bytes.
///
/// A trailing odd nibble is dropped; the logger occasionally cuts a line in
/// the middle of a byte.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    if !text.is_ascii() {
        return Err(DecodeError::InvalidHex("non-ascii payload".to_string()));
    }
    let even = &text[..text.len() - (text.len() % 2)];
    hex::decode(even).map_err(|e| DecodeError::InvalidHex(e.to_string()))
}

/// Parse a 9.x style payload of space-separated decimal byte values.
pub fn parse_decimal_bytes(text: &str) -> Result<Vec<u8>> {
    text.split_whitespace()
        .map(|b| {
            b.parse::<u8>()
                .map_err(|_| DecodeError::InvalidHex(format!("not a byte value: {}", b)))
        })
        .collect()
}

/// Encode bytes as space-separated lowercase hex pairs.
pub fn hex_encode(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// WireReader
// =============================================================================

/// Cursor over a byte buffer.
///
/// Every read either consumes exactly the bytes of the value or fails with
/// [`DecodeError::MalformedWireBuffer`] without moving the cursor.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        WireReader { data, pos: 0 }
    }

    /// Reader starting at `pos` (clamped to the end of the buffer).
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        WireReader {
            data,
            pos: pos.min(data.len()),
        }
    }

    /// Current byte offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(DecodeError::MalformedWireBuffer {
                offset: self.pos,
                wanted: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Look at the next byte without consuming it.
    pub fn peek_u8(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(DecodeError::MalformedWireBuffer {
                offset: self.pos,
                wanted: 1,
                available: 0,
            })
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_be_bytes(self.take_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Read a byte count taken from a wire field; negative counts are errors.
    pub fn read_sized(&mut self, n: i64) -> Result<&'a [u8]> {
        let n = usize::try_from(n).map_err(|_| {
            DecodeError::invariant(format!("negative length {} at offset {}", n, self.pos))
        })?;
        self.take(n)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Everything after the cursor; consumes it.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    /// Variable-length unsigned integer: 7-bit groups, low group first,
    /// high bit set on every group but the last.
    pub fn read_unsigned_vl(&mut self) -> Result<u64> {
        let start = self.pos;
        let mut value: u64 = 0;
        for group in 0..10 {
            let b = match self.read_u8() {
                Ok(b) => b,
                Err(e) => {
                    self.pos = start;
                    return Err(e);
                }
            };
            value |= u64::from(b & 0x7f) << (7 * group);
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        self.pos = start;
        Err(DecodeError::MalformedVarint { offset: start })
    }

    /// Array length: 0..=252 literal, 0xFD then i32, 0xFE then i16,
    /// 0xFF means null (-1).
    pub fn read_array_length(&mut self) -> Result<i32> {
        match self.read_u8()? {
            0xFF => Ok(-1),
            0xFE => Ok(i32::from(self.read_i16()?)),
            0xFD => self.read_i32(),
            n => Ok(i32::from(n)),
        }
    }
}
