//! Variable-length integer (vint) parsing for RAR5.
//!
//! Each byte contributes 7 bits of data, low bits first; the high bit says
//! whether more bytes follow.

/// Read a vint from the start of `data`.
/// Returns the value and the number of bytes consumed.
#[inline]
pub fn read_vint(data: &[u8]) -> Option<(u64, usize)> {
    let mut result = 0u64;

    for (i, &byte) in data.iter().enumerate().take(10) {
        result |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }
    }

    // Ran out of bytes, or longer than any u64 encoding
    None
}

/// Cursor over a RAR5 header body.
pub struct VintReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> VintReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    #[inline]
    pub fn read(&mut self) -> Option<u64> {
        let (value, consumed) = read_vint(self.data.get(self.offset..)?)?;
        self.offset += consumed;
        Some(value)
    }

    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Option<&'a [u8]> {
        let end = self.offset.checked_add(count)?;
        let slice = self.data.get(self.offset..end)?;
        self.offset = end;
        Some(slice)
    }

    #[inline]
    pub fn read_u32_le(&mut self) -> Option<u32> {
        let bytes = self.read_bytes(4)?;
        Some(u32::from_le_bytes(bytes.try_into().ok()?))
    }

    #[inline]
    pub fn read_u64_le(&mut self) -> Option<u64> {
        let bytes = self.read_bytes(8)?;
        Some(u64::from_le_bytes(bytes.try_into().ok()?))
    }

    pub fn position(&self) -> usize {
        self.offset
    }
}
