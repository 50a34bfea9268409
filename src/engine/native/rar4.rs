//! RAR 1.5-4.x block parsing.
//!
//! Every block starts with a 7-byte base header:
//!
//! ```text
//! HEAD_CRC   u16   low 16 bits of CRC32 over HEAD_TYPE..end of header
//! HEAD_TYPE  u8
//! HEAD_FLAGS u16
//! HEAD_SIZE  u16   whole header, base included
//! ADD_SIZE   u32   data area size, present with LONG_BLOCK
//! ```

use super::signature::{dos_to_unix_nanos, unix_to_nanos};
use super::{Block, EntryBlock, ParseError};
use crate::crc32::crc32;
use crate::engine::{
    RawName, RHDF_DIRECTORY, RHDF_ENCRYPTED, RHDF_SOLID, RHDF_SPLITAFTER, RHDF_SPLITBEFORE,
};

pub const MAIN_HEAD: u8 = 0x73;
pub const FILE_HEAD: u8 = 0x74;
pub const NEWSUB_HEAD: u8 = 0x7A;
pub const ENDARC_HEAD: u8 = 0x7B;

pub const BASE_HEADER_SIZE: usize = 7;

const LONG_BLOCK: u16 = 0x8000;

/// Main header: block headers are encrypted.
const MHD_PASSWORD: u16 = 0x0080;

// File header flags.
const LHD_SPLIT_BEFORE: u16 = 0x0001;
const LHD_SPLIT_AFTER: u16 = 0x0002;
const LHD_PASSWORD: u16 = 0x0004;
const LHD_SOLID: u16 = 0x0010;
const LHD_WINDOWMASK: u16 = 0x00E0;
const LHD_DIRECTORY: u16 = 0x00E0;
const LHD_LARGE: u16 = 0x0100;
const LHD_UNICODE: u16 = 0x0200;
const LHD_SALT: u16 = 0x0400;
const LHD_EXTTIME: u16 = 0x1000;

const METHOD_STORE: u8 = 0x30;
const FILE_HEADER_MIN: usize = 32;
const MAX_NAME_UNITS: usize = 4096;

/// Fixed part shared by all blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPrefix {
    pub crc: u16,
    pub kind: u8,
    pub flags: u16,
    pub head_size: u16,
}

pub fn parse_prefix(buffer: &[u8]) -> Result<BlockPrefix, ParseError> {
    let base = buffer
        .get(..BASE_HEADER_SIZE)
        .ok_or(ParseError::Truncated {
            needed: BASE_HEADER_SIZE,
            have: buffer.len(),
        })?;
    let prefix = BlockPrefix {
        crc: u16::from_le_bytes([base[0], base[1]]),
        kind: base[2],
        flags: u16::from_le_bytes([base[3], base[4]]),
        head_size: u16::from_le_bytes([base[5], base[6]]),
    };
    if usize::from(prefix.head_size) < BASE_HEADER_SIZE {
        return Err(ParseError::Malformed("header size below base header"));
    }
    Ok(prefix)
}

/// Parse one complete block header (`HEAD_SIZE` bytes).
pub fn parse_block(buffer: &[u8]) -> Result<Block, ParseError> {
    let prefix = parse_prefix(buffer)?;
    let header = buffer
        .get(..usize::from(prefix.head_size))
        .ok_or(ParseError::Truncated {
            needed: usize::from(prefix.head_size),
            have: buffer.len(),
        })?;

    let computed = (crc32(&header[2..]) & 0xFFFF) as u16;
    if computed != prefix.crc {
        return Err(ParseError::Checksum {
            stored: u32::from(prefix.crc),
            computed: u32::from(computed),
        });
    }

    match prefix.kind {
        MAIN_HEAD => Ok(Block::Main {
            encrypted_headers: prefix.flags & MHD_PASSWORD != 0,
        }),
        FILE_HEAD => Ok(Block::Entry(parse_entry(&prefix, header)?)),
        NEWSUB_HEAD => Ok(Block::Other {
            data_size: parse_entry(&prefix, header)?.packed_size,
        }),
        ENDARC_HEAD => Ok(Block::End),
        _ => {
            let data_size = if prefix.flags & LONG_BLOCK != 0 {
                u64::from(read_u32(header, 7)?)
            } else {
                0
            };
            Ok(Block::Other { data_size })
        }
    }
}

fn read_u32(buffer: &[u8], offset: usize) -> Result<u32, ParseError> {
    let bytes = buffer
        .get(offset..offset + 4)
        .ok_or(ParseError::Truncated {
            needed: offset + 4,
            have: buffer.len(),
        })?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn parse_entry(prefix: &BlockPrefix, header: &[u8]) -> Result<EntryBlock, ParseError> {
    if header.len() < FILE_HEADER_MIN {
        return Err(ParseError::Truncated {
            needed: FILE_HEADER_MIN,
            have: header.len(),
        });
    }
    let flags = prefix.flags;

    let mut packed_size = u64::from(read_u32(header, 7)?);
    let mut unpacked_size = u64::from(read_u32(header, 11)?);
    let file_crc = read_u32(header, 16)?;
    let ftime = read_u32(header, 20)?;
    let method = header[25];
    let name_size = usize::from(u16::from_le_bytes([header[26], header[27]]));
    let mut offset = FILE_HEADER_MIN;

    if flags & LHD_LARGE != 0 {
        packed_size |= u64::from(read_u32(header, offset)?) << 32;
        unpacked_size |= u64::from(read_u32(header, offset + 4)?) << 32;
        offset += 8;
    }

    let name_field = header
        .get(offset..offset + name_size)
        .ok_or(ParseError::Malformed("file name runs past header"))?;
    offset += name_size;
    let name = decode_name(name_field, flags & LHD_UNICODE != 0);

    if flags & LHD_SALT != 0 {
        offset += 8;
    }

    let mtime = dos_to_unix_nanos(ftime);
    let (mtime, ctime, atime) = if flags & LHD_EXTTIME != 0 {
        parse_ext_time(header.get(offset..).unwrap_or_default(), mtime)?
    } else {
        (mtime, 0, 0)
    };

    let mut rhdf = 0;
    if flags & LHD_SPLIT_BEFORE != 0 {
        rhdf |= RHDF_SPLITBEFORE;
    }
    if flags & LHD_SPLIT_AFTER != 0 {
        rhdf |= RHDF_SPLITAFTER;
    }
    if flags & LHD_PASSWORD != 0 {
        rhdf |= RHDF_ENCRYPTED;
    }
    if flags & LHD_SOLID != 0 {
        rhdf |= RHDF_SOLID;
    }
    if flags & LHD_WINDOWMASK == LHD_DIRECTORY {
        rhdf |= RHDF_DIRECTORY;
    }

    Ok(EntryBlock {
        name,
        kind: u32::from(prefix.kind),
        flags: rhdf,
        packed_size,
        unpacked_size,
        file_crc: Some(file_crc),
        mtime,
        ctime,
        atime,
        stored: method == METHOD_STORE,
    })
}

/// Decode the name field. With LHD_UNICODE the field holds either a UTF-8
/// name, or a narrow name, a zero byte and the encoded wide name.
fn decode_name(field: &[u8], unicode: bool) -> RawName {
    let zero = field.iter().position(|&b| b == 0);
    match zero {
        Some(zero) if unicode => {
            let mut wide = decode_wide_name(&field[..zero], &field[zero + 1..]);
            for unit in &mut wide {
                if *unit == u16::from(b'\\') {
                    *unit = u16::from(b'/');
                }
            }
            RawName::Wide(wide)
        }
        _ => {
            let end = zero.unwrap_or(field.len());
            let narrow = field[..end]
                .iter()
                .map(|&b| if b == b'\\' { b'/' } else { b })
                .collect();
            RawName::Narrow(narrow)
        }
    }
}

/// RAR's compact wide-name encoding.
///
/// A high byte is followed by groups of four 2-bit opcodes, each group
/// preceded by its flag byte:
///
/// - `0`: one byte, high byte zero
/// - `1`: one byte, with the shared high byte
/// - `2`: two bytes, little-endian unit
/// - `3`: a run copied from the narrow name, optionally corrected
fn decode_wide_name(narrow: &[u8], encoded: &[u8]) -> Vec<u16> {
    let mut out: Vec<u16> = Vec::with_capacity(narrow.len());
    let Some((&high, encoded)) = encoded.split_first() else {
        return narrow.iter().map(|&b| u16::from(b)).collect();
    };
    let high = u16::from(high) << 8;

    let mut pos = 0;
    let mut flags = 0u8;
    let mut flag_bits = 0;
    while pos < encoded.len() && out.len() < MAX_NAME_UNITS {
        if flag_bits == 0 {
            flags = encoded[pos];
            pos += 1;
            flag_bits = 8;
        }
        match flags >> 6 {
            0 => {
                let Some(&b) = encoded.get(pos) else { break };
                out.push(u16::from(b));
                pos += 1;
            }
            1 => {
                let Some(&b) = encoded.get(pos) else { break };
                out.push(u16::from(b) | high);
                pos += 1;
            }
            2 => {
                let Some(pair) = encoded.get(pos..pos + 2) else { break };
                out.push(u16::from_le_bytes([pair[0], pair[1]]));
                pos += 2;
            }
            _ => {
                let Some(&length) = encoded.get(pos) else { break };
                pos += 1;
                if length & 0x80 != 0 {
                    let Some(&correction) = encoded.get(pos) else { break };
                    pos += 1;
                    for _ in 0..usize::from(length & 0x7F) + 2 {
                        let Some(&c) = narrow.get(out.len()) else { break };
                        out.push(u16::from(c.wrapping_add(correction)) | high);
                    }
                } else {
                    for _ in 0..usize::from(length) + 2 {
                        let Some(&c) = narrow.get(out.len()) else { break };
                        out.push(u16::from(c));
                    }
                }
            }
        }
        flags <<= 2;
        flag_bits -= 2;
    }
    out
}

/// Extended time record: mtime, ctime, atime (and archive time, ignored),
/// each with a 4-bit mode nibble, high nibble first.
fn parse_ext_time(data: &[u8], dos_mtime: u64) -> Result<(u64, u64, u64), ParseError> {
    let truncated = || ParseError::Malformed("extended time runs past header");
    let flags = data.get(..2).ok_or_else(truncated)?;
    let flags = u16::from_le_bytes([flags[0], flags[1]]);
    let mut pos = 2;
    let mut times = [0u64; 4];

    for (i, slot) in times.iter_mut().enumerate() {
        let mode = (flags >> ((3 - i) * 4)) & 0x0F;
        if mode & 0x08 == 0 {
            continue;
        }
        let base = if i == 0 {
            dos_mtime
        } else {
            let raw = data.get(pos..pos + 4).ok_or_else(truncated)?;
            pos += 4;
            dos_to_unix_nanos(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
        };

        // Remainder in 100ns units; the stored bytes are its top `count`
        // bytes, least significant first.
        let count = usize::from(mode & 0x03);
        let mut remainder = 0u32;
        for j in 0..count {
            let byte = *data.get(pos).ok_or_else(truncated)?;
            pos += 1;
            remainder |= u32::from(byte) << ((j + 3 - count) * 8);
        }
        let odd_second = if mode & 0x04 != 0 { unix_to_nanos(1, 0) } else { 0 };
        *slot = base + u64::from(remainder) * 100 + odd_second;
    }

    Ok((times[0], times[1], times[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seal(mut header: Vec<u8>) -> Vec<u8> {
        let size = header.len() as u16;
        header[5..7].copy_from_slice(&size.to_le_bytes());
        let crc = (crc32(&header[2..]) & 0xFFFF) as u16;
        header[0..2].copy_from_slice(&crc.to_le_bytes());
        header
    }

    fn file_header(flags: u16, name: &[u8], tail: &[u8]) -> Vec<u8> {
        let mut h = vec![0u8; 32];
        h[2] = FILE_HEAD;
        h[3..5].copy_from_slice(&(flags | LONG_BLOCK).to_le_bytes());
        h[7..11].copy_from_slice(&5u32.to_le_bytes());
        h[11..15].copy_from_slice(&5u32.to_le_bytes());
        h[16..20].copy_from_slice(&0x3610_a686u32.to_le_bytes());
        h[25] = METHOD_STORE;
        h[26..28].copy_from_slice(&(name.len() as u16).to_le_bytes());
        h.extend_from_slice(name);
        h.extend_from_slice(tail);
        seal(h)
    }

    #[test]
    fn test_parse_file_header() {
        let header = file_header(0, b"dir\\1.txt", &[]);
        let Block::Entry(entry) = parse_block(&header).unwrap() else {
            panic!("expected entry");
        };
        assert_eq!(entry.name, RawName::Narrow(b"dir/1.txt".to_vec()));
        assert_eq!(entry.packed_size, 5);
        assert_eq!(entry.file_crc, Some(0x3610_a686));
        assert!(entry.stored);
        assert_eq!(entry.flags, 0);
    }

    #[test]
    fn test_directory_and_solid_bits() {
        let header = file_header(LHD_DIRECTORY | LHD_SOLID, b"dir", &[]);
        let Block::Entry(entry) = parse_block(&header).unwrap() else {
            panic!("expected entry");
        };
        assert_eq!(entry.flags, RHDF_DIRECTORY | RHDF_SOLID);
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut header = file_header(0, b"a", &[]);
        header[0] ^= 0xFF;
        assert!(matches!(
            parse_block(&header),
            Err(ParseError::Checksum { .. })
        ));
    }

    #[test]
    fn test_name_past_header() {
        let mut header = file_header(0, b"abc", &[]);
        header[26] = 200;
        let header = seal(header);
        assert!(matches!(parse_block(&header), Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_wide_name_with_full_units() {
        // "中文.txt": high byte 0, then flag bytes of four 2-byte units.
        let units: Vec<u16> = "中文.txt".encode_utf16().collect();
        let mut encoded = vec![0u8];
        for group in units.chunks(4) {
            encoded.push(0xAA);
            for unit in group {
                encoded.extend_from_slice(&unit.to_le_bytes());
            }
        }
        let mut field = b"??.txt".to_vec();
        field.push(0);
        field.extend_from_slice(&encoded);

        assert_eq!(decode_name(&field, true), RawName::Wide(units));
    }

    #[test]
    fn test_wide_name_copy_run() {
        // Opcode 3 copies a run of length + 2 from the narrow name.
        let field = [b'a', b'b', b'c', 0, 0x00, 0xC0, 0x01];
        assert_eq!(
            decode_name(&field, true),
            RawName::Wide(vec![u16::from(b'a'), u16::from(b'b'), u16::from(b'c')])
        );
    }

    #[test]
    fn test_unicode_flag_without_encoded_part_is_utf8() {
        let name = "中文.txt".as_bytes();
        assert_eq!(decode_name(name, true), RawName::Narrow(name.to_vec()));
    }

    #[test]
    fn test_ext_time() {
        // mtime with 3 remainder bytes, ctime with a DOS base and none.
        let flags: u16 = (0x0B << 12) | (0x08 << 8);
        let mut tail = flags.to_le_bytes().to_vec();
        tail.extend_from_slice(&[0x00, 0x00, 0x05]);
        let dos: u32 = (40 << 25) | (9 << 21) | (13 << 16) | (12 << 11) | (26 << 5) | 20;
        tail.extend_from_slice(&dos.to_le_bytes());

        let (mtime, ctime, atime) = parse_ext_time(&tail, 1_000).unwrap();
        // Remainder bytes fill from the low end: 0x05 << 16.
        assert_eq!(mtime, 1_000 + (5u64 << 16) * 100);
        assert_eq!(ctime, 1_600_000_000_000_000_000);
        assert_eq!(atime, 0);
    }

    #[test]
    fn test_end_and_unknown_blocks() {
        let end = seal(vec![0, 0, ENDARC_HEAD, 0x00, 0x40, 0, 0]);
        assert!(matches!(parse_block(&end), Ok(Block::End)));

        let mut comment = vec![0, 0, 0x75, 0x00, 0x80, 0, 0];
        comment.extend_from_slice(&9u32.to_le_bytes());
        let comment = seal(comment);
        assert!(matches!(
            parse_block(&comment),
            Ok(Block::Other { data_size: 9 })
        ));
    }
}
