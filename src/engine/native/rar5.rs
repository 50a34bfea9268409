//! RAR 5.0 block parsing.
//!
//! RAR5 headers use variable-length integers and a full CRC32:
//!
//! ```text
//! HEAD_CRC    u32   CRC32 from HEAD_SIZE to the end of the header
//! HEAD_SIZE   vint  bytes from HEAD_TYPE to the end of the header
//! HEAD_TYPE   vint
//! HEAD_FLAGS  vint
//! EXTRA_SIZE  vint  with HFL_EXTRA; the extra area ends the header
//! DATA_SIZE   vint  with HFL_DATA
//! ...         type-specific fields
//! ```

use super::signature::{filetime_to_unix_nanos, unix_to_nanos};
use super::vint::{read_vint, VintReader};
use super::{Block, EntryBlock, ParseError};
use crate::crc32::crc32;
use crate::engine::{
    RawName, RHDF_DIRECTORY, RHDF_ENCRYPTED, RHDF_SOLID, RHDF_SPLITAFTER, RHDF_SPLITBEFORE,
};

pub const HEAD_MAIN: u64 = 1;
pub const HEAD_FILE: u64 = 2;
pub const HEAD_SERVICE: u64 = 3;
pub const HEAD_CRYPT: u64 = 4;
pub const HEAD_ENDARC: u64 = 5;

/// CRC32 plus the longest allowed HEAD_SIZE vint.
pub const PREFIX_SIZE: usize = 7;

/// HEAD_SIZE may not exceed this.
const MAX_HEADER_SIZE: u64 = 2 * 1024 * 1024;

// Common header flags.
const HFL_EXTRA: u64 = 0x0001;
const HFL_DATA: u64 = 0x0002;
const HFL_SKIPIFUNKNOWN: u64 = 0x0004;
const HFL_SPLITBEFORE: u64 = 0x0008;
const HFL_SPLITAFTER: u64 = 0x0010;

// File header flags.
const FHFL_DIRECTORY: u64 = 0x0001;
const FHFL_UTIME: u64 = 0x0002;
const FHFL_CRC32: u64 = 0x0004;

// Compression info.
const FCI_SOLID: u64 = 0x0040;
const FCI_METHOD_SHIFT: u64 = 7;

// Extra record types in file headers.
const FHEXTRA_CRYPT: u64 = 0x01;
const FHEXTRA_HTIME: u64 = 0x03;

// Time record flags.
const FHEXTRA_HTIME_UNIXTIME: u64 = 0x01;
const FHEXTRA_HTIME_MTIME: u64 = 0x02;
const FHEXTRA_HTIME_CTIME: u64 = 0x04;
const FHEXTRA_HTIME_ATIME: u64 = 0x08;
const FHEXTRA_HTIME_UNIX_NS: u64 = 0x10;

/// Total header length (CRC included) from the first bytes of a block.
pub fn header_len(prefix: &[u8]) -> Result<usize, ParseError> {
    let size_field = prefix.get(4..).ok_or(ParseError::Truncated {
        needed: PREFIX_SIZE,
        have: prefix.len(),
    })?;
    let (size, size_len) = read_vint(&size_field[..size_field.len().min(3)])
        .ok_or(ParseError::Malformed("header size is not a valid vint"))?;
    if size == 0 || size > MAX_HEADER_SIZE {
        return Err(ParseError::Malformed("header size out of range"));
    }
    Ok(4 + size_len + size as usize)
}

/// Parse one complete block header.
pub fn parse_block(buffer: &[u8]) -> Result<Block, ParseError> {
    let total = header_len(buffer)?;
    let header = buffer.get(..total).ok_or(ParseError::Truncated {
        needed: total,
        have: buffer.len(),
    })?;

    let stored = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let computed = crc32(&header[4..]);
    if stored != computed {
        return Err(ParseError::Checksum { stored, computed });
    }

    let malformed = || ParseError::Malformed("header fields run past header");
    let mut reader = VintReader::new(header);
    reader.read_bytes(4).ok_or_else(malformed)?;
    reader.read().ok_or_else(malformed)?;
    let kind = reader.read().ok_or_else(malformed)?;
    let flags = reader.read().ok_or_else(malformed)?;
    let extra_size = if flags & HFL_EXTRA != 0 {
        reader.read().ok_or_else(malformed)?
    } else {
        0
    };
    let data_size = if flags & HFL_DATA != 0 {
        reader.read().ok_or_else(malformed)?
    } else {
        0
    };

    let extra_start = usize::try_from(extra_size)
        .ok()
        .and_then(|size| total.checked_sub(size))
        .filter(|&start| start >= reader.position())
        .ok_or(ParseError::Malformed("extra area larger than header"))?;
    let extra = &header[extra_start..];

    match kind {
        HEAD_MAIN => Ok(Block::Main {
            encrypted_headers: false,
        }),
        HEAD_FILE => Ok(Block::Entry(parse_file(
            &mut reader,
            flags,
            data_size,
            extra,
        )?)),
        HEAD_SERVICE => Ok(Block::Other { data_size }),
        HEAD_CRYPT => Ok(Block::Encryption),
        HEAD_ENDARC => Ok(Block::End),
        _ if flags & HFL_SKIPIFUNKNOWN != 0 => Ok(Block::Other { data_size }),
        _ => Err(ParseError::Malformed("unknown header type")),
    }
}

fn parse_file(
    reader: &mut VintReader<'_>,
    header_flags: u64,
    packed_size: u64,
    extra: &[u8],
) -> Result<EntryBlock, ParseError> {
    let malformed = || ParseError::Malformed("file header fields run past header");

    let file_flags = reader.read().ok_or_else(malformed)?;
    let unpacked_size = reader.read().ok_or_else(malformed)?;
    let _attributes = reader.read().ok_or_else(malformed)?;
    let mut mtime = if file_flags & FHFL_UTIME != 0 {
        unix_to_nanos(reader.read_u32_le().ok_or_else(malformed)?, 0)
    } else {
        0
    };
    let file_crc = if file_flags & FHFL_CRC32 != 0 {
        Some(reader.read_u32_le().ok_or_else(malformed)?)
    } else {
        None
    };
    let compression = reader.read().ok_or_else(malformed)?;
    let _host_os = reader.read().ok_or_else(malformed)?;
    let name_len = reader.read().ok_or_else(malformed)?;
    let name_len = usize::try_from(name_len).map_err(|_| malformed())?;
    let name = reader.read_bytes(name_len).ok_or_else(malformed)?;

    let mut rhdf = 0;
    let mut ctime = 0;
    let mut atime = 0;

    for (record_type, data) in ExtraRecords::new(extra) {
        match record_type {
            FHEXTRA_CRYPT => rhdf |= RHDF_ENCRYPTED,
            FHEXTRA_HTIME => {
                let times = parse_time_record(data)?;
                mtime = times[0].unwrap_or(mtime);
                ctime = times[1].unwrap_or(ctime);
                atime = times[2].unwrap_or(atime);
            }
            _ => {}
        }
    }

    if header_flags & HFL_SPLITBEFORE != 0 {
        rhdf |= RHDF_SPLITBEFORE;
    }
    if header_flags & HFL_SPLITAFTER != 0 {
        rhdf |= RHDF_SPLITAFTER;
    }
    if compression & FCI_SOLID != 0 {
        rhdf |= RHDF_SOLID;
    }
    if file_flags & FHFL_DIRECTORY != 0 {
        rhdf |= RHDF_DIRECTORY;
    }

    Ok(EntryBlock {
        name: RawName::Narrow(name.to_vec()),
        kind: HEAD_FILE as u32,
        flags: rhdf,
        packed_size,
        unpacked_size,
        file_crc,
        mtime,
        ctime,
        atime,
        stored: (compression >> FCI_METHOD_SHIFT) & 0x07 == 0,
    })
}

/// Walks `size, type, data` records of an extra area. Stops at the first
/// record that doesn't fit.
struct ExtraRecords<'a> {
    data: &'a [u8],
}

impl<'a> ExtraRecords<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for ExtraRecords<'a> {
    type Item = (u64, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (size, size_len) = read_vint(self.data)?;
        let end = size_len.checked_add(usize::try_from(size).ok()?)?;
        let record = self.data.get(size_len..end)?;
        self.data = &self.data[end..];

        let (record_type, type_len) = read_vint(record)?;
        Some((record_type, &record[type_len..]))
    }
}

/// mtime, ctime, atime from a time record, each `None` when absent.
fn parse_time_record(data: &[u8]) -> Result<[Option<u64>; 3], ParseError> {
    let malformed = || ParseError::Malformed("time record runs past record");
    let mut reader = VintReader::new(data);
    let flags = reader.read().ok_or_else(malformed)?;
    let unix = flags & FHEXTRA_HTIME_UNIXTIME != 0;

    let present = [
        flags & FHEXTRA_HTIME_MTIME != 0,
        flags & FHEXTRA_HTIME_CTIME != 0,
        flags & FHEXTRA_HTIME_ATIME != 0,
    ];
    let mut times = [None; 3];
    let mut seconds = [0u32; 3];

    for (i, &is_present) in present.iter().enumerate() {
        if !is_present {
            continue;
        }
        if unix {
            seconds[i] = reader.read_u32_le().ok_or_else(malformed)?;
            times[i] = Some(unix_to_nanos(seconds[i], 0));
        } else {
            let filetime = reader.read_u64_le().ok_or_else(malformed)?;
            times[i] = Some(filetime_to_unix_nanos(filetime));
        }
    }

    if unix && flags & FHEXTRA_HTIME_UNIX_NS != 0 {
        for (i, &is_present) in present.iter().enumerate() {
            if is_present {
                let nanos = reader.read_u32_le().ok_or_else(malformed)?;
                times[i] = Some(unix_to_nanos(seconds[i], nanos));
            }
        }
    }

    Ok(times)
}
