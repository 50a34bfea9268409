//! Entry headers.
//!
//! [`Header`] is an immutable snapshot of one entry's metadata, normalized
//! from the engine's [`RawHeader`].

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::engine::{
    RawHeader, RawName, RHDF_DIRECTORY, RHDF_ENCRYPTED, RHDF_SOLID, RHDF_SPLITAFTER,
    RHDF_SPLITBEFORE,
};

/// Metadata of one archive entry at the time its header was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Entry path inside the archive, `/`-separated.
    pub name: String,
    /// Block type as stored in the archive.
    pub kind: u32,
    /// `RHDF_*` bits, see the `is_*` predicates.
    pub flags: u32,
    pub packed_size: u64,
    pub unpacked_size: u64,
    /// CRC-32 of the unpacked payload.
    pub crc: u32,
    pub modified: SystemTime,
    pub created: SystemTime,
    pub accessed: SystemTime,
    /// Opaque position accepted by [`Archive::seek_pos`](crate::Archive::seek_pos).
    pub block_pos: i64,
}

impl Header {
    pub fn from_raw(raw: &RawHeader) -> Self {
        Self {
            name: decode_name(&raw.name),
            kind: raw.kind,
            flags: raw.flags,
            packed_size: join_halves(raw.pack_size_high, raw.pack_size),
            unpacked_size: join_halves(raw.unp_size_high, raw.unp_size),
            crc: raw.file_crc,
            modified: unix_nanos(raw.mtime_unix),
            created: unix_nanos(raw.ctime_unix),
            accessed: unix_nanos(raw.atime_unix),
            block_pos: raw.block_pos,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.flags & RHDF_DIRECTORY != 0
    }

    pub fn is_solid(&self) -> bool {
        self.flags & RHDF_SOLID != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & RHDF_ENCRYPTED != 0
    }

    pub fn is_split_before(&self) -> bool {
        self.flags & RHDF_SPLITBEFORE != 0
    }

    pub fn is_split_after(&self) -> bool {
        self.flags & RHDF_SPLITAFTER != 0
    }
}

fn join_halves(high: u32, low: u32) -> u64 {
    (u64::from(high) << 32) | u64::from(low)
}

fn unix_nanos(nanos: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(nanos)
}

/// Normalize a narrow or wide engine name into one `String`.
fn decode_name(name: &RawName) -> String {
    match name {
        RawName::Narrow(bytes) => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            String::from_utf8_lossy(&bytes[..end]).into_owned()
        }
        RawName::Wide(units) => {
            let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
            String::from_utf16_lossy(&units[..end])
        }
    }
}
