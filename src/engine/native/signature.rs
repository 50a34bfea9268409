//! RAR format detection and timestamp conversion.

/// RAR file signature detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// RAR 1.5 to 4.x
    Rar15,
    /// RAR 5.0+
    Rar50,
}

impl Signature {
    pub const RAR15: &[u8; 7] = b"Rar!\x1a\x07\x00";
    pub const RAR50: &[u8; 8] = b"Rar!\x1a\x07\x01\x00";

    /// Longest signature, the number of bytes [`Signature::from_bytes`] wants.
    pub const MAX_LEN: usize = 8;

    pub fn size(&self) -> u64 {
        match self {
            Self::Rar15 => 7,
            Self::Rar50 => 8,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(Self::RAR50) {
            Some(Self::Rar50)
        } else if data.starts_with(Self::RAR15) {
            Some(Self::Rar15)
        } else {
            None
        }
    }
}

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// MS-DOS date/time (2-second resolution) to Unix nanoseconds.
///
/// The value is taken as UTC. Dates before 1980 can't be encoded, so the
/// result is never negative.
pub fn dos_to_unix_nanos(dos_time: u32) -> u64 {
    let second = u64::from((dos_time & 0x1f) * 2);
    let minute = u64::from((dos_time >> 5) & 0x3f);
    let hour = u64::from((dos_time >> 11) & 0x1f);
    let day = u64::from((dos_time >> 16) & 0x1f).max(1);
    let month = u64::from((dos_time >> 21) & 0x0f).clamp(1, 12);
    let year = u64::from(dos_time >> 25) + 1980;

    let is_leap = |y: u64| y % 4 == 0 && (y % 100 != 0 || y % 400 == 0);
    let mut days: u64 = (1970..year).map(|y| if is_leap(y) { 366 } else { 365 }).sum();
    let month_days = [31, if is_leap(year) { 29 } else { 28 }, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    days += month_days[..(month - 1) as usize].iter().sum::<u64>();
    days += day - 1;

    (days * 86_400 + hour * 3_600 + minute * 60 + second) * NANOS_PER_SEC
}

/// Windows FILETIME (100ns ticks since 1601) to Unix nanoseconds, clamped at
/// the epoch.
pub fn filetime_to_unix_nanos(filetime: u64) -> u64 {
    const EPOCH_DIFF_TICKS: u64 = 116_444_736_000_000_000;
    filetime.saturating_sub(EPOCH_DIFF_TICKS).saturating_mul(100)
}

/// Unix seconds plus a nanosecond remainder.
pub fn unix_to_nanos(seconds: u32, nanos: u32) -> u64 {
    u64::from(seconds) * NANOS_PER_SEC + u64::from(nanos.min(999_999_999))
}
