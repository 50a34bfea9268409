//! The engine seam.
//!
//! An [`Engine`] is a push-style decompression backend that exposes five
//! primitives: open a session, read the next entry header, process (skip or
//! materialize) the entry whose header was just read, seek to a block
//! position, and close the session. Payload bytes are pushed to a
//! [`Callback`] while [`Engine::process`] runs.
//!
//! Engines in this family are fragile about sequencing. After
//! [`Engine::read_header`] the entry must be processed before the next header
//! read, otherwise the engine reads payload bytes as a header. The
//! [`Archive`](crate::Archive) adapter is what enforces that ordering; engine
//! implementations are not expected to self-correct.
//!
//! Status codes and flag bits follow the UnRAR DLL numbering.

pub mod native;

use std::fmt;
use std::path::Path;

pub use native::{NativeEngine, NativeHandle, NativeOptions};

/// Raw header flag: entry continues from the previous volume.
pub const RHDF_SPLITBEFORE: u32 = 0x01;
/// Raw header flag: entry continues in the next volume.
pub const RHDF_SPLITAFTER: u32 = 0x02;
/// Raw header flag: payload is encrypted.
pub const RHDF_ENCRYPTED: u32 = 0x04;
/// Raw header flag: entry belongs to a solid stream.
pub const RHDF_SOLID: u32 = 0x10;
/// Raw header flag: entry is a directory.
pub const RHDF_DIRECTORY: u32 = 0x20;

/// Non-success engine status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    /// No more entries. Only a terminal signal when returned by header reads.
    EndArchive,
    NoMemory,
    BadData,
    BadArchive,
    UnknownFormat,
    EOpen,
    ECreate,
    EClose,
    ERead,
    EWrite,
    SmallBuf,
    Unknown,
    MissingPassword,
    EReference,
    BadPassword,
    ESeek,
    /// A code outside the known table.
    Other(i32),
}

impl Code {
    /// Map a raw engine status. `0` is success and maps to `None`.
    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => return None,
            10 => Self::EndArchive,
            11 => Self::NoMemory,
            12 => Self::BadData,
            13 => Self::BadArchive,
            14 => Self::UnknownFormat,
            15 => Self::EOpen,
            16 => Self::ECreate,
            17 => Self::EClose,
            18 => Self::ERead,
            19 => Self::EWrite,
            20 => Self::SmallBuf,
            21 => Self::Unknown,
            22 => Self::MissingPassword,
            23 => Self::EReference,
            24 => Self::BadPassword,
            25 => Self::ESeek,
            other => Self::Other(other),
        })
    }

    /// Raw numeric status.
    pub fn raw(self) -> i32 {
        match self {
            Self::EndArchive => 10,
            Self::NoMemory => 11,
            Self::BadData => 12,
            Self::BadArchive => 13,
            Self::UnknownFormat => 14,
            Self::EOpen => 15,
            Self::ECreate => 16,
            Self::EClose => 17,
            Self::ERead => 18,
            Self::EWrite => 19,
            Self::SmallBuf => 20,
            Self::Unknown => 21,
            Self::MissingPassword => 22,
            Self::EReference => 23,
            Self::BadPassword => 24,
            Self::ESeek => 25,
            Self::Other(raw) => raw,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::EndArchive => "end of archive",
            Self::NoMemory => "not enough memory",
            Self::BadData => "bad data",
            Self::BadArchive => "not a valid archive",
            Self::UnknownFormat => "unknown format",
            Self::EOpen => "open failed",
            Self::ECreate => "create failed",
            Self::EClose => "close failed",
            Self::ERead => "read failed",
            Self::EWrite => "write failed",
            Self::SmallBuf => "buffer too small",
            Self::Unknown => "unknown error",
            Self::MissingPassword => "password required",
            Self::EReference => "missing reference",
            Self::BadPassword => "wrong password",
            Self::ESeek => "seek failed",
            Self::Other(_) => "unrecognized status",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.describe(), self.raw())
    }
}

/// What [`Engine::process`] does with the pending entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessMode {
    /// Move past the payload without materializing it.
    Skip,
    /// Decode the payload, pushing it to the callback, without writing files.
    Test,
}

/// Entry name as delivered by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawName {
    /// Byte string, expected to be UTF-8.
    Narrow(Vec<u8>),
    /// UTF-16 code units.
    Wide(Vec<u16>),
}

/// Header record as the engine reports it, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    pub name: RawName,
    /// Block type as stored in the archive.
    pub kind: u32,
    /// `RHDF_*` bits.
    pub flags: u32,
    pub pack_size: u32,
    pub pack_size_high: u32,
    pub unp_size: u32,
    pub unp_size_high: u32,
    pub file_crc: u32,
    /// Nanoseconds since the Unix epoch, 0 when absent.
    pub mtime_unix: u64,
    pub ctime_unix: u64,
    pub atime_unix: u64,
    /// Offset of the entry's header, accepted by [`Engine::seek`].
    pub block_pos: i64,
}

/// Correlation value that lets the engine address the receiver of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub(crate) u64);

impl Token {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Message pushed by the engine while processing an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message<'a> {
    /// The next volume of a multi-volume set is needed.
    ChangeVolume,
    /// A chunk of decoded payload.
    ProcessData(&'a [u8]),
    /// The entry is encrypted and a password is needed.
    NeedPassword,
}

/// Callback reply. `Abort` makes the engine fail the current operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Continue,
    Abort,
}

/// Receiver of engine messages during [`Engine::process`].
pub trait Callback {
    fn on_message(&mut self, token: Token, message: Message<'_>) -> Reply;
}

/// The five engine primitives.
///
/// Every primitive returns `Err(code)` for a non-success status.
/// [`Engine::read_header`] returns `Err(Code::EndArchive)` once no entries
/// remain.
pub trait Engine {
    /// Per-session engine state.
    type Handle;

    fn open(&self, path: &Path) -> Result<Self::Handle, Code>;

    fn read_header(&self, handle: &mut Self::Handle) -> Result<RawHeader, Code>;

    /// Skip or materialize the entry whose header was read last. In
    /// [`ProcessMode::Test`] payload chunks go to `callback`, addressed with
    /// `token`.
    fn process(
        &self,
        handle: &mut Self::Handle,
        mode: ProcessMode,
        token: Token,
        callback: &mut dyn Callback,
    ) -> Result<(), Code>;

    fn seek(&self, handle: &mut Self::Handle, block_pos: i64) -> Result<(), Code>;

    fn close(&self, handle: Self::Handle) -> Result<(), Code>;
}
