//! A pure-Rust engine for stored RAR entries.
//!
//! [`NativeEngine`] walks RAR 1.5-4.x and RAR 5.0 block structures directly
//! from the archive file. It lists every entry, and materializes entries that
//! were stored without compression. Compressed, encrypted, and
//! volume-spanning payloads are reported with the matching status code.

pub mod rar4;
pub mod rar5;
pub mod signature;
mod vint;
mod volume;

use std::path::Path;

use tracing::{debug, trace};

use self::signature::Signature;
use self::volume::{ReadInterval, VolumeFile};
use super::{
    Callback, Code, Engine, Message, ProcessMode, RawHeader, RawName, Reply, Token,
    RHDF_DIRECTORY, RHDF_ENCRYPTED, RHDF_SPLITAFTER, RHDF_SPLITBEFORE,
};
use crate::crc32::Crc32;

/// Block header parse failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("header truncated: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },
    #[error("malformed header: {0}")]
    Malformed(&'static str),
    #[error("header checksum mismatch: stored {stored:#x}, computed {computed:#x}")]
    Checksum { stored: u32, computed: u32 },
}

/// A parsed block, reduced to what the walker acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Main { encrypted_headers: bool },
    Entry(EntryBlock),
    /// Service, comment, and unknown blocks, followed by `data_size` bytes.
    Other { data_size: u64 },
    /// RAR5 archive encryption header.
    Encryption,
    End,
}

/// A file entry header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryBlock {
    pub name: RawName,
    pub kind: u32,
    /// `RHDF_*` bits.
    pub flags: u32,
    pub packed_size: u64,
    pub unpacked_size: u64,
    pub file_crc: Option<u32>,
    /// Unix nanoseconds, 0 when absent.
    pub mtime: u64,
    pub ctime: u64,
    pub atime: u64,
    /// Payload is stored without compression.
    pub stored: bool,
}

impl EntryBlock {
    fn to_raw(&self, block_pos: u64) -> RawHeader {
        RawHeader {
            name: self.name.clone(),
            kind: self.kind,
            flags: self.flags,
            pack_size: self.packed_size as u32,
            pack_size_high: (self.packed_size >> 32) as u32,
            unp_size: self.unpacked_size as u32,
            unp_size_high: (self.unpacked_size >> 32) as u32,
            file_crc: self.file_crc.unwrap_or(0),
            mtime_unix: self.mtime,
            ctime_unix: self.ctime,
            atime_unix: self.atime,
            block_pos: block_pos as i64,
        }
    }
}

/// Tuning for [`NativeEngine`].
#[derive(Debug, Clone)]
pub struct NativeOptions {
    /// Largest payload slice pushed per callback message.
    pub chunk_size: usize,
    /// Check stored payloads against the header CRC-32.
    pub verify_crc: bool,
}

impl Default for NativeOptions {
    fn default() -> Self {
        Self {
            chunk_size: 0x10000,
            verify_crc: true,
        }
    }
}

/// Engine over local RAR4 and RAR5 archive files.
#[derive(Debug, Clone, Default)]
pub struct NativeEngine {
    options: NativeOptions,
}

impl NativeEngine {
    pub fn new(options: NativeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &NativeOptions {
        &self.options
    }
}

/// Entry whose header was read and whose payload hasn't been processed.
#[derive(Debug)]
struct Pending {
    entry: EntryBlock,
    data_start: u64,
}

impl Pending {
    fn data_end(&self) -> u64 {
        self.data_start.saturating_add(self.entry.packed_size)
    }
}

/// One open archive.
#[derive(Debug)]
pub struct NativeHandle {
    volume: VolumeFile,
    format: Signature,
    /// Offset of the next block to read.
    pos: u64,
    /// Offset just past the signature; the lowest seekable position.
    first_block: u64,
    pending: Option<Pending>,
    /// `pos` came from a seek and must land on a file block.
    seeked: bool,
}

impl NativeHandle {
    pub fn format(&self) -> Signature {
        self.format
    }

    /// Read and parse the block at `offset`. Returns the block and the
    /// offset where its data area starts.
    fn read_block(&mut self, offset: u64) -> Result<(Block, u64), Code> {
        let remaining = self.volume.remaining(offset);
        let header = match self.format {
            Signature::Rar15 => {
                let mut base = [0u8; rar4::BASE_HEADER_SIZE];
                read_prefix(&mut self.volume, offset, remaining, &mut base)?;
                let prefix = rar4::parse_prefix(&base).map_err(bad_data)?;
                self.read_header_bytes(offset, u64::from(prefix.head_size))?
            }
            Signature::Rar50 => {
                let mut prefix = [0u8; rar5::PREFIX_SIZE];
                let have = remaining.min(prefix.len() as u64) as usize;
                read_prefix(&mut self.volume, offset, remaining, &mut prefix[..have])?;
                let len = rar5::header_len(&prefix[..have]).map_err(bad_data)?;
                self.read_header_bytes(offset, len as u64)?
            }
        };
        let block = match self.format {
            Signature::Rar15 => rar4::parse_block(&header),
            Signature::Rar50 => rar5::parse_block(&header),
        }
        .map_err(bad_data)?;
        Ok((block, offset + header.len() as u64))
    }

    fn read_header_bytes(&mut self, offset: u64, len: u64) -> Result<Vec<u8>, Code> {
        if len > self.volume.remaining(offset) {
            debug!(offset, len, "block header runs past end of file");
            return Err(Code::BadData);
        }
        self.volume
            .read_range(ReadInterval::at(offset, len))
            .map_err(|_| Code::ERead)
    }
}

/// Fill `buffer` from `offset`, failing with `BadData` when the file ends
/// first.
fn read_prefix(
    volume: &mut VolumeFile,
    offset: u64,
    remaining: u64,
    buffer: &mut [u8],
) -> Result<(), Code> {
    if remaining < buffer.len() as u64 || buffer.is_empty() {
        return Err(Code::BadData);
    }
    volume
        .read_exact_at(offset, buffer)
        .map_err(|_| Code::ERead)
}

fn bad_data(err: ParseError) -> Code {
    debug!(error = %err, "unreadable block header");
    Code::BadData
}

impl Engine for NativeEngine {
    type Handle = NativeHandle;

    fn open(&self, path: &Path) -> Result<NativeHandle, Code> {
        let mut volume = VolumeFile::open(path).map_err(|err| {
            debug!(path = %path.display(), error = %err, "cannot open archive file");
            Code::EOpen
        })?;

        let mut marker = [0u8; Signature::MAX_LEN];
        let have = volume.length().min(marker.len() as u64) as usize;
        volume
            .read_exact_at(0, &mut marker[..have])
            .map_err(|_| Code::ERead)?;
        let format = Signature::from_bytes(&marker[..have]).ok_or(Code::BadArchive)?;

        let first_block = format.size();
        let mut handle = NativeHandle {
            volume,
            format,
            pos: first_block,
            first_block,
            pending: None,
            seeked: false,
        };

        let (block, data_start) = handle
            .read_block(first_block)
            .map_err(|_| Code::BadArchive)?;
        match block {
            Block::Encryption | Block::Main { encrypted_headers: true } => {
                return Err(Code::MissingPassword)
            }
            Block::Main { .. } => handle.pos = data_start,
            _ => return Err(Code::BadArchive),
        }

        debug!(format = ?format, length = handle.volume.length(), "opened archive");
        Ok(handle)
    }

    fn read_header(&self, handle: &mut NativeHandle) -> Result<RawHeader, Code> {
        let from_seek = std::mem::take(&mut handle.seeked);
        loop {
            let offset = handle.pos;
            if handle.volume.remaining(offset) == 0 {
                return Err(Code::EndArchive);
            }

            let (block, data_start) = handle.read_block(offset)?;
            match block {
                Block::Entry(entry) => {
                    trace!(offset, packed = entry.packed_size, "entry header");
                    let raw = entry.to_raw(offset);
                    handle.pos = data_start;
                    handle.pending = Some(Pending { entry, data_start });
                    return Ok(raw);
                }
                Block::Main { .. } | Block::Other { .. } if from_seek => {
                    debug!(offset, "seek target is not an entry header");
                    return Err(Code::BadData);
                }
                Block::Other { data_size } => {
                    trace!(offset, data_size, "skipping non-file block");
                    handle.pos = data_start.saturating_add(data_size);
                }
                Block::Main { .. } => handle.pos = data_start,
                Block::Encryption => return Err(Code::MissingPassword),
                Block::End => return Err(Code::EndArchive),
            }
        }
    }

    fn process(
        &self,
        handle: &mut NativeHandle,
        mode: ProcessMode,
        token: Token,
        callback: &mut dyn Callback,
    ) -> Result<(), Code> {
        let pending = handle.pending.take().ok_or(Code::BadData)?;
        let data_end = pending.data_end();
        handle.pos = data_end;

        if mode == ProcessMode::Skip {
            return Ok(());
        }

        let entry = &pending.entry;
        if entry.flags & RHDF_DIRECTORY != 0 {
            return Ok(());
        }
        if entry.flags & RHDF_ENCRYPTED != 0 {
            callback.on_message(token, Message::NeedPassword);
            return Err(Code::MissingPassword);
        }
        if entry.flags & (RHDF_SPLITBEFORE | RHDF_SPLITAFTER) != 0 {
            callback.on_message(token, Message::ChangeVolume);
            return Err(Code::EOpen);
        }
        if !entry.stored {
            return Err(Code::UnknownFormat);
        }

        let chunk_size = self.options.chunk_size.max(1) as u64;
        let mut crc = Crc32::new();
        let mut offset = pending.data_start;
        let mut chunk = Vec::new();
        while offset < data_end {
            let len = chunk_size.min(data_end - offset);
            chunk.resize(len as usize, 0);
            handle
                .volume
                .read_exact_at(offset, &mut chunk)
                .map_err(|_| Code::ERead)?;
            crc.update(&chunk);
            if callback.on_message(token, Message::ProcessData(&chunk)) == Reply::Abort {
                debug!(offset, "callback aborted payload delivery");
                return Err(Code::Unknown);
            }
            offset += len;
        }

        if self.options.verify_crc {
            if let Some(stored) = entry.file_crc {
                let computed = crc.finish();
                if stored != computed {
                    debug!(stored, computed, "payload checksum mismatch");
                    return Err(Code::BadData);
                }
            }
        }
        Ok(())
    }

    fn seek(&self, handle: &mut NativeHandle, block_pos: i64) -> Result<(), Code> {
        let target = u64::try_from(block_pos).map_err(|_| Code::ESeek)?;
        if target < handle.first_block || target >= handle.volume.length() {
            return Err(Code::ESeek);
        }
        handle.pending = None;
        handle.pos = target;
        handle.seeked = true;
        Ok(())
    }

    fn close(&self, handle: NativeHandle) -> Result<(), Code> {
        drop(handle);
        Ok(())
    }
}
