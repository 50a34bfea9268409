//! Whole-entry decode and incremental reads from the decoded copy.

use std::io;

use tracing::{debug, warn};

use super::Archive;
use crate::engine::{Code, Engine, ProcessMode};
use crate::error::{Phase, RarError, Result};

/// Materialized payload of the current entry.
#[derive(Debug)]
pub(crate) struct DecodedBuffer {
    /// Block position of the header this payload belongs to.
    block_pos: i64,
    bytes: Vec<u8>,
    /// Read cursor for [`io::Read`].
    pos: usize,
}

impl DecodedBuffer {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

impl<E: Engine> Archive<E> {
    /// Decode the whole current entry and return its bytes.
    ///
    /// The result is cached: further calls for the same entry return the
    /// same bytes without touching the engine. After a decode pass the engine
    /// is re-parked on the entry's own block position, so [`Archive::header`]
    /// and later calls keep seeing this entry.
    pub fn read_all(&mut self) -> Result<&[u8]> {
        if self.handle.is_none() {
            return Err(RarError::Closed);
        }
        let header = self.cursor.current().ok_or(RarError::NoCurrentEntry)?;
        if header.is_dir() {
            return Err(RarError::IsDirectory);
        }
        let block_pos = header.block_pos;
        let capacity = usize::try_from(header.unpacked_size)
            .unwrap_or(usize::MAX)
            .min(self.options.capacity_hint_limit);

        let decoded = match self.decoded.take() {
            Some(decoded) if decoded.block_pos == block_pos => decoded,
            _ => {
                debug!(name = %header.name, capacity, "decoding entry");
                let bytes = self.run_pass(ProcessMode::Test, capacity);
                // Re-park even when the pass failed so navigation stays
                // consistent; the decode error takes precedence.
                let parked = self.park_at(block_pos);
                let bytes = bytes?;
                parked?;
                DecodedBuffer {
                    block_pos,
                    bytes,
                    pos: 0,
                }
            }
        };

        Ok(self.decoded.insert(decoded).bytes.as_slice())
    }

    /// Run one engine process call with a freshly minted bridge token and
    /// collect what the callback received.
    pub(super) fn run_pass(&mut self, mode: ProcessMode, capacity: usize) -> Result<Vec<u8>> {
        let handle = self.handle.as_mut().ok_or(RarError::Closed)?;
        let mut pass = self.bridge.begin(capacity);
        let token = pass.token();
        let status = self.engine.process(handle, mode, token, &mut pass);
        let received = pass.finish();
        self.cursor.settle();

        status.map_err(|code| RarError::engine(code, Phase::Process))?;
        received.map_err(|fault| {
            warn!(%fault, "engine ignored a callback abort");
            RarError::engine(Code::Unknown, Phase::Process)
        })
    }

    fn decoded_is_current(&self) -> bool {
        match (&self.decoded, self.cursor.current()) {
            (Some(decoded), Some(header)) => decoded.block_pos == header.block_pos,
            _ => false,
        }
    }
}

impl<E: Engine> io::Read for Archive<E> {
    /// Read from the current entry, decoding it on first use.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.decoded_is_current() {
            self.read_all()?;
        }
        let Some(decoded) = self.decoded.as_mut() else {
            return Ok(0);
        };

        let remaining = &decoded.bytes[decoded.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        decoded.pos += n;
        Ok(n)
    }
}
