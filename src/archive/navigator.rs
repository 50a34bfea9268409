//! Sequential advance and block seek.

use tracing::trace;

use super::Archive;
use crate::engine::{Code, Engine, ProcessMode};
use crate::error::{Phase, RarError, Result};
use crate::header::Header;

impl<E: Engine> Archive<E> {
    /// Advance to the next entry and return its header.
    ///
    /// If the engine is still parked on an entry, its payload is skipped
    /// first without being materialized; the engine only moves past an entry
    /// once it was skipped or processed. Returns `Ok(None)` at the end of the
    /// archive.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Header>> {
        if self.handle.is_none() {
            return Err(RarError::Closed);
        }
        self.decoded = None;

        // Dropped before the skip: whatever the skip returns, this header is
        // no longer the one the engine is parked on.
        self.cursor.clear();
        if self.cursor.owes_process() {
            trace!("skipping entry");
            let skipped = self.run_pass(ProcessMode::Skip, 0)?;
            if !skipped.is_empty() {
                trace!(bytes = skipped.len(), "discarded bytes delivered during skip");
            }
        }

        self.read_header()
    }

    /// Reposition to a block position taken from an earlier [`Header`] and
    /// read the header there.
    ///
    /// The decoded buffer and current header are dropped before the engine
    /// is touched, so a failed seek leaves nothing stale behind.
    pub fn seek_pos(&mut self, block_pos: i64) -> Result<Header> {
        if self.handle.is_none() {
            return Err(RarError::Closed);
        }
        self.decoded = None;
        self.park_at(block_pos)
    }

    /// Seek the engine to `block_pos` and re-read the header there, keeping
    /// any decoded buffer.
    pub(super) fn park_at(&mut self, block_pos: i64) -> Result<Header> {
        self.cursor.clear();
        let handle = self.handle.as_mut().ok_or(RarError::Closed)?;
        trace!(block_pos, "seeking");
        self.engine
            .seek(handle, block_pos)
            .map_err(|code| RarError::engine(code, Phase::Seek))?;
        self.cursor.settle();

        // A seek that lands on the end marker still owes the caller a header.
        self.read_header()?
            .ok_or_else(|| RarError::engine(Code::EndArchive, Phase::ReadHeader))
    }

    /// The only place the engine's header read is issued. Callers make sure
    /// the previous entry was skipped, processed, or seeked away from.
    fn read_header(&mut self) -> Result<Option<Header>> {
        debug_assert!(!self.cursor.owes_process(), "header read twice");
        let handle = self.handle.as_mut().ok_or(RarError::Closed)?;

        match self.engine.read_header(handle) {
            Ok(raw) => {
                let header = self.cursor.park(Header::from_raw(&raw));
                trace!(
                    name = %header.name,
                    block_pos = header.block_pos,
                    dir = header.is_dir(),
                    "header read"
                );
                Ok(Some(header.clone()))
            }
            Err(Code::EndArchive) => {
                trace!("end of archive");
                Ok(None)
            }
            Err(code) => Err(RarError::engine(code, Phase::ReadHeader)),
        }
    }
}
