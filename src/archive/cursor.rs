//! Current-header cache.
//!
//! The engine's header read is only valid once per entry: reading again
//! before the entry was skipped or processed parses payload bytes as a
//! header. The cursor remembers the header that was read so callers never
//! need a second engine read, and separately tracks whether the engine is
//! still parked right after a header, owing a process call.
//!
//! The two can diverge. A failed seek drops the header but leaves the
//! engine where it was; a decode pass settles the engine but the header stays
//! current until the re-park replaces it.

use crate::header::Header;

#[derive(Debug, Default)]
pub(crate) struct HeaderCursor {
    current: Option<Header>,
    unprocessed: bool,
}

impl HeaderCursor {
    pub fn current(&self) -> Option<&Header> {
        self.current.as_ref()
    }

    /// Record a header the engine just returned.
    pub fn park(&mut self, header: Header) -> &Header {
        self.unprocessed = true;
        self.current.insert(header)
    }

    /// The engine ran a process call or repositioned; nothing is owed.
    pub fn settle(&mut self) {
        self.unprocessed = false;
    }

    /// Whether a header read now would hit the double-read hazard.
    pub fn owes_process(&self) -> bool {
        self.unprocessed
    }

    /// Forget the header. Doesn't change what the engine owes.
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Forget everything, for a released session.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
