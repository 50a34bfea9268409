//! Error types for archive navigation and entry reads.
//!
//! This module provides the [`RarError`] type returned by every fallible
//! [`Archive`](crate::Archive) operation.
//!
//! ## Error Categories
//!
//! | Category | Errors | Description |
//! |----------|--------|-------------|
//! | Engine | [`Engine`] | The engine returned a non-success code |
//! | Usage | [`IsDirectory`], [`NoCurrentEntry`] | The call makes no sense for the current entry |
//! | Lifecycle | [`Closed`] | The session was already released |
//!
//! Reaching the end of the archive is not an error: [`Archive::next`]
//! returns `Ok(None)`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rar_reader::{Archive, Phase, RarError};
//!
//! match Archive::open("video.rar") {
//!     Ok(_) => println!("opened"),
//!     Err(RarError::Engine { phase: Phase::Open, code }) => eprintln!("not a RAR file: {code}"),
//!     Err(e) => eprintln!("Error: {e}"),
//! }
//! ```
//!
//! [`Engine`]: RarError::Engine
//! [`IsDirectory`]: RarError::IsDirectory
//! [`NoCurrentEntry`]: RarError::NoCurrentEntry
//! [`Closed`]: RarError::Closed
//! [`Archive::next`]: crate::Archive::next

use std::fmt;
use std::io;

use thiserror::Error;

use crate::engine::Code;

/// Engine primitive that produced a failure code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Open,
    ReadHeader,
    Process,
    Seek,
    Close,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::ReadHeader => "read header",
            Self::Process => "process",
            Self::Seek => "seek",
            Self::Close => "close",
        })
    }
}

/// Error type for archive operations.
#[derive(Debug, Error)]
pub enum RarError {
    /// The engine reported a non-success status.
    ///
    /// `code` is the raw engine status and `phase` the primitive that
    /// returned it. `Code::EndArchive` only shows up here when it arrives
    /// from a phase other than header reads.
    #[error("{phase}: rar error ({code})")]
    Engine { code: Code, phase: Phase },

    /// The current entry is a directory and has no payload.
    #[error("entry is a directory")]
    IsDirectory,

    /// No header has been read yet, or the last one was advanced past.
    #[error("no current entry")]
    NoCurrentEntry,

    /// The archive session has been closed.
    #[error("archive is closed")]
    Closed,
}

impl RarError {
    pub(crate) fn engine(code: Code, phase: Phase) -> Self {
        Self::Engine { code, phase }
    }

    /// Engine status code, if this error came from the engine.
    pub fn code(&self) -> Option<Code> {
        match self {
            Self::Engine { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<RarError> for io::Error {
    fn from(e: RarError) -> Self {
        let kind = match &e {
            RarError::IsDirectory => io::ErrorKind::IsADirectory,
            RarError::Engine {
                code: Code::BadData | Code::BadArchive,
                ..
            } => io::ErrorKind::InvalidData,
            _ => io::ErrorKind::Other,
        };
        Self::new(kind, e)
    }
}

pub type Result<T> = std::result::Result<T, RarError>;
