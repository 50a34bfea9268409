//! Pull-based archive reader.
//!
//! [`Archive`] owns one engine session and turns the engine's push-style
//! primitives into three pull operations:
//!
//! - sequential iteration with [`Archive::next`] (or [`Archive::entries`]),
//! - random access with [`Archive::seek_pos`] using a position taken from an
//!   earlier [`Header::block_pos`],
//! - whole-entry reads with [`Archive::read_all`] or [`std::io::Read`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use rar_reader::Archive;
//!
//! let mut archive = Archive::open("photos.rar")?;
//! while let Some(header) = archive.next()? {
//!     if header.is_dir() {
//!         continue;
//!     }
//!     let data = archive.read_all()?;
//!     println!("{}: {} bytes", header.name, data.len());
//! }
//! archive.close()?;
//! # Ok::<(), rar_reader::RarError>(())
//! ```
//!
//! An `Archive` is a single-threaded object: every operation blocks until
//! the engine returns, and all of them take `&mut self`.

mod cursor;
mod navigator;
mod reader;


use std::fmt;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::bridge::CallbackBridge;
use crate::engine::{Engine, NativeEngine};
use crate::error::{Phase, RarError, Result};
use crate::header::Header;

use cursor::HeaderCursor;
use reader::DecodedBuffer;

/// Adapter options.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Upper bound for the buffer capacity reserved up front from an entry's
    /// declared unpacked size. Larger entries still decode; the buffer grows
    /// as chunks arrive.
    pub capacity_hint_limit: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            capacity_hint_limit: 64 << 20,
        }
    }
}

/// One open archive session.
pub struct Archive<E: Engine = NativeEngine> {
    engine: E,
    handle: Option<E::Handle>,
    cursor: HeaderCursor,
    decoded: Option<DecodedBuffer>,
    bridge: CallbackBridge,
    options: OpenOptions,
    path: PathBuf,
}

impl Archive<NativeEngine> {
    /// Open `path` with the bundled engine and default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, OpenOptions::default())
    }

    pub fn open_with_options(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        Self::with_engine(NativeEngine::default(), path, options)
    }
}

impl<E: Engine> Archive<E> {
    /// Open `path` through a custom engine.
    pub fn with_engine(engine: E, path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let handle = engine
            .open(&path)
            .map_err(|code| RarError::engine(code, Phase::Open))?;
        debug!(path = %path.display(), "archive opened");

        Ok(Self {
            engine,
            handle: Some(handle),
            cursor: HeaderCursor::default(),
            decoded: None,
            bridge: CallbackBridge::new(),
            options,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// The header read last, without touching the engine.
    pub fn header(&self) -> Result<&Header> {
        if self.handle.is_none() {
            return Err(RarError::Closed);
        }
        self.cursor.current().ok_or(RarError::NoCurrentEntry)
    }

    /// Release the session.
    ///
    /// Cached state is dropped even when the engine reports a failure, and
    /// the archive counts as closed either way.
    pub fn close(&mut self) -> Result<()> {
        let handle = self.handle.take().ok_or(RarError::Closed)?;
        self.cursor.reset();
        self.decoded = None;
        debug!(path = %self.path.display(), "closing archive");
        self.engine
            .close(handle)
            .map_err(|code| RarError::engine(code, Phase::Close))
    }

    /// Iterate over the remaining entries.
    ///
    /// Each item is the result of one [`Archive::next`] call. Iteration stops
    /// at the end of the archive and after the first error.
    pub fn entries(&mut self) -> Entries<'_, E> {
        Entries {
            archive: self,
            done: false,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<E: Engine> fmt::Debug for Archive<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("path", &self.path)
            .field("open", &self.handle.is_some())
            .field("current", &self.cursor.current().map(|h| &h.name))
            .field("decoded", &self.decoded.as_ref().map(DecodedBuffer::len))
            .finish_non_exhaustive()
    }
}

impl<E: Engine> Drop for Archive<E> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(code) = self.engine.close(handle) {
                warn!(path = %self.path.display(), %code, "failed to release archive on drop");
            }
        }
    }
}

/// Iterator returned by [`Archive::entries`].
pub struct Entries<'a, E: Engine> {
    archive: &'a mut Archive<E>,
    done: bool,
}

impl<E: Engine> Entries<'_, E> {
    /// The archive being iterated, to read the entry just yielded.
    pub fn archive(&mut self) -> &mut Archive<E> {
        self.archive
    }
}

impl<E: Engine> Iterator for Entries<'_, E> {
    type Item = Result<Header>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.archive.next() {
            Ok(Some(header)) => Some(Ok(header)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<E: Engine> FusedIterator for Entries<'_, E> {}
