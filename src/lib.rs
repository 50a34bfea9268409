//! Pull-based RAR archive reader.
//!
//! RAR decoders are push-style: they deliver payload through a callback while
//! an extract call runs, and they are strict about call order. This crate
//! wraps such an engine in an [`Archive`] with a pull interface:
//!
//! - [`Archive::next`] / [`Archive::entries`] walk entries in order,
//! - [`Archive::seek_pos`] jumps back to a previously seen entry,
//! - [`Archive::read_all`] and [`std::io::Read`] return the current entry's
//!   bytes.
//!
//! Supports RAR15 (RAR 1.5-4.x) and RAR50 (RAR 5.0+) formats through the
//! bundled [`NativeEngine`], which lists every entry and reads entries
//! stored without compression. Other backends plug in through the
//! [`engine::Engine`] trait.
//!
//! ## Logging
//! Diagnostics go through [`tracing`]: `debug` for session lifecycle and
//! decode passes, `trace` for individual headers and seeks, `warn` for
//! callback faults and failed releases on drop.

mod archive;
mod bridge;
mod crc32;
pub mod engine;
pub mod error;
mod header;

pub use archive::{Archive, Entries, OpenOptions};
pub use engine::{Code, Engine, NativeEngine, NativeOptions, ProcessMode};
pub use error::{Phase, RarError, Result};
pub use header::Header;
