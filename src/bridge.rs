//! Callback-to-buffer bridge.
//!
//! The engine pushes payload chunks through [`Callback::on_message`]. The
//! bridge parks one receiver buffer per decode pass, keyed by a freshly
//! minted [`Token`], and the engine addresses chunks with that token. A
//! [`DecodePass`] guard owns the token for the duration of the engine call
//! and retires it when dropped, so a pass can't leak its receiver on any
//! exit path.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{trace, warn};

use crate::engine::{Callback, Message, Reply, Token};

/// Reason a pass was aborted from the callback side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    /// The receiver buffer could not grow to hold a chunk.
    #[error("could not append {delivered} bytes after {buffered} buffered bytes")]
    ShortWrite { delivered: usize, buffered: usize },

    /// The engine sent something other than a data chunk.
    #[error("unexpected callback message: {0}")]
    UnexpectedMessage(&'static str),
}

#[derive(Debug, Default)]
struct Receiver {
    buffer: Vec<u8>,
    fault: Option<Fault>,
}

impl Receiver {
    fn accept(&mut self, message: Message<'_>) -> Reply {
        if self.fault.is_some() {
            return Reply::Abort;
        }

        let chunk = match message {
            Message::ProcessData(chunk) => chunk,
            Message::ChangeVolume => {
                self.fault = Some(Fault::UnexpectedMessage("change volume"));
                return Reply::Abort;
            }
            Message::NeedPassword => {
                self.fault = Some(Fault::UnexpectedMessage("need password"));
                return Reply::Abort;
            }
        };

        // No partial appends: either the whole chunk fits or the pass dies.
        if self.buffer.try_reserve(chunk.len()).is_err() {
            self.fault = Some(Fault::ShortWrite {
                delivered: chunk.len(),
                buffered: self.buffer.len(),
            });
            return Reply::Abort;
        }
        self.buffer.extend_from_slice(chunk);
        Reply::Continue
    }
}

/// Token registry for one archive session.
#[derive(Debug, Default)]
pub struct CallbackBridge {
    receivers: HashMap<Token, Receiver>,
    next_token: u64,
}

impl CallbackBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a token and park an empty receiver, reserving `capacity` bytes
    /// when the allocator allows it.
    pub fn begin(&mut self, capacity: usize) -> DecodePass<'_> {
        self.next_token += 1;
        let token = Token(self.next_token);
        let mut buffer = Vec::<u8>::new();
        // Only a hint from an untrusted header; chunks reserve for real.
        if buffer.try_reserve(capacity).is_err() {
            trace!(capacity, "capacity hint refused");
        }
        self.receivers.insert(token, Receiver { buffer, fault: None });
        trace!(token = token.get(), capacity, "decode pass started");
        DecodePass {
            bridge: self,
            token,
        }
    }

    /// Number of tokens that have not been retired yet.
    #[cfg(test)]
    pub fn live_tokens(&self) -> usize {
        self.receivers.len()
    }
}

/// One in-flight decode pass. Dropping it retires the token.
#[derive(Debug)]
pub struct DecodePass<'a> {
    bridge: &'a mut CallbackBridge,
    token: Token,
}

impl DecodePass<'_> {
    pub fn token(&self) -> Token {
        self.token
    }

    /// Retire the token and take the received bytes, or the fault that
    /// aborted the pass.
    pub fn finish(self) -> Result<Vec<u8>, Fault> {
        let receiver = self
            .bridge
            .receivers
            .remove(&self.token)
            .unwrap_or_default();
        match receiver.fault {
            Some(fault) => Err(fault),
            None => Ok(receiver.buffer),
        }
    }
}

impl Callback for DecodePass<'_> {
    fn on_message(&mut self, token: Token, message: Message<'_>) -> Reply {
        let Some(receiver) = self.bridge.receivers.get_mut(&token) else {
            warn!(token = token.get(), "callback for retired token");
            return Reply::Abort;
        };
        let faulted = receiver.fault.is_some();
        let reply = receiver.accept(message);
        match &receiver.fault {
            Some(fault) if !faulted => {
                warn!(token = token.get(), %fault, "decode pass aborted by callback");
            }
            Some(_) => {}
            None => trace!(token = token.get(), buffered = receiver.buffer.len(), "chunk received"),
        }
        reply
    }
}

impl Drop for DecodePass<'_> {
    fn drop(&mut self) {
        if self.bridge.receivers.remove(&self.token).is_some() {
            trace!(token = self.token.get(), "decode pass retired");
        }
    }
}
