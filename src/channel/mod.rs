//! Raw Duplex Transport
//!
//! A channel moves serialized frames between the host and the scene.
//! It has no semantics beyond "post a frame" and "poll for a frame";
//! envelopes, correlation and readiness live in [`crate::bridge`].
//!
//! ```text
//! Bridge --post--> Channel ======> remote Channel --poll--> remote Bridge
//! ```
//!
//! # Implementations
//!
//! - `memory` - in-process port pair (crossbeam)
//! - `ws` - WebSocket over a TCP stream (tungstenite)

pub mod memory;
pub mod ws;

use thiserror::Error;

pub use memory::{MemoryPort, pair};
pub use ws::WsChannel;

/// Transport failures.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The remote end went away (navigated, crashed, closed).
    #[error("channel closed")]
    Closed,

    #[error("IO error on channel")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

/// A duplex frame transport.
///
/// `poll` never blocks: `Ok(None)` means nothing is available right now.
pub trait Channel: Send + 'static {
    /// Transmit one frame to the remote end.
    fn post(&mut self, frame: String) -> Result<(), ChannelError>;

    /// Take the next inbound frame, if any.
    fn poll(&mut self) -> Result<Option<String>, ChannelError>;
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn post(&mut self, frame: String) -> Result<(), ChannelError> {
        (**self).post(frame)
    }

    fn poll(&mut self) -> Result<Option<String>, ChannelError> {
        (**self).poll()
    }
}
