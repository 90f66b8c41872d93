//! Transport layer abstraction.
//!
//! A concrete transport (data channel over SCTP, media track over RTP, ...)
//! plugs into the channel core through two traits:
//!
//! - `Transport`: the outbound capabilities behind a [`Channel`](crate::Channel)
//! - `Inbound`: the received-message queue the core drains into callbacks
//!
//! The transport also keeps an `Arc<ChannelState>` and calls its `trigger_*`
//! methods as network events happen.
//!
//! # Implementations
//!
//! - `LoopbackTransport`: in-memory connected pair for testing
//! - `MessageQueue` (in `buffer`): ready-made `Inbound`

mod loopback;

pub use loopback::{LoopbackTransport, ReadyState};

use crate::error::Result;
use crate::message::Message;
use crate::DEFAULT_MAX_MESSAGE_SIZE;

/// Outbound capabilities of a concrete transport.
pub trait Transport: Send + Sync {
    /// Closes the channel.
    fn close(&self);

    /// Sends a message.
    ///
    /// Returns `Ok(true)` if it was transmitted immediately and `Ok(false)`
    /// if it was accepted but buffered. `Err` is a transport failure.
    fn send(&self, message: Message) -> Result<bool>;

    /// Sends a binary payload.
    fn send_bytes(&self, data: &[u8]) -> Result<bool> {
        self.send(Message::from(data))
    }

    fn is_open(&self) -> bool;

    fn is_closed(&self) -> bool;

    /// Largest message accepted by one `send`.
    fn max_message_size(&self) -> usize {
        DEFAULT_MAX_MESSAGE_SIZE
    }
}

/// Received-message queue owned by the transport.
pub trait Inbound: Send + Sync {
    /// Removes and returns the next message.
    fn receive(&self) -> Option<Message>;

    /// Returns the next message without removing it.
    fn peek(&self) -> Option<Message>;

    /// Total payload bytes waiting.
    fn available_amount(&self) -> usize;
}
