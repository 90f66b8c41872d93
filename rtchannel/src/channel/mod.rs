//! Application-facing channel handle.
//!
//! A [`Channel`] pairs the transport's capabilities (send, close, open
//! status) with the shared [`ChannelState`] holding the event callbacks.
//! Both halves are reference-counted; cloning a `Channel` is cheap and every
//! clone observes the same channel.

mod state;

pub use state::ChannelState;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;
use crate::message::Message;
use crate::transport::Transport;

/// Handle to a data channel or media track.
#[derive(Clone)]
pub struct Channel {
    transport: Arc<dyn Transport>,
    state: Arc<ChannelState>,
}

impl Channel {
    /// Creates a handle over `transport`, sharing `state` with it.
    pub fn new(transport: Arc<dyn Transport>, state: Arc<ChannelState>) -> Self {
        Self { transport, state }
    }

    /// Closes the channel.
    pub fn close(&self) {
        self.transport.close();
    }

    /// Sends a message.
    ///
    /// `Ok(false)` means the message was accepted but buffered rather than
    /// transmitted immediately; it is not a failure.
    pub fn send(&self, message: impl Into<Message>) -> Result<bool> {
        self.transport.send(message.into())
    }

    /// Sends a binary payload.
    pub fn send_bytes(&self, data: &[u8]) -> Result<bool> {
        self.transport.send_bytes(data)
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    /// Largest message accepted by one `send`.
    pub fn max_message_size(&self) -> usize {
        self.transport.max_message_size()
    }

    /// Bytes accepted by `send` but not yet transmitted.
    pub fn buffered_amount(&self) -> usize {
        self.state.buffered_amount()
    }

    /// Sets the callback fired when the channel opens.
    ///
    /// If the channel opened before any callback was set, the new callback
    /// is invoked immediately. The same replay applies to `on_closed`,
    /// `on_error`, `on_available` and `on_buffered_amount_low`.
    pub fn on_open<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.state.open_callback.set(move |()| callback());
    }

    pub fn on_closed<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.state.closed_callback.set(move |()| callback());
    }

    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.state.error_callback.set(callback);
    }

    /// Switches the channel to push mode, delivering every received message
    /// to `callback`.
    ///
    /// Messages already queued are delivered right away if the channel is
    /// open.
    pub fn on_message<F>(&self, callback: F)
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.state.message_callback.set(callback);
        self.state.flush_pending_messages();
    }

    /// Like [`on_message`](Self::on_message), with separate callbacks for
    /// binary and text messages.
    pub fn on_message_split<B, T>(&self, binary: B, text: T)
    where
        B: Fn(Bytes) + Send + Sync + 'static,
        T: Fn(String) + Send + Sync + 'static,
    {
        self.on_message(move |message| match message {
            Message::Binary(data) => binary(data),
            Message::Text(string) => text(string),
        });
    }

    /// Sets the callback fired when the buffered amount drops to or below
    /// the low threshold.
    pub fn on_buffered_amount_low<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.state.buffered_amount_low_callback.set(move |()| callback());
    }

    /// Sets the low threshold. Evaluated at the next buffered-amount update,
    /// not immediately.
    pub fn set_buffered_amount_low_threshold(&self, amount: usize) {
        self.state.set_buffered_amount_low_threshold(amount);
    }

    /// Clears every callback and rearms open detection.
    pub fn reset_callbacks(&self) {
        self.state.reset_callbacks();
    }

    /// Takes the next received message (pull mode).
    ///
    /// Only valid while no message callback is set: a channel is either in
    /// push mode or pull mode, and mixing them is a caller error.
    pub fn receive(&self) -> Option<Message> {
        debug_assert!(
            !self.state.has_message_callback(),
            "receive() called on a channel in push mode"
        );
        self.state.inbound().receive()
    }

    /// Returns the next received message without removing it (pull mode).
    ///
    /// Same precondition as [`receive`](Self::receive).
    pub fn peek(&self) -> Option<Message> {
        debug_assert!(
            !self.state.has_message_callback(),
            "peek() called on a channel in push mode"
        );
        self.state.inbound().peek()
    }

    /// Total bytes waiting to be taken by `receive`.
    pub fn available_amount(&self) -> usize {
        self.state.inbound().available_amount()
    }

    /// Sets the callback fired when received data becomes available after
    /// the queue was empty.
    pub fn on_available<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.state.available_callback.set(move |()| callback());
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("open", &self.is_open())
            .field("closed", &self.is_closed())
            .field("state", &self.state)
            .finish()
    }
}
