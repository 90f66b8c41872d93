//! In-memory transport connecting two channel endpoints.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::buffer::MessageQueue;
use crate::channel::{Channel, ChannelState};
use crate::config::ChannelConfig;
use crate::error::{Error, Result};
use crate::message::Message;

use super::Transport;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a loopback endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Created, not yet opened.
    Connecting,

    /// Open and able to send.
    Open,

    /// Closed. Terminal.
    Closed,
}

#[derive(Debug, Default)]
struct Outbound {
    messages: VecDeque<Message>,
    amount: usize,
}

/// One end of an in-memory channel pair.
///
/// A send goes straight into the peer's inbound queue when nothing is
/// already buffered and the peer has room; otherwise it waits in the
/// outbound buffer until [`flush`](LoopbackTransport::flush) moves it. The
/// buffered amount and arrivals are reported through the same triggers a
/// network transport would use.
#[derive(Debug)]
pub struct LoopbackTransport {
    id: u64,
    config: ChannelConfig,
    state: Arc<ChannelState>,
    inbound: Arc<MessageQueue>,
    outbound: Mutex<Outbound>,
    ready: Mutex<ReadyState>,
    peer: OnceLock<Weak<LoopbackTransport>>,
}

impl LoopbackTransport {
    /// Creates an endpoint with no peer.
    pub fn new(config: ChannelConfig) -> Self {
        let inbound = Arc::new(MessageQueue::with_capacity(config.inbound_capacity));
        let state = Arc::new(ChannelState::with_config(inbound.clone(), &config));

        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            config,
            state,
            inbound,
            outbound: Mutex::new(Outbound::default()),
            ready: Mutex::new(ReadyState::Connecting),
            peer: OnceLock::new(),
        }
    }

    /// Creates two endpoints connected to each other.
    pub fn pair(config: ChannelConfig) -> (Arc<Self>, Arc<Self>) {
        let a = Arc::new(Self::new(config));
        let b = Arc::new(Self::new(config));
        let _ = a.peer.set(Arc::downgrade(&b));
        let _ = b.peer.set(Arc::downgrade(&a));
        log::debug!("[loopback] paired endpoints {} <-> {}", a.id, b.id);
        (a, b)
    }

    /// Returns an application handle for this endpoint.
    pub fn channel(self: &Arc<Self>) -> Channel {
        Channel::new(self.clone(), self.state.clone())
    }

    /// Returns the shared state this endpoint triggers.
    pub fn state(&self) -> &Arc<ChannelState> {
        &self.state
    }

    pub fn ready_state(&self) -> ReadyState {
        *self.ready.lock()
    }

    /// Returns the number of messages waiting in the outbound buffer.
    pub fn buffered_messages(&self) -> usize {
        self.outbound.lock().messages.len()
    }

    /// Opens both ends of the pair, firing `open` on each.
    pub fn open(&self) {
        self.mark_open();
        if let Some(peer) = self.peer() {
            peer.mark_open();
        }
    }

    /// Moves buffered messages into the peer while it has room.
    ///
    /// Reports the remaining buffered amount and returns how many messages
    /// were delivered.
    pub fn flush(&self) -> usize {
        if self.ready_state() != ReadyState::Open {
            return 0;
        }
        let Some(peer) = self.peer() else {
            return 0;
        };

        let mut arrivals = Vec::new();
        let remaining = {
            let mut outbound = self.outbound.lock();
            while let Some(message) = outbound.messages.pop_front() {
                let size = message.size();
                match peer.inbound.try_push(message) {
                    Ok(count) => {
                        outbound.amount -= size;
                        arrivals.push(count);
                    }
                    Err(message) => {
                        outbound.messages.push_front(message);
                        break;
                    }
                }
            }
            outbound.amount
        };

        log::trace!(
            "[loopback {}] flushed {} messages, {} bytes still buffered",
            self.id,
            arrivals.len(),
            remaining
        );

        for count in &arrivals {
            peer.state.trigger_available(*count);
        }
        self.state.trigger_buffered_amount(remaining);

        arrivals.len()
    }

    /// Reports an error on this endpoint.
    pub fn report_error(&self, error: impl Into<String>) {
        let error = error.into();
        log::debug!("[loopback {}] error: {}", self.id, error);
        self.state.trigger_error(error);
    }

    fn peer(&self) -> Option<Arc<LoopbackTransport>> {
        self.peer.get().and_then(Weak::upgrade)
    }

    fn mark_open(&self) {
        {
            let mut ready = self.ready.lock();
            if *ready != ReadyState::Connecting {
                return;
            }
            *ready = ReadyState::Open;
        }
        log::debug!("[loopback {}] open", self.id);
        self.state.trigger_open();
    }

    fn mark_closed(&self) {
        {
            let mut ready = self.ready.lock();
            if *ready == ReadyState::Closed {
                return;
            }
            *ready = ReadyState::Closed;
        }
        log::debug!("[loopback {}] closed", self.id);
        self.state.trigger_closed();
    }
}

impl Transport for LoopbackTransport {
    fn close(&self) {
        self.mark_closed();
        if let Some(peer) = self.peer() {
            peer.mark_closed();
        }
    }

    fn send(&self, message: Message) -> Result<bool> {
        let size = message.size();
        if size > self.config.max_message_size {
            return Err(Error::MessageTooLarge {
                size,
                max: self.config.max_message_size,
            });
        }

        match self.ready_state() {
            ReadyState::Open => {}
            ReadyState::Connecting => return Err(Error::NotConnected),
            ReadyState::Closed => return Err(Error::ChannelClosed),
        }
        let peer = self.peer().ok_or(Error::NotConnected)?;

        let buffered = {
            let mut outbound = self.outbound.lock();
            let message = if outbound.messages.is_empty() {
                match peer.inbound.try_push(message) {
                    Ok(count) => {
                        drop(outbound);
                        log::trace!("[loopback {}] sent {} bytes", self.id, size);
                        peer.state.trigger_available(count);
                        return Ok(true);
                    }
                    Err(message) => message,
                }
            } else {
                message
            };

            outbound.messages.push_back(message);
            outbound.amount += size;
            outbound.amount
        };

        log::trace!(
            "[loopback {}] buffered {} bytes ({} total)",
            self.id,
            size,
            buffered
        );
        self.state.trigger_buffered_amount(buffered);
        Ok(false)
    }

    fn is_open(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    fn is_closed(&self) -> bool {
        self.ready_state() == ReadyState::Closed
    }

    fn max_message_size(&self) -> usize {
        self.config.max_message_size
    }
}
