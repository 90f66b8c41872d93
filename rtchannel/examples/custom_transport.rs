//! Custom transport implementation example.
//!
//! This example demonstrates how a transport plugs into rtchannel: it
//! implements `Transport` for the outbound side, owns an `Inbound` queue,
//! and reports network events through the `ChannelState` triggers.
//!
//! Run with: cargo run --example custom_transport

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rtchannel::{Channel, ChannelState, Message, MessageQueue, Result, Transport};

/// A transport that pretends every send sits in a socket buffer until the
/// simulated network drains it.
struct SimulatedTransport {
    state: Arc<ChannelState>,
    inbound: Arc<MessageQueue>,
    in_flight: AtomicUsize,
    open: AtomicBool,
}

impl SimulatedTransport {
    fn new() -> Arc<Self> {
        let inbound = Arc::new(MessageQueue::new());
        let state = Arc::new(ChannelState::new(inbound.clone()));
        Arc::new(Self {
            state,
            inbound,
            in_flight: AtomicUsize::new(0),
            open: AtomicBool::new(false),
        })
    }

    fn channel(self: &Arc<Self>) -> Channel {
        Channel::new(self.clone(), self.state.clone())
    }

    /// Network event: handshake complete.
    fn on_connected(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.state.trigger_open();
    }

    /// Network event: a message arrived.
    fn on_received(&self, message: Message) {
        if let Ok(count) = self.inbound.try_push(message) {
            self.state.trigger_available(count);
        }
    }

    /// Network event: `bytes` left the socket buffer.
    fn on_drained(&self, bytes: usize) {
        let previous = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(v.saturating_sub(bytes))
            })
            .unwrap_or_else(|v| v);
        self.state.trigger_buffered_amount(previous.saturating_sub(bytes));
    }
}

impl Transport for SimulatedTransport {
    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.state.trigger_closed();
        }
    }

    fn send(&self, message: Message) -> Result<bool> {
        let total = self.in_flight.fetch_add(message.size(), Ordering::SeqCst) + message.size();
        self.state.trigger_buffered_amount(total);
        Ok(false)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn is_closed(&self) -> bool {
        !self.is_open()
    }
}

fn main() {
    println!("=== rtchannel Custom Transport Example ===\n");

    let transport = SimulatedTransport::new();
    let channel = transport.channel();

    // A message arrives before anyone listens and before open.
    transport.on_received(Message::from("early bird"));

    channel.on_message(|message| println!("   [app] message: {:?}", message));
    channel.on_closed(|| println!("   [app] closed"));
    channel.on_error(|error| println!("   [app] error: {}", error));
    channel.set_buffered_amount_low_threshold(100);
    channel.on_buffered_amount_low(|| println!("   [app] buffered amount low, send more"));

    println!("1. Open (queued message is delivered after the open event):");
    channel.on_open(|| println!("   [app] open"));
    transport.on_connected();
    println!();

    println!("2. Send and drain:");
    for _ in 0..4 {
        channel.send(vec![0u8; 64]).expect("send failed");
        println!("   Buffered: {} bytes", channel.buffered_amount());
    }
    for _ in 0..4 {
        transport.on_drained(64);
        println!("   Buffered: {} bytes", channel.buffered_amount());
    }
    println!();

    println!("3. Panicking handler is contained:");
    channel.on_message(|_| panic!("handler bug"));
    transport.on_received(Message::from("trigger"));
    println!("   Transport still running: {}", channel.is_open());
    println!();

    println!("4. Close:");
    channel.close();

    println!("\n=== Example Complete ===");
}
