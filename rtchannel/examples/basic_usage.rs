//! Basic usage example for rtchannel.
//!
//! This example shows how to:
//! - Create a connected pair of loopback endpoints
//! - Register event callbacks, before and after the events fire
//! - Send in push mode and read in pull mode
//! - React to buffered-amount-low backpressure
//!
//! Run with: cargo run --example basic_usage

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rtchannel::{ChannelConfig, LoopbackTransport, Message};

fn main() {
    println!("=== rtchannel Basic Usage Example ===\n");

    // Example 1: Push mode
    println!("1. Push Mode:");
    let (local, remote) = LoopbackTransport::pair(ChannelConfig::default());
    let sender = local.channel();
    let receiver = remote.channel();

    sender.on_open(|| println!("   [sender] open"));
    receiver.on_message_split(
        |data| println!("   [receiver] binary message: {} bytes", data.len()),
        |text| println!("   [receiver] text message: {:?}", text),
    );

    local.open();
    sender.send("Hello via loopback!").expect("send failed");
    sender.send_bytes(&[0xAB; 16]).expect("send failed");
    println!();

    // Example 2: Late registration
    println!("2. Late Registration:");
    receiver.on_open(|| println!("   [receiver] open (replayed to a late handler)"));
    println!();

    // Example 3: Pull mode
    println!("3. Pull Mode:");
    let (local, remote) = LoopbackTransport::pair(ChannelConfig::default());
    let reader = remote.channel();
    reader.on_available(|| println!("   [reader] data available"));

    local.open();
    for i in 0..3 {
        local.channel().send(format!("message {}", i)).expect("send failed");
    }
    println!("   Available: {} bytes", reader.available_amount());
    println!("   Peek: {:?}", reader.peek());
    while let Some(message) = reader.receive() {
        if let Message::Text(text) = message {
            println!("   Received: {}", text);
        }
    }
    println!();

    // Example 4: Backpressure
    println!("4. Backpressure:");
    let config = ChannelConfig::default()
        .with_inbound_capacity(64)
        .with_buffered_amount_low_threshold(32);
    let (local, remote) = LoopbackTransport::pair(config);
    let sender = local.channel();
    let reader = remote.channel();

    let low_events = Arc::new(AtomicUsize::new(0));
    let counter = low_events.clone();
    sender.on_buffered_amount_low(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        println!("   [sender] buffered amount low");
    });

    local.open();
    for _ in 0..6 {
        let immediate = sender.send(vec![0u8; 32]).expect("send failed");
        println!(
            "   Sent 32 bytes: {} (buffered: {} bytes)",
            if immediate { "delivered" } else { "buffered" },
            sender.buffered_amount()
        );
    }

    while sender.buffered_amount() > 0 {
        while reader.receive().is_some() {}
        let moved = local.flush();
        println!(
            "   Flushed {} messages, {} bytes still buffered",
            moved,
            sender.buffered_amount()
        );
    }
    println!("   Low events: {}", low_events.load(Ordering::SeqCst));

    println!("\n=== Example Complete ===");
}
