//! # rtchannel - Channel Event Delivery
//!
//! rtchannel is the event layer shared by every transport endpoint of a
//! real-time peer-to-peer stack (data channels, media tracks). It provides:
//!
//! - **Thread-safe callback slots**: open, closed, error, available,
//!   buffered-amount-low and message handlers can be set from any thread
//! - **Replay of missed events**: a handler attached after its event fired
//!   still sees the most recent occurrence, exactly once
//! - **Ordered delivery**: no message reaches the application before the
//!   open event
//! - **Edge-triggered backpressure**: the low-buffer callback fires once per
//!   downward threshold crossing
//! - **Panic isolation**: a failing callback is logged and never unwinds
//!   into the transport thread
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Application                           │
//! │          on_open / on_message / send / receive           │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Channel (handle)                      │
//! │  ┌──────────────────────┐  ┌─────────────────────────┐  │
//! │  │  Arc<dyn Transport>  │  │   Arc<ChannelState>     │  │
//! │  └──────────────────────┘  │  callback slots         │  │
//! │                            │  buffered amount        │  │
//! │                            └─────────────────────────┘  │
//! ├─────────────────────────────────────────────────────────┤
//! │                 Concrete transport                       │
//! │   owns the inbound queue, calls trigger_open/closed/     │
//! │   error/available/buffered_amount                        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use rtchannel::{ChannelConfig, LoopbackTransport};
//!
//! let (local, remote) = LoopbackTransport::pair(ChannelConfig::default());
//! let channel = local.channel();
//!
//! remote.channel().on_message(|message| println!("got {} bytes", message.size()));
//! channel.on_open(|| println!("open"));
//!
//! local.open();
//! channel.send("Hello, World!").unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod buffer;
pub mod channel;
pub mod config;
pub mod error;
pub mod message;
pub mod sync;
pub mod transport;

// Re-export commonly used types
pub use buffer::MessageQueue;
pub use channel::{Channel, ChannelState};
pub use config::ChannelConfig;
pub use error::{Error, Result};
pub use message::Message;
pub use sync::{Callback, SynchronizedCallback, SynchronizedStoredCallback};
pub use transport::{Inbound, LoopbackTransport, ReadyState, Transport};

/// Default largest message accepted by one `send`.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 65536;
