//! Buffer management for channel transports.
//!
//! This module provides:
//! - MessageQueue: bounded FIFO of whole messages with byte accounting

mod queue;

pub use queue::MessageQueue;
