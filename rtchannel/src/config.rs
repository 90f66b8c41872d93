use crate::DEFAULT_MAX_MESSAGE_SIZE;

/// Per-channel settings applied by a transport when it creates its
/// [`ChannelState`](crate::channel::ChannelState).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Largest message accepted by a single `send`.
    pub max_message_size: usize,

    /// Byte limit of the receiving queue. Zero means unbounded.
    pub inbound_capacity: usize,

    /// Initial buffered-amount-low threshold.
    pub buffered_amount_low_threshold: usize,
}

impl ChannelConfig {
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            inbound_capacity: 0,
            buffered_amount_low_threshold: 0,
        }
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn with_inbound_capacity(mut self, bytes: usize) -> Self {
        self.inbound_capacity = bytes;
        self
    }

    pub fn with_buffered_amount_low_threshold(mut self, amount: usize) -> Self {
        self.buffered_amount_low_threshold = amount;
        self
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new()
    }
}
