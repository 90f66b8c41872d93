//! Message queue used as a transport's inbound buffer.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::message::Message;
use crate::transport::Inbound;

#[derive(Debug, Default)]
struct QueueInner {
    messages: VecDeque<Message>,
    amount: usize,
}

/// A FIFO of whole messages bounded by total payload bytes.
///
/// The queue is shared between the thread that fills it and the thread that
/// drains it, so every operation takes `&self`.
#[derive(Debug)]
pub struct MessageQueue {
    inner: Mutex<QueueInner>,

    /// Byte limit; zero means unbounded.
    capacity: usize,
}

impl MessageQueue {
    /// Creates an unbounded queue.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a queue holding at most `capacity` payload bytes.
    ///
    /// An empty queue always accepts one message, even one larger than
    /// `capacity`, so oversized messages cannot wedge the queue.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            capacity,
        }
    }

    /// Returns the byte limit (zero if unbounded).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of queued messages.
    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    /// Returns true if no message is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().messages.is_empty()
    }

    /// Returns the total payload bytes queued.
    pub fn amount(&self) -> usize {
        self.inner.lock().amount
    }

    /// Returns true if a message of `size` bytes would be accepted now.
    pub fn has_room(&self, size: usize) -> bool {
        Self::fits(&self.inner.lock(), self.capacity, size)
    }

    /// Appends a message.
    ///
    /// Returns the queue length after the push, or gives the message back if
    /// it does not fit.
    pub fn try_push(&self, message: Message) -> Result<usize, Message> {
        let mut inner = self.inner.lock();
        let size = message.size();
        if !Self::fits(&inner, self.capacity, size) {
            return Err(message);
        }

        inner.amount += size;
        inner.messages.push_back(message);
        Ok(inner.messages.len())
    }

    /// Removes and returns the oldest message.
    pub fn pop(&self) -> Option<Message> {
        let mut inner = self.inner.lock();
        let message = inner.messages.pop_front()?;
        inner.amount -= message.size();
        Some(message)
    }

    /// Returns a copy of the oldest message without removing it.
    pub fn peek(&self) -> Option<Message> {
        self.inner.lock().messages.front().cloned()
    }

    /// Drops every queued message.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.messages.clear();
        inner.amount = 0;
    }

    fn fits(inner: &QueueInner, capacity: usize, size: usize) -> bool {
        capacity == 0 || inner.messages.is_empty() || inner.amount + size <= capacity
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Inbound for MessageQueue {
    fn receive(&self) -> Option<Message> {
        self.pop()
    }

    fn peek(&self) -> Option<Message> {
        MessageQueue::peek(self)
    }

    fn available_amount(&self) -> usize {
        self.amount()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_fifo() {
        let queue = MessageQueue::new();
        assert_eq!(queue.try_push(Message::from("one")), Ok(1));
        assert_eq!(queue.try_push(Message::from("two")), Ok(2));

        assert_eq!(queue.peek(), Some(Message::from("one")));
        assert_eq!(queue.pop(), Some(Message::from("one")));
        assert_eq!(queue.pop(), Some(Message::from("two")));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_queue_amount() {
        let queue = MessageQueue::new();
        queue.try_push(Message::from(vec![0u8; 10])).unwrap();
        queue.try_push(Message::from("abc")).unwrap();
        assert_eq!(queue.amount(), 13);
        assert_eq!(queue.available_amount(), 13);

        queue.pop();
        assert_eq!(queue.amount(), 3);

        queue.clear();
        assert_eq!(queue.amount(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_capacity() {
        let queue = MessageQueue::with_capacity(8);
        queue.try_push(Message::from(vec![0u8; 6])).unwrap();
        assert!(!queue.has_room(3));

        let rejected = queue.try_push(Message::from(vec![1u8; 3]));
        assert_eq!(rejected, Err(Message::from(vec![1u8; 3])));
        assert_eq!(queue.len(), 1);

        queue.try_push(Message::from(vec![0u8; 2])).unwrap();
        assert_eq!(queue.amount(), 8);
    }

    #[test]
    fn test_queue_oversized_when_empty() {
        let queue = MessageQueue::with_capacity(4);
        assert_eq!(queue.try_push(Message::from(vec![0u8; 16])), Ok(1));
        assert!(queue.try_push(Message::from("x")).is_err());
    }
}
