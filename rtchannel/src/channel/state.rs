//! Shared channel state driven by the transport.
//!
//! The transport reports network events through the `trigger_*` methods;
//! each one invokes at most one application callback and may then drain
//! the inbound queue into the message callback.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::ChannelConfig;
use crate::message::Message;
use crate::sync::{SynchronizedCallback, SynchronizedStoredCallback};
use crate::transport::Inbound;

/// Callback slots, counters and the open gate of one channel.
///
/// Shared through an `Arc` between the transport, which calls the
/// triggers, and every [`Channel`](super::Channel) handle, which registers
/// callbacks. Dropped when the last holder goes away.
pub struct ChannelState {
    inbound: Arc<dyn Inbound>,

    pub(crate) open_callback: SynchronizedStoredCallback<()>,
    pub(crate) closed_callback: SynchronizedStoredCallback<()>,
    pub(crate) error_callback: SynchronizedStoredCallback<String>,
    pub(crate) available_callback: SynchronizedStoredCallback<()>,
    pub(crate) buffered_amount_low_callback: SynchronizedStoredCallback<()>,
    pub(crate) message_callback: SynchronizedCallback<Message>,

    buffered_amount: AtomicUsize,
    buffered_amount_low_threshold: AtomicUsize,

    /// Set by `trigger_open`; messages are never delivered before it.
    open_triggered: AtomicBool,
}

impl ChannelState {
    /// Creates the state for a channel whose received messages are pulled
    /// from `inbound`.
    pub fn new(inbound: Arc<dyn Inbound>) -> Self {
        Self {
            inbound,
            open_callback: SynchronizedStoredCallback::new(),
            closed_callback: SynchronizedStoredCallback::new(),
            error_callback: SynchronizedStoredCallback::new(),
            available_callback: SynchronizedStoredCallback::new(),
            buffered_amount_low_callback: SynchronizedStoredCallback::new(),
            message_callback: SynchronizedCallback::new(),
            buffered_amount: AtomicUsize::new(0),
            buffered_amount_low_threshold: AtomicUsize::new(0),
            open_triggered: AtomicBool::new(false),
        }
    }

    /// Creates the state and applies the initial threshold from `config`.
    pub fn with_config(inbound: Arc<dyn Inbound>, config: &ChannelConfig) -> Self {
        let state = Self::new(inbound);
        state.set_buffered_amount_low_threshold(config.buffered_amount_low_threshold);
        state
    }

    /// Returns the inbound queue this state drains.
    pub fn inbound(&self) -> &dyn Inbound {
        &*self.inbound
    }

    /// Reports that the channel opened.
    ///
    /// Arms delivery of received messages, invokes the open callback, then
    /// flushes anything already queued.
    pub fn trigger_open(&self) {
        log::trace!("trigger open");
        self.open_triggered.store(true, Ordering::SeqCst);
        guarded("open", || {
            self.open_callback.invoke(());
        });
        self.flush_pending_messages();
    }

    /// Reports that the channel closed.
    pub fn trigger_closed(&self) {
        log::trace!("trigger closed");
        guarded("closed", || {
            self.closed_callback.invoke(());
        });
    }

    /// Reports an error.
    pub fn trigger_error(&self, error: String) {
        log::trace!("trigger error: {}", error);
        guarded("error", || {
            self.error_callback.invoke(error);
        });
    }

    /// Reports the number of messages now waiting in the inbound queue.
    ///
    /// Only a count of exactly 1, the empty-to-non-empty transition, fires
    /// the available callback. Every call attempts a flush.
    pub fn trigger_available(&self, count: usize) {
        log::trace!("trigger available: {}", count);
        if count == 1 {
            guarded("available", || {
                self.available_callback.invoke(());
            });
        }
        self.flush_pending_messages();
    }

    /// Reports the number of bytes now buffered for sending.
    ///
    /// Fires the low callback only when the amount crosses the threshold
    /// downward: previous above, new at or below.
    pub fn trigger_buffered_amount(&self, amount: usize) {
        let previous = self.buffered_amount.swap(amount, Ordering::SeqCst);
        let threshold = self.buffered_amount_low_threshold.load(Ordering::SeqCst);
        log::trace!(
            "trigger buffered amount: {} -> {} (threshold {})",
            previous,
            amount,
            threshold
        );

        if previous > threshold && amount <= threshold {
            guarded("buffered amount low", || {
                self.buffered_amount_low_callback.invoke(());
            });
        }
    }

    /// Delivers queued messages to the message callback.
    ///
    /// Does nothing until the channel has been opened. Stops at the first
    /// empty receive or as soon as no message callback is registered;
    /// messages arriving during the drain are delivered too.
    pub fn flush_pending_messages(&self) {
        if !self.open_triggered.load(Ordering::SeqCst) {
            return;
        }

        while let Some(callback) = self.message_callback.load() {
            let Some(message) = self.inbound.receive() else {
                break;
            };
            guarded("message", || callback(message));
        }
    }

    /// Clears the open callback and rearms the open gate.
    pub fn reset_open_callback(&self) {
        self.open_triggered.store(false, Ordering::SeqCst);
        self.open_callback.clear();
    }

    /// Clears every callback and rearms the open gate.
    ///
    /// An event that fired while its slot was empty stays pending and is
    /// replayed to the next callback assigned to that slot.
    pub fn reset_callbacks(&self) {
        self.open_triggered.store(false, Ordering::SeqCst);
        self.open_callback.clear();
        self.closed_callback.clear();
        self.error_callback.clear();
        self.available_callback.clear();
        self.buffered_amount_low_callback.clear();
        self.message_callback.clear();
    }

    /// Returns true once `trigger_open` has run since creation or the last
    /// reset.
    pub fn is_open_triggered(&self) -> bool {
        self.open_triggered.load(Ordering::SeqCst)
    }

    /// Returns the bytes buffered for sending, as last reported.
    pub fn buffered_amount(&self) -> usize {
        self.buffered_amount.load(Ordering::SeqCst)
    }

    pub fn buffered_amount_low_threshold(&self) -> usize {
        self.buffered_amount_low_threshold.load(Ordering::SeqCst)
    }

    /// Sets the low threshold. Takes effect at the next
    /// `trigger_buffered_amount`.
    pub fn set_buffered_amount_low_threshold(&self, amount: usize) {
        self.buffered_amount_low_threshold.store(amount, Ordering::SeqCst);
    }

    /// Returns true if a message callback is registered.
    pub fn has_message_callback(&self) -> bool {
        self.message_callback.is_set()
    }
}

impl fmt::Debug for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelState")
            .field("open_triggered", &self.is_open_triggered())
            .field("buffered_amount", &self.buffered_amount())
            .field("buffered_amount_low_threshold", &self.buffered_amount_low_threshold())
            .field("open_callback", &self.open_callback)
            .field("closed_callback", &self.closed_callback)
            .field("error_callback", &self.error_callback)
            .field("available_callback", &self.available_callback)
            .field("buffered_amount_low_callback", &self.buffered_amount_low_callback)
            .field("message_callback", &self.message_callback)
            .finish()
    }
}

/// Runs an application callback, logging and discarding any panic.
fn guarded<F: FnOnce()>(event: &str, f: F) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        log::warn!(
            "Uncaught panic in {} callback: {}",
            event,
            panic_message(&*payload)
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::MessageQueue;
    use parking_lot::Mutex;

    fn setup() -> (Arc<MessageQueue>, ChannelState) {
        let queue = Arc::new(MessageQueue::new());
        let state = ChannelState::new(queue.clone());
        (queue, state)
    }

    fn count_calls(slot: &SynchronizedStoredCallback<()>) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        slot.set(move |()| {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    fn record_messages(state: &ChannelState) -> Arc<Mutex<Vec<Message>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let inner = seen.clone();
        state.message_callback.set(move |message| inner.lock().push(message));
        seen
    }

    fn low_fires(threshold: usize, amounts: &[usize]) -> Vec<usize> {
        let (_, state) = setup();
        state.set_buffered_amount_low_threshold(threshold);

        let step = Arc::new(AtomicUsize::new(0));
        let fired = Arc::new(Mutex::new(Vec::new()));
        let (current, inner) = (step.clone(), fired.clone());
        state
            .buffered_amount_low_callback
            .set(move |()| inner.lock().push(current.load(Ordering::SeqCst)));

        for (i, amount) in amounts.iter().enumerate() {
            step.store(i, Ordering::SeqCst);
            state.trigger_buffered_amount(*amount);
        }

        let fired = fired.lock().clone();
        fired
    }

    #[test]
    fn test_buffered_amount_low_crossing() {
        assert_eq!(low_fires(100, &[150, 80]), vec![1]);
    }

    #[test]
    fn test_buffered_amount_low_already_below() {
        assert!(low_fires(100, &[80, 50]).is_empty());
    }

    #[test]
    fn test_buffered_amount_low_up_then_down() {
        assert_eq!(low_fires(100, &[50, 120, 80]), vec![2]);
    }

    #[test]
    fn test_buffered_amount_low_at_threshold() {
        assert_eq!(low_fires(100, &[101, 100, 100, 0]), vec![1]);
    }

    #[test]
    fn test_buffered_amount_tracks_latest() {
        let (_, state) = setup();
        state.trigger_buffered_amount(42);
        assert_eq!(state.buffered_amount(), 42);
        state.trigger_buffered_amount(7);
        assert_eq!(state.buffered_amount(), 7);
    }

    #[test]
    fn test_threshold_change_not_reevaluated() {
        let (_, state) = setup();
        let count = count_calls(&state.buffered_amount_low_callback);

        state.trigger_buffered_amount(50);
        state.set_buffered_amount_low_threshold(100);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        state.trigger_buffered_amount(40);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_threshold_from_config() {
        let queue = Arc::new(MessageQueue::new());
        let config = ChannelConfig::default().with_buffered_amount_low_threshold(64);
        let state = ChannelState::with_config(queue, &config);
        assert_eq!(state.buffered_amount_low_threshold(), 64);
    }

    #[test]
    fn test_available_only_on_first() {
        let (_, state) = setup();
        let count = count_calls(&state.available_callback);

        state.trigger_available(1);
        state.trigger_available(2);
        state.trigger_available(0);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        state.trigger_available(1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_available_flushes_for_any_count() {
        let (queue, state) = setup();
        state.trigger_open();
        let seen = record_messages(&state);

        for count in [2usize, 0] {
            queue.try_push(Message::from("m")).unwrap();
            state.trigger_available(count);
        }
        assert_eq!(seen.lock().len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_no_flush_before_open() {
        let (queue, state) = setup();
        let seen = record_messages(&state);

        queue.try_push(Message::from("a")).unwrap();
        queue.try_push(Message::from("b")).unwrap();
        state.trigger_available(1);
        state.flush_pending_messages();

        assert!(seen.lock().is_empty());
        assert_eq!(queue.len(), 2);

        state.trigger_open();
        assert_eq!(*seen.lock(), vec![Message::from("a"), Message::from("b")]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_flush_without_message_callback_keeps_queue() {
        let (queue, state) = setup();
        state.trigger_open();

        queue.try_push(Message::from("a")).unwrap();
        state.flush_pending_messages();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_open_replayed_to_late_handler() {
        let (_, state) = setup();
        state.trigger_open();

        let count = count_calls(&state.open_callback);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_replays_latest() {
        let (_, state) = setup();
        state.trigger_error("first".to_owned());
        state.trigger_error("second".to_owned());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let inner = seen.clone();
        state.error_callback.set(move |error| inner.lock().push(error));

        assert_eq!(*seen.lock(), vec!["second".to_owned()]);
    }

    #[test]
    fn test_closed_invokes_callback() {
        let (_, state) = setup();
        let count = count_calls(&state.closed_callback);
        state.trigger_closed();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!state.is_open_triggered());
    }

    #[test]
    fn test_reset_callbacks() {
        let (queue, state) = setup();
        count_calls(&state.open_callback);
        count_calls(&state.closed_callback);
        count_calls(&state.available_callback);
        count_calls(&state.buffered_amount_low_callback);
        state.error_callback.set(|_| {});
        record_messages(&state);
        state.trigger_open();

        state.reset_callbacks();

        assert!(!state.open_callback.is_set());
        assert!(!state.closed_callback.is_set());
        assert!(!state.error_callback.is_set());
        assert!(!state.available_callback.is_set());
        assert!(!state.buffered_amount_low_callback.is_set());
        assert!(!state.has_message_callback());
        assert!(!state.is_open_triggered());
        // Every event above reached a live callback, so nothing replays.
        assert!(!state.open_callback.has_stored());
        assert!(!state.closed_callback.has_stored());

        // Gate is closed again until the next open.
        let seen = record_messages(&state);
        queue.try_push(Message::from("x")).unwrap();
        state.flush_pending_messages();
        assert!(seen.lock().is_empty());

        state.trigger_open();
        assert_eq!(*seen.lock(), vec![Message::from("x")]);
    }

    #[test]
    fn test_missed_events_survive_reset() {
        let (_, state) = setup();
        state.trigger_closed();
        state.trigger_error("late".to_owned());

        state.reset_callbacks();
        assert!(state.closed_callback.has_stored());
        assert!(state.error_callback.has_stored());

        let closed = count_calls(&state.closed_callback);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let inner = errors.clone();
        state.error_callback.set(move |error| inner.lock().push(error));

        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(*errors.lock(), vec!["late".to_owned()]);

        state.closed_callback.set(|()| {});
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missed_open_survives_reset_open_callback() {
        let (_, state) = setup();
        state.trigger_open();

        state.reset_open_callback();
        assert!(!state.is_open_triggered());

        let opened = count_calls(&state.open_callback);
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_open_callback() {
        let (_, state) = setup();
        let closed = count_calls(&state.closed_callback);
        count_calls(&state.open_callback);
        state.trigger_open();

        state.reset_open_callback();
        assert!(!state.open_callback.is_set());
        assert!(!state.is_open_triggered());
        assert!(state.closed_callback.is_set());

        state.trigger_closed();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_open_still_flushes() {
        let (queue, state) = setup();
        state.open_callback.set(|()| panic!("open handler failed"));
        let seen = record_messages(&state);
        queue.try_push(Message::from("a")).unwrap();

        state.trigger_open();
        assert_eq!(*seen.lock(), vec![Message::from("a")]);
    }

    #[test]
    fn test_panicking_callbacks_isolated() {
        let (queue, state) = setup();
        state.closed_callback.set(|()| panic!("closed"));
        state.error_callback.set(|_| panic!("error"));
        state.available_callback.set(|()| panic!("available"));
        state.buffered_amount_low_callback.set(|()| panic!("low"));
        state.message_callback.set(|message: Message| {
            if message == Message::from("bad") {
                panic!("message");
            }
        });

        state.trigger_open();
        state.trigger_closed();
        state.trigger_error("boom".to_owned());
        state.trigger_buffered_amount(10);
        state.trigger_buffered_amount(0);

        queue.try_push(Message::from("bad")).unwrap();
        queue.try_push(Message::from("good")).unwrap();
        state.trigger_available(1);
        assert!(queue.is_empty());

        let count = count_calls(&state.closed_callback);
        state.trigger_closed();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_message_callback_may_unregister() {
        let (queue, state) = setup();
        let state = Arc::new(state);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&state);
        let inner = seen.clone();
        state.message_callback.set(move |message| {
            inner.lock().push(message);
            if let Some(state) = weak.upgrade() {
                state.message_callback.clear();
            }
        });

        queue.try_push(Message::from("a")).unwrap();
        queue.try_push(Message::from("b")).unwrap();
        state.trigger_open();

        assert_eq!(*seen.lock(), vec![Message::from("a")]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_message_arriving_during_drain_is_delivered() {
        let (queue, state) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let (inner, incoming) = (seen.clone(), queue.clone());
        state.message_callback.set(move |message: Message| {
            if message == Message::from("first") {
                incoming.try_push(Message::from("second")).unwrap();
            }
            inner.lock().push(message);
        });

        queue.try_push(Message::from("first")).unwrap();
        state.trigger_open();

        assert_eq!(
            *seen.lock(),
            vec![Message::from("first"), Message::from("second")]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_crossings_fire_once() {
        for _ in 0..200 {
            let (_, state) = setup();
            let state = Arc::new(state);
            state.set_buffered_amount_low_threshold(100);
            let count = count_calls(&state.buffered_amount_low_callback);
            state.trigger_buffered_amount(500);

            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let state = state.clone();
                    std::thread::spawn(move || state.trigger_buffered_amount(10 * i))
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(count.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*payload), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");
        let payload: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(panic_message(&*payload), "unknown panic");
    }
}
