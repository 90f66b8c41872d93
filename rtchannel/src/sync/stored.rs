//! Synchronized callback with replay of the last missed invocation.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{lock_pair, Callback};

struct StoredSlot<A> {
    callback: Option<Callback<A>>,
    /// Arguments of the most recent invocation that found no callable.
    stored: Option<A>,
}

/// Callback slot that remembers the last invocation it missed.
///
/// Invoking while empty stores the arguments, overwriting any earlier
/// stored ones. The next assignment of a callable replays that single stored
/// invocation once and clears it. Missed events are not queued: only the
/// most recent one survives.
///
/// One lock guards both the callable and the stored arguments, so an
/// invocation and an assignment racing each other deliver the event exactly
/// once. As with [`SynchronizedCallback`](super::SynchronizedCallback), the
/// callable always runs with the lock released.
pub struct SynchronizedStoredCallback<A> {
    slot: Mutex<StoredSlot<A>>,
}

impl<A> SynchronizedStoredCallback<A> {
    /// Creates an empty slot with nothing stored.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(StoredSlot {
                callback: None,
                stored: None,
            }),
        }
    }

    /// Stores `callback`, replaying the stored invocation if there is one.
    pub fn set<F>(&self, callback: F)
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        self.assign(Some(Arc::new(callback)));
    }

    /// Replaces the held callable.
    ///
    /// Assigning `None` empties the slot but keeps any stored invocation for
    /// the next callable.
    pub fn assign(&self, callback: Option<Callback<A>>) {
        let (previous, replay) = {
            let mut guard = self.slot.lock();
            let slot = &mut *guard;
            let previous = std::mem::replace(&mut slot.callback, callback);
            (previous, Self::take_replay(slot))
        };
        drop(previous);

        if let Some((callback, args)) = replay {
            callback(args);
        }
    }

    /// Empties the slot; a stored invocation stays pending.
    pub fn clear(&self) {
        self.assign(None);
    }

    /// Empties the slot and discards any stored invocation.
    pub fn reset(&self) {
        let previous = {
            let mut slot = self.slot.lock();
            slot.stored = None;
            slot.callback.take()
        };
        drop(previous);
    }

    /// Copies the callable held by `other` into this slot.
    ///
    /// The stored invocation of this slot, if any, is replayed into the
    /// copied callable. Stored invocations of `other` stay with `other`.
    pub fn assign_from(&self, other: &Self) {
        if std::ptr::eq(self, other) {
            return;
        }

        let (previous, replay) = {
            let (mut mine, theirs) = lock_pair(&self.slot, &other.slot);
            let mine = &mut *mine;
            let previous = std::mem::replace(&mut mine.callback, theirs.callback.clone());
            (previous, Self::take_replay(mine))
        };
        drop(previous);

        if let Some((callback, args)) = replay {
            callback(args);
        }
    }

    /// Moves the callable held by `other` into this slot, leaving `other`
    /// empty.
    pub fn take_from(&self, other: &Self) {
        if std::ptr::eq(self, other) {
            return;
        }

        let (previous, replay) = {
            let (mut mine, mut theirs) = lock_pair(&self.slot, &other.slot);
            let mine = &mut *mine;
            let previous = std::mem::replace(&mut mine.callback, theirs.callback.take());
            (previous, Self::take_replay(mine))
        };
        drop(previous);

        if let Some((callback, args)) = replay {
            callback(args);
        }
    }

    /// Invokes the current callable, or stores `args` if there is none.
    ///
    /// Always returns `true`: callers cannot use the result to learn whether
    /// a live callback ran.
    pub fn invoke(&self, args: A) -> bool {
        let callback = {
            let mut slot = self.slot.lock();
            match slot.callback.clone() {
                Some(callback) => callback,
                None => {
                    slot.stored = Some(args);
                    return true;
                }
            }
        };

        callback(args);
        true
    }

    /// Returns true if a callable is held.
    pub fn is_set(&self) -> bool {
        self.slot.lock().callback.is_some()
    }

    /// Returns true if an invocation is waiting for a callable.
    pub fn has_stored(&self) -> bool {
        self.slot.lock().stored.is_some()
    }

    fn take_replay(slot: &mut StoredSlot<A>) -> Option<(Callback<A>, A)> {
        let callback = slot.callback.clone()?;
        let args = slot.stored.take()?;
        Some((callback, args))
    }
}

impl<A> Default for SynchronizedStoredCallback<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for SynchronizedStoredCallback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("SynchronizedStoredCallback")
            .field("set", &slot.callback.is_some())
            .field("stored", &slot.stored.is_some())
            .finish()
    }
}
