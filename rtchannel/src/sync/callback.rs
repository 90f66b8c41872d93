//! Single-slot synchronized callback.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{lock_pair, Callback};

/// Thread-safe holder for at most one callable.
///
/// Assignment and invocation may happen concurrently from any thread.
/// Invocation clones the callable out of the slot and runs it with the lock
/// released, so a running callback may reassign this slot or any other one.
/// An invocation already in progress when the slot is cleared runs to
/// completion.
///
/// Panics raised by the callable propagate to the caller of [`invoke`];
/// trigger sites are responsible for containing them.
///
/// [`invoke`]: SynchronizedCallback::invoke
pub struct SynchronizedCallback<A> {
    slot: Mutex<Option<Callback<A>>>,
}

impl<A> SynchronizedCallback<A> {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Creates a slot holding `callback`.
    pub fn with<F>(callback: F) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            slot: Mutex::new(Some(Arc::new(callback))),
        }
    }

    /// Stores `callback`, replacing the current one.
    pub fn set<F>(&self, callback: F)
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        self.assign(Some(Arc::new(callback)));
    }

    /// Replaces the held callable, or empties the slot with `None`.
    pub fn assign(&self, callback: Option<Callback<A>>) {
        let previous = std::mem::replace(&mut *self.slot.lock(), callback);
        // Captured state of the old callable is dropped outside the lock.
        drop(previous);
    }

    /// Empties the slot.
    pub fn clear(&self) {
        self.assign(None);
    }

    /// Copies the callable held by `other` into this slot.
    ///
    /// Both slots are locked together; concurrent `a.assign_from(&b)` and
    /// `b.assign_from(&a)` never deadlock.
    pub fn assign_from(&self, other: &Self) {
        if std::ptr::eq(self, other) {
            return;
        }

        let previous = {
            let (mut mine, theirs) = lock_pair(&self.slot, &other.slot);
            std::mem::replace(&mut *mine, theirs.clone())
        };
        drop(previous);
    }

    /// Moves the callable held by `other` into this slot, leaving `other`
    /// empty.
    pub fn take_from(&self, other: &Self) {
        if std::ptr::eq(self, other) {
            return;
        }

        let previous = {
            let (mut mine, mut theirs) = lock_pair(&self.slot, &other.slot);
            std::mem::replace(&mut *mine, theirs.take())
        };
        drop(previous);
    }

    /// Returns a handle to the current callable.
    pub fn load(&self) -> Option<Callback<A>> {
        self.slot.lock().clone()
    }

    /// Invokes the current callable with `args`.
    ///
    /// Returns `true` if a callable was present.
    pub fn invoke(&self, args: A) -> bool {
        match self.load() {
            Some(callback) => {
                callback(args);
                true
            }
            None => false,
        }
    }

    /// Returns true if a callable is held.
    pub fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<A> Default for SynchronizedCallback<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for SynchronizedCallback<A> {
    fn clone(&self) -> Self {
        Self {
            slot: Mutex::new(self.load()),
        }
    }
}

impl<A> fmt::Debug for SynchronizedCallback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynchronizedCallback")
            .field("set", &self.is_set())
            .finish()
    }
}
