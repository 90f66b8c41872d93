//! Callback slots shared between transport threads and the application.
//!
//! This module provides two holders:
//! - SynchronizedCallback: one optional callable, invoked under mutual exclusion
//! - SynchronizedStoredCallback: same, plus replay of the last missed invocation
//!
//! A slot never holds its lock while the callable runs. The callable is an
//! `Arc` cloned out of the slot, so a callback may re-register any slot,
//! including the one it was invoked from.

mod callback;
mod stored;

pub use callback::SynchronizedCallback;
pub use stored::SynchronizedStoredCallback;

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// A shareable callable taking the event arguments.
///
/// Callbacks without arguments use `A = ()`; several arguments are passed as
/// a tuple.
pub type Callback<A> = Arc<dyn Fn(A) + Send + Sync>;

/// Locks two distinct mutexes as one composite step.
///
/// Locks are always taken in address order, so two threads running the
/// converse pair (`a, b` and `b, a`) cannot deadlock. The guards are
/// returned in argument order.
pub(crate) fn lock_pair<'a, T>(
    first: &'a Mutex<T>,
    second: &'a Mutex<T>,
) -> (MutexGuard<'a, T>, MutexGuard<'a, T>) {
    debug_assert!(!std::ptr::eq(first, second), "lock_pair on a single mutex");

    if (first as *const Mutex<T>) < (second as *const Mutex<T>) {
        let a = first.lock();
        let b = second.lock();
        (a, b)
    } else {
        let b = second.lock();
        let a = first.lock();
        (a, b)
    }
}
