// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A set-once, cross-thread shutdown event.
//!
//! [`ShutdownEvent`] is cheap to clone; every clone observes the same flag.
//! Threads can poll it, block on it, or subscribe a [`ShutdownListener`] that
//! runs once when the event fires. Pools subscribe themselves so a single
//! `signal()` wakes every thread blocked in any of them.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Receives a callback when a [`ShutdownEvent`] fires.
///
/// The callback runs on the thread that called [`ShutdownEvent::signal`]
/// with no event lock held.
pub trait ShutdownListener: Send + Sync {
    /// Called exactly once, after the event's flag is visible as set.
    fn on_shutdown(&self);
}

struct EventInner {
    signaled: AtomicBool,
    listeners: Mutex<Vec<Weak<dyn ShutdownListener>>>,
    fired: Condvar,
}

/// A thread-safe, set-once shutdown flag.
///
/// # Example
/// ```
/// use stream_pool::ShutdownEvent;
///
/// let event = ShutdownEvent::new();
/// let observer = event.clone();
///
/// assert!(event.signal());
/// assert!(!event.signal()); // only the first call fires it
/// assert!(observer.is_signaled());
/// ```
#[derive(Clone)]
pub struct ShutdownEvent {
    inner: Arc<EventInner>,
}

impl ShutdownEvent {
    /// Creates an unsignaled event.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EventInner {
                signaled: AtomicBool::new(false),
                listeners: Mutex::new(Vec::new()),
                fired: Condvar::new(),
            }),
        }
    }

    /// Sets the event, wakes every waiter and runs every live listener.
    ///
    /// Returns `true` if this call set the event, `false` if it was already set.
    pub fn signal(&self) -> bool {
        let listeners = {
            let mut listeners = self.inner.listeners.lock();
            if self.inner.signaled.swap(true, Ordering::SeqCst) {
                return false;
            }
            self.inner.fired.notify_all();
            std::mem::take(&mut *listeners)
        };

        for listener in listeners.iter().filter_map(Weak::upgrade) {
            listener.on_shutdown();
        }
        true
    }

    /// Returns `true` once the event has been signaled.
    pub fn is_signaled(&self) -> bool {
        self.inner.signaled.load(Ordering::SeqCst)
    }

    /// Blocks until the event is signaled.
    pub fn wait(&self) {
        let mut listeners = self.inner.listeners.lock();
        while !self.is_signaled() {
            self.inner.fired.wait(&mut listeners);
        }
    }

    /// Blocks until the event is signaled or `timeout` elapses.
    ///
    /// Returns `true` if the event is signaled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut listeners = self.inner.listeners.lock();
        if !self.is_signaled() {
            // Spurious wakeups only shorten the wait; the flag is re-read below.
            let _ = self
                .inner
                .fired
                .wait_while_for(&mut listeners, |_| !self.is_signaled(), timeout);
        }
        self.is_signaled()
    }

    /// Registers `listener` to run when the event fires.
    ///
    /// If the event is already signaled the listener runs immediately on the
    /// calling thread. Only a weak reference is kept, so subscribing does not
    /// extend the listener's lifetime.
    pub fn subscribe(&self, listener: Weak<dyn ShutdownListener>) {
        {
            let mut listeners = self.inner.listeners.lock();
            if !self.is_signaled() {
                listeners.retain(|l| l.strong_count() > 0);
                listeners.push(listener);
                return;
            }
        }
        if let Some(listener) = listener.upgrade() {
            listener.on_shutdown();
        }
    }

    /// Returns the number of subscribed listeners that are still alive.
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .iter()
            .filter(|l| l.strong_count() > 0)
            .count()
    }
}

impl Default for ShutdownEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShutdownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownEvent")
            .field("signaled", &self.is_signaled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl ShutdownListener for Counter {
        fn on_shutdown(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_signal_once() {
        let event = ShutdownEvent::new();
        assert!(!event.is_signaled());
        assert!(event.signal());
        assert!(!event.signal());
        assert!(event.is_signaled());
    }

    #[test]
    fn test_clones_share_state() {
        let event = ShutdownEvent::new();
        let clone = event.clone();
        clone.signal();
        assert!(event.is_signaled());
    }

    #[test]
    fn test_wait_unblocks() {
        let event = ShutdownEvent::new();
        let waiter = {
            let event = event.clone();
            thread::spawn(move || event.wait())
        };
        thread::sleep(Duration::from_millis(20));
        event.signal();
        waiter.join().unwrap();
    }

    #[test]
    fn test_wait_timeout() {
        let event = ShutdownEvent::new();
        assert!(!event.wait_timeout(Duration::from_millis(10)));
        event.signal();
        assert!(event.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_listener_runs_once() {
        let event = ShutdownEvent::new();
        let counter = Arc::new(Counter::default());
        let weak: Weak<dyn ShutdownListener> = Arc::downgrade(&counter) as Weak<dyn ShutdownListener>;
        event.subscribe(weak);
        assert_eq!(event.listener_count(), 1);

        event.signal();
        event.signal();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_late_subscriber_runs_immediately() {
        let event = ShutdownEvent::new();
        event.signal();

        let counter = Arc::new(Counter::default());
        event.subscribe(Arc::downgrade(&counter) as Weak<dyn ShutdownListener>);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_listener_is_skipped() {
        let event = ShutdownEvent::new();
        let counter = Arc::new(Counter::default());
        event.subscribe(Arc::downgrade(&counter) as Weak<dyn ShutdownListener>);
        drop(counter);

        assert_eq!(event.listener_count(), 0);
        assert!(event.signal());
    }
}
