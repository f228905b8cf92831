// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fixed-capacity pool of pre-mapped buffers for one stream.
//!
//! A [`StreamBufferPool`] is built once over a set of [`MappedBuffer`]s and
//! never allocates or maps again. It:
//!
//! 1. Hands buffers out in FIFO order, blocking the caller while all of them
//!    are in use.
//! 2. Takes buffers back explicitly ([`StreamBufferPool::return_buffer`]) or
//!    when a [`PooledBuffer`] is dropped.
//! 3. Refuses to hand out buffers once its [`ShutdownEvent`] fires, waking
//!    every blocked caller.
//! 4. Can be retired when a replacement pool takes over its stream; blocked
//!    callers then wake with [`PoolError::Retired`].
//!
//! # Thread Safety
//! `StreamBufferPool` is a cheap handle (`Clone`) over shared state guarded
//! by one mutex. Blocked callers wait on a condition variable; the mutex is
//! released while they wait.

use crate::{PoolError, PoolStats, PooledBuffer, ShutdownEvent, ShutdownListener};
use dma_mapping::{DmaDirection, MappedBuffer};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Process-unique identifier of a pool instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct PoolId(u64);

impl PoolId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}", self.0)
    }
}

struct PoolState {
    free: VecDeque<MappedBuffer>,
    retired: bool,
    stats: PoolStats,
}

/// State shared between the pool handles and the buffers they hand out.
pub(crate) struct PoolShared {
    id: PoolId,
    stream_name: String,
    direction: DmaDirection,
    frame_size: usize,
    capacity: usize,
    state: Mutex<PoolState>,
    /// Signaled when a buffer comes back.
    available: Condvar,
    /// Signaled when the last outstanding buffer comes back.
    drained: Condvar,
    shutdown: ShutdownEvent,
}

impl PoolShared {
    /// Puts a buffer back on the free list. Called by explicit returns and
    /// by `PooledBuffer::drop`.
    pub(crate) fn recycle(&self, buffer: MappedBuffer) -> Result<(), PoolError> {
        let mut state = self.state.lock();
        if state.free.len() >= self.capacity {
            return Err(PoolError::Overfull {
                stream: self.stream_name.clone(),
                capacity: self.capacity,
            });
        }
        state.free.push_back(buffer);
        state.stats.record_return();
        let idle = state.free.len() == self.capacity;
        drop(state);

        tracing::trace!("stream '{}': buffer returned to {}", self.stream_name, self.id);
        self.available.notify_one();
        if idle {
            self.drained.notify_all();
        }
        Ok(())
    }

    pub(crate) fn stream_name(&self) -> &str {
        &self.stream_name
    }

    fn wake_all(&self) {
        // Taking the lock orders this wakeup after any waiter's flag check.
        let _state = self.state.lock();
        self.available.notify_all();
        self.drained.notify_all();
    }
}

impl ShutdownListener for PoolShared {
    fn on_shutdown(&self) {
        tracing::debug!("stream '{}': shutdown, waking waiters", self.stream_name);
        self.wake_all();
    }
}

/// A pool of pre-mapped, equally sized buffers serving one stream.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use dma_mapping::{DeviceHandle, DmaDirection, DmaMapper, MappedBuffer, VirtualDevice};
/// use stream_pool::{ShutdownEvent, StreamBufferPool};
///
/// let device: Arc<dyn DmaMapper> = Arc::new(VirtualDevice::new(DeviceHandle::new(0)));
/// let buffers = (0..2)
///     .map(|_| MappedBuffer::create(&device, 1024, DmaDirection::DeviceToHost))
///     .collect::<Result<Vec<_>, _>>()
///     .unwrap();
///
/// let pool = StreamBufferPool::new("output0", buffers, ShutdownEvent::new()).unwrap();
/// let frame = pool.acquire().unwrap();
/// assert_eq!(pool.available(), 1);
///
/// drop(frame); // back in the pool
/// assert_eq!(pool.available(), 2);
/// ```
#[derive(Clone)]
pub struct StreamBufferPool {
    shared: Arc<PoolShared>,
}

impl StreamBufferPool {
    /// Builds a pool over `buffers`.
    ///
    /// All buffers must share one frame size and one direction. The pool
    /// subscribes to `shutdown` so that signaling it wakes blocked callers.
    pub fn new(
        stream_name: impl Into<String>,
        buffers: Vec<MappedBuffer>,
        shutdown: ShutdownEvent,
    ) -> Result<Self, PoolError> {
        let stream_name = stream_name.into();
        let first = buffers.first().ok_or_else(|| PoolError::Empty {
            stream: stream_name.clone(),
        })?;
        let frame_size = first.len();
        let direction = first.direction();

        for buffer in &buffers {
            if buffer.len() != frame_size {
                return Err(PoolError::FrameSizeMismatch {
                    stream: stream_name,
                    expected: frame_size,
                    actual: buffer.len(),
                });
            }
            if buffer.direction() != direction {
                return Err(PoolError::DirectionMismatch {
                    stream: stream_name,
                    expected: direction,
                    actual: buffer.direction(),
                });
            }
        }

        let capacity = buffers.len();
        let shared = Arc::new(PoolShared {
            id: PoolId::next(),
            stream_name,
            direction,
            frame_size,
            capacity,
            state: Mutex::new(PoolState {
                free: buffers.into(),
                retired: false,
                stats: PoolStats::default(),
            }),
            available: Condvar::new(),
            drained: Condvar::new(),
            shutdown,
        });

        let listener: Weak<dyn ShutdownListener> = Arc::downgrade(&shared) as Weak<dyn ShutdownListener>;
        shared.shutdown.subscribe(listener);

        tracing::debug!(
            "stream '{}': {} created with {capacity} x {frame_size} B ({direction})",
            shared.stream_name,
            shared.id,
        );
        Ok(Self { shared })
    }

    /// Takes a buffer, blocking while every buffer is in use.
    ///
    /// Returns [`PoolError::ShutdownSignaled`] if the shutdown event fires
    /// before or during the wait, and [`PoolError::Retired`] if the pool is
    /// retired.
    pub fn acquire(&self) -> Result<PooledBuffer, PoolError> {
        let mut state = self.shared.state.lock();
        let mut blocked = false;
        loop {
            if let Some(result) = self.take_free(&mut state) {
                return result.map(|buffer| self.wrap(buffer));
            }
            if !blocked {
                blocked = true;
                state.stats.record_blocked();
                tracing::trace!(
                    "stream '{}': all {} buffers in use, waiting",
                    self.shared.stream_name,
                    self.shared.capacity,
                );
            }
            self.shared.available.wait(&mut state);
        }
    }

    /// Takes a buffer if one is free, without blocking.
    pub fn try_acquire(&self) -> Result<Option<PooledBuffer>, PoolError> {
        let mut state = self.shared.state.lock();
        match self.take_free(&mut state) {
            Some(result) => result.map(|buffer| Some(self.wrap(buffer))),
            None => Ok(None),
        }
    }

    /// Gives `buffer` back to this pool.
    ///
    /// A buffer acquired from a different pool is rejected with
    /// [`PoolError::ForeignBuffer`]; it then returns to its own pool when the
    /// rejected handle is dropped.
    pub fn return_buffer(&self, buffer: PooledBuffer) -> Result<(), PoolError> {
        if buffer.pool_id() != self.shared.id {
            self.shared.state.lock().stats.record_foreign_return();
            return Err(PoolError::ForeignBuffer {
                stream: self.shared.stream_name.clone(),
                expected: self.shared.id,
                actual: buffer.pool_id(),
            });
        }
        match buffer.release() {
            Some(inner) => self.shared.recycle(inner),
            None => Ok(()),
        }
    }

    /// Stops handing out buffers and wakes every blocked caller with
    /// [`PoolError::Retired`]. Outstanding buffers may still be returned.
    pub fn retire(&self) {
        self.shared.state.lock().retired = true;
        tracing::debug!("stream '{}': {} retired", self.shared.stream_name, self.shared.id);
        self.shared.wake_all();
    }

    /// Blocks until every buffer is back in the pool or `timeout` elapses.
    ///
    /// Returns `Ok(true)` when the pool is idle and `Ok(false)` on timeout.
    /// A timeout too large to express as a deadline waits without one.
    pub fn wait_idle(&self, timeout: Duration) -> Result<bool, PoolError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.shared.state.lock();
        loop {
            if self.shared.shutdown.is_signaled() {
                return Err(PoolError::ShutdownSignaled);
            }
            if state.free.len() == self.shared.capacity {
                return Ok(true);
            }
            if state.retired {
                return Err(PoolError::Retired {
                    stream: self.shared.stream_name.clone(),
                });
            }
            match deadline {
                Some(deadline) => {
                    if self.shared.drained.wait_until(&mut state, deadline).timed_out() {
                        return Ok(state.free.len() == self.shared.capacity);
                    }
                }
                None => self.shared.drained.wait(&mut state),
            }
        }
    }

    /// Returns the pool's identifier.
    pub fn id(&self) -> PoolId {
        self.shared.id
    }

    /// Returns the name of the stream the pool serves.
    pub fn stream_name(&self) -> &str {
        &self.shared.stream_name
    }

    /// Returns the transfer direction of the pool's buffers.
    pub fn direction(&self) -> DmaDirection {
        self.shared.direction
    }

    /// Returns the size of each buffer in bytes.
    pub fn frame_size(&self) -> usize {
        self.shared.frame_size
    }

    /// Returns the number of buffers the pool owns.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Returns the number of buffers ready to be acquired.
    pub fn available(&self) -> usize {
        self.shared.state.lock().free.len()
    }

    /// Returns the number of buffers currently held by callers.
    pub fn in_use(&self) -> usize {
        self.shared.capacity - self.available()
    }

    /// Returns `true` once the pool has been retired.
    pub fn is_retired(&self) -> bool {
        self.shared.state.lock().retired
    }

    /// Returns a snapshot of the pool's statistics.
    pub fn stats(&self) -> PoolStats {
        self.shared.state.lock().stats.clone()
    }

    /// Pops a free buffer, or reports why none may be handed out.
    ///
    /// `None` means the caller may wait.
    fn take_free(
        &self,
        state: &mut MutexGuard<'_, PoolState>,
    ) -> Option<Result<MappedBuffer, PoolError>> {
        if self.shared.shutdown.is_signaled() {
            state.stats.record_shutdown_abort();
            return Some(Err(PoolError::ShutdownSignaled));
        }
        if state.retired {
            return Some(Err(PoolError::Retired {
                stream: self.shared.stream_name.clone(),
            }));
        }
        let buffer = state.free.pop_front()?;
        let in_use = self.shared.capacity - state.free.len();
        state.stats.record_acquisition(in_use);
        Some(Ok(buffer))
    }

    fn wrap(&self, buffer: MappedBuffer) -> PooledBuffer {
        tracing::trace!("stream '{}': buffer acquired from {}", self.shared.stream_name, self.shared.id);
        PooledBuffer::new(buffer, Arc::downgrade(&self.shared), self.shared.id)
    }
}

impl fmt::Debug for StreamBufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamBufferPool")
            .field("id", &self.shared.id)
            .field("stream", &self.shared.stream_name)
            .field("direction", &self.shared.direction)
            .field("frame_size", &self.shared.frame_size)
            .field("capacity", &self.shared.capacity)
            .field("available", &self.available())
            .finish()
    }
}
