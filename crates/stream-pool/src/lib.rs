// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # stream-pool
//!
//! A fixed set of pre-mapped frame buffers serving one stream of a network
//! group, so that inference never allocates or maps memory per frame.
//!
//! # Key Components
//!
//! - [`StreamBufferPool`]: owns the stream's buffers; blocking and
//!   non-blocking acquire, explicit return, retirement.
//! - [`PooledBuffer`]: an RAII handle to one acquired frame. Dropping it
//!   returns the frame to the pool it came from.
//! - [`ShutdownEvent`]: a set-once signal shared by every pool of a
//!   network group; firing it wakes all blocked callers.
//! - [`PoolStats`]: per-pool counters (contention, shutdown aborts, peak
//!   usage).
//! - [`FrameSize`]: human-readable frame sizes (`"600K"`, `"4096"`).
//!
//! # Ownership Model
//!
//! ```text
//! StreamBufferPool::acquire()
//!       │
//!       ▼
//!   PooledBuffer  ◄─── owns MappedBuffer, holds Weak<PoolShared>
//!       │
//!       │  drop() / return_buffer()
//!       ▼
//!   PoolShared::recycle()  ──► free list ──► wakes one waiter
//! ```
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use dma_mapping::{DeviceHandle, DmaDirection, DmaMapper, MappedBuffer, VirtualDevice};
//! use stream_pool::{ShutdownEvent, StreamBufferPool, PoolError};
//!
//! let device: Arc<dyn DmaMapper> = Arc::new(VirtualDevice::new(DeviceHandle::new(0)));
//! let buffers = (0..4)
//!     .map(|_| MappedBuffer::create(&device, 4096, DmaDirection::HostToDevice))
//!     .collect::<Result<Vec<_>, _>>()
//!     .unwrap();
//!
//! let shutdown = ShutdownEvent::new();
//! let pool = StreamBufferPool::new("input0", buffers, shutdown.clone()).unwrap();
//!
//! let frame = pool.acquire().unwrap();
//! pool.return_buffer(frame).unwrap();
//!
//! shutdown.signal();
//! assert!(matches!(pool.acquire(), Err(PoolError::ShutdownSignaled)));
//! ```

mod error;
mod event;
mod guard;
mod pool;
mod size;
mod stats;

pub use error::PoolError;
pub use event::{ShutdownEvent, ShutdownListener};
pub use guard::PooledBuffer;
pub use pool::{PoolId, StreamBufferPool};
pub use size::FrameSize;
pub use stats::PoolStats;
