// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # buffer-manager
//!
//! Owns the pre-mapped frame buffers of every stream of one network group
//! on an accelerator.
//!
//! The manager takes:
//! - A device session implementing [`DmaMapper`] from `dma-mapping`.
//! - A [`ShutdownEvent`] from `stream-pool`, shared with the session.
//!
//! And provides per-stream pools of frames that are mapped once at
//! allocation time, handed out and returned for every inference, and
//! released together when the manager is dropped.
//!
//! # Lifecycle
//! ```text
//! create ─► allocate_pool / allocate_from_config
//!              │
//!              ▼
//!        ┌─► acquire_buffer ─► I/O ─► return_to_pool ─┐
//!        └────────────────────────────────────────────┘
//!              │  reallocate_pool on frame-size change
//!              ▼
//!          shutdown ─► every blocked acquirer wakes with ShutdownSignaled
//! ```
//!
//! # Threading
//! One thread per stream typically loops over acquire and return while a
//! control thread calls [`NetworkGroupBufferPool::shutdown`]. All blocking
//! happens inside the stream pools with the manager lock released.

mod config;
mod error;
mod manager;
mod metrics;

pub use config::{NetworkGroupConfig, StreamConfig, DEFAULT_POOL_SIZE};
pub use error::ManagerError;
pub use manager::NetworkGroupBufferPool;
pub use metrics::{ManagerStats, StreamPoolInfo};

pub use dma_mapping::{DeviceHandle, DmaDirection, DmaMapper, VirtualDevice};
pub use stream_pool::{FrameSize, PoolError, PoolStats, PooledBuffer, ShutdownEvent};
