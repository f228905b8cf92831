// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for single-stream buffer pools.

use crate::PoolId;
use dma_mapping::DmaDirection;

/// Errors that can occur while building or using a [`StreamBufferPool`](crate::StreamBufferPool).
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The shutdown event fired; no more buffers are handed out.
    #[error("shutdown signaled")]
    ShutdownSignaled,

    /// The pool was replaced and no longer hands out buffers.
    #[error("pool for stream '{stream}' has been retired")]
    Retired { stream: String },

    /// Attempted to build a pool without any buffers.
    #[error("pool for stream '{stream}' has no buffers")]
    Empty { stream: String },

    /// The buffers handed to the pool do not share one frame size.
    #[error("stream '{stream}': buffer of {actual} bytes in a pool of {expected}-byte frames")]
    FrameSizeMismatch {
        stream: String,
        expected: usize,
        actual: usize,
    },

    /// The buffers handed to the pool do not share one transfer direction.
    #[error("stream '{stream}': {actual} buffer in a {expected} pool")]
    DirectionMismatch {
        stream: String,
        expected: DmaDirection,
        actual: DmaDirection,
    },

    /// A buffer was returned to a pool it was not acquired from.
    #[error("stream '{stream}': buffer from {actual} returned to {expected}")]
    ForeignBuffer {
        stream: String,
        expected: PoolId,
        actual: PoolId,
    },

    /// More buffers came back than the pool owns.
    #[error("pool integrity error: stream '{stream}' already holds all {capacity} buffers")]
    Overfull { stream: String, capacity: usize },

    /// A frame size string could not be parsed.
    #[error("invalid frame size: {0}")]
    InvalidSize(String),
}
