// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the network-group buffer manager.

use dma_mapping::{DeviceHandle, MappingError};
use stream_pool::PoolError;

/// Errors that can occur while managing the pools of a network group.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// Shutdown was requested; no more buffers are handed out.
    #[error("shutdown signaled")]
    ShutdownSignaled,

    /// No pool has been allocated for the stream.
    #[error("no buffer pool for stream '{0}'")]
    StreamNotFound(String),

    /// A pool already exists for the stream; use reallocate to replace it.
    #[error("stream '{0}' already has a buffer pool")]
    StreamExists(String),

    /// A caller-supplied argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The device session is not open.
    #[error("device {0} is not available")]
    DeviceUnavailable(DeviceHandle),

    /// Host allocation or device mapping failed.
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// The stream pool rejected the operation.
    #[error("pool error: {0}")]
    Pool(PoolError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ManagerError {
    /// Returns `true` if the operation was refused because of shutdown.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::ShutdownSignaled)
    }
}

impl From<PoolError> for ManagerError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::ShutdownSignaled => Self::ShutdownSignaled,
            other => Self::Pool(other),
        }
    }
}
