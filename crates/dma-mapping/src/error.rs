// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for host allocation and device mapping.

use crate::{DeviceHandle, MappingId};

/// Errors that can occur while allocating host memory or mapping it to a device.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    /// Attempted to allocate or map a zero-sized region.
    #[error("cannot map a zero-sized buffer")]
    ZeroSized,

    /// The host could not provide memory for the buffer.
    #[error("host allocation of {size} bytes failed: {source}")]
    Allocation {
        size: usize,
        #[source]
        source: std::io::Error,
    },

    /// The device session has been closed.
    #[error("device session {0} is closed")]
    SessionClosed(DeviceHandle),

    /// The device cannot hold any more mappings.
    #[error("device {device} mapping limit reached ({limit} mappings)")]
    LimitReached { device: DeviceHandle, limit: usize },

    /// The region is already mapped to this device.
    #[error("region at {address:#x} is already mapped to {device}")]
    AlreadyMapped { address: usize, device: DeviceHandle },

    /// The device has no record of the mapping.
    #[error("unknown mapping {id} on {device}")]
    UnknownMapping { id: MappingId, device: DeviceHandle },
}
