// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # dma-mapping
//!
//! Host memory that an accelerator can read or write directly, and the
//! mapping records that keep it bound to a device session.
//!
//! # Key Components
//!
//! - [`DmaMapper`]: the device boundary that maps and unmaps host regions for a
//!   transfer direction. [`VirtualDevice`] is an in-process implementation
//!   used by tests and benchmarks.
//! - [`HostBuffer`]: page-aligned anonymous memory backing one frame.
//! - [`DmaMapping`]: an RAII mapping record that owns its host memory.
//!   Dropping the last reference unmaps the region, then frees it.
//! - [`MappedBuffer`]: exclusive read/write access to one mapped frame.
//!
//! # Ownership Model
//!
//! ```text
//! MappedBuffer::create(device, size, direction)
//!       │
//!       └── Arc<DmaMapping>   (shared with whoever must keep it mapped)
//!                 │
//!                 ├── HostBuffer (owned, freed after unmap)
//!                 │
//!                 │  last drop
//!                 ▼
//!          DmaMapper::unmap()  ──►  munmap
//! ```
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use dma_mapping::{DeviceHandle, DmaDirection, DmaMapper, MappedBuffer, VirtualDevice};
//!
//! let device: Arc<dyn DmaMapper> = Arc::new(VirtualDevice::new(DeviceHandle::new(1)));
//! let buffer = MappedBuffer::create(&device, 4096, DmaDirection::HostToDevice).unwrap();
//! assert_eq!(buffer.len(), 4096);
//! assert_eq!(buffer.direction(), DmaDirection::HostToDevice);
//! ```

mod device;
mod error;
mod host_buffer;
mod mapping;
mod virtual_device;

pub use device::{DeviceHandle, DmaDirection, DmaMapper, MappingId};
pub use error::MappingError;
pub use host_buffer::HostBuffer;
pub use mapping::{DmaMapping, MappedBuffer};
pub use virtual_device::VirtualDevice;
