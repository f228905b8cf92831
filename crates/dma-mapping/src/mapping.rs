// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII mapping records and mapped frame buffers.
//!
//! A [`DmaMapping`] owns the host memory it binds to a device. Dropping it
//! unmaps the region first and frees the memory second. It is shared through
//! an `Arc`, so every holder (the pool manager's record list, the buffer
//! itself, a caller's clone) keeps both the mapping and the memory alive.

use crate::{DeviceHandle, DmaDirection, DmaMapper, HostBuffer, MappingError, MappingId};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

/// A live binding of an owned host region to a device.
pub struct DmaMapping {
    id: MappingId,
    direction: DmaDirection,
    device: Arc<dyn DmaMapper>,
    // Freed after `Drop::drop` has unmapped the region.
    memory: HostBuffer,
}

impl DmaMapping {
    /// Maps `memory` to `device` for `direction`, taking ownership of it.
    ///
    /// If mapping fails the memory is released before the error is returned.
    pub fn map(
        device: &Arc<dyn DmaMapper>,
        memory: HostBuffer,
        direction: DmaDirection,
    ) -> Result<Self, MappingError> {
        let id = device.map(memory.address(), memory.len(), direction)?;
        Ok(Self {
            id,
            direction,
            device: Arc::clone(device),
            memory,
        })
    }

    /// Returns the device-assigned mapping identifier.
    pub fn id(&self) -> MappingId {
        self.id
    }

    /// Returns the start address of the mapped region.
    pub fn address(&self) -> usize {
        self.memory.address()
    }

    /// Returns the length of the mapped region.
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Always `false`; zero-sized regions cannot be mapped.
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Returns the transfer direction of the mapping.
    pub fn direction(&self) -> DmaDirection {
        self.direction
    }

    /// Returns the device session the region is mapped to.
    pub fn device(&self) -> DeviceHandle {
        self.device.handle()
    }
}

impl Drop for DmaMapping {
    fn drop(&mut self) {
        if let Err(e) = self.device.unmap(self.id) {
            tracing::warn!("failed to unmap {} ({} bytes): {e}", self.id, self.len());
        }
    }
}

impl fmt::Debug for DmaMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DmaMapping")
            .field("id", &self.id)
            .field("address", &format_args!("{:#x}", self.address()))
            .field("len", &self.len())
            .field("direction", &self.direction)
            .field("device", &self.device.handle())
            .finish()
    }
}

/// Exclusive access to one mapped frame.
///
/// The frame memory belongs to the shared [`DmaMapping`]; a `MappedBuffer`
/// is the only handle that reads or writes it.
pub struct MappedBuffer {
    mapping: Arc<DmaMapping>,
    ptr: NonNull<u8>,
}

// SAFETY: `ptr` points into memory owned by `mapping`, which this buffer keeps
// alive. No other handle reads or writes through it.
unsafe impl Send for MappedBuffer {}

// SAFETY: shared references only hand out `&[u8]`; writes need `&mut self`.
unsafe impl Sync for MappedBuffer {}

impl MappedBuffer {
    /// Allocates `size` bytes and maps them to `device` for `direction`.
    ///
    /// If mapping fails the freshly allocated memory is released before the
    /// error is returned.
    pub fn create(
        device: &Arc<dyn DmaMapper>,
        size: usize,
        direction: DmaDirection,
    ) -> Result<Self, MappingError> {
        let mut memory = HostBuffer::allocate(size)?;
        let ptr = memory.data_ptr();
        let mapping = DmaMapping::map(device, memory, direction)?;
        Ok(Self {
            mapping: Arc::new(mapping),
            ptr,
        })
    }

    /// Returns a shared reference to the mapping record. The frame memory
    /// stays allocated and mapped while the record lives.
    pub fn mapping(&self) -> Arc<DmaMapping> {
        Arc::clone(&self.mapping)
    }

    /// Returns the transfer direction.
    pub fn direction(&self) -> DmaDirection {
        self.mapping.direction()
    }

    /// Returns the frame size in bytes.
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// Always `false`; zero-sized buffers cannot be created.
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Returns the start address of the frame.
    pub fn address(&self) -> usize {
        self.mapping.address()
    }

    /// Returns an immutable view of the frame.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for len bytes while `mapping` lives
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    /// Returns a mutable view of the frame.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for len bytes and we have exclusive access
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len()) }
    }
}

impl fmt::Debug for MappedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedBuffer")
            .field("mapping", &self.mapping)
            .finish()
    }
}
