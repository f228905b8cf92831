// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! An in-process device session.
//!
//! [`VirtualDevice`] keeps a table of live mappings instead of talking to a
//! driver. It enforces the same rules a real session does (no mapping after
//! close, no double mapping of one region, an optional cap on the number of
//! mappings) so pool code can be exercised, including its failure paths,
//! without hardware.

use crate::{DeviceHandle, DmaDirection, DmaMapper, MappingError, MappingId};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct MappingRecord {
    address: usize,
    len: usize,
    direction: DmaDirection,
}

#[derive(Debug)]
struct DeviceState {
    open: bool,
    next_id: u64,
    mappings: HashMap<MappingId, MappingRecord>,
    total_maps: u64,
}

/// A software device session implementing [`DmaMapper`].
///
/// # Example
/// ```
/// use dma_mapping::{DeviceHandle, DmaDirection, DmaMapper, VirtualDevice};
///
/// let dev = VirtualDevice::new(DeviceHandle::new(3)).with_mapping_limit(1);
/// let id = dev.map(0x1000, 4096, DmaDirection::HostToDevice).unwrap();
/// assert!(dev.map(0x2000, 4096, DmaDirection::HostToDevice).is_err());
///
/// dev.unmap(id).unwrap();
/// assert_eq!(dev.active_mappings(), 0);
/// ```
#[derive(Debug)]
pub struct VirtualDevice {
    handle: DeviceHandle,
    mapping_limit: Option<usize>,
    state: Mutex<DeviceState>,
}

impl VirtualDevice {
    /// Opens a session with no mapping limit.
    pub fn new(handle: DeviceHandle) -> Self {
        Self {
            handle,
            mapping_limit: None,
            state: Mutex::new(DeviceState {
                open: true,
                next_id: 1,
                mappings: HashMap::new(),
                total_maps: 0,
            }),
        }
    }

    /// Caps the number of simultaneously live mappings.
    pub fn with_mapping_limit(mut self, limit: usize) -> Self {
        self.mapping_limit = Some(limit);
        self
    }

    /// Closes the session. Existing mappings can still be released, new
    /// ones are refused.
    pub fn close(&self) {
        self.state.lock().open = false;
    }

    /// Returns the number of live mappings.
    pub fn active_mappings(&self) -> usize {
        self.state.lock().mappings.len()
    }

    /// Returns the number of bytes currently mapped.
    pub fn mapped_bytes(&self) -> usize {
        self.state.lock().mappings.values().map(|m| m.len).sum()
    }

    /// Returns the number of successful `map` calls over the session's life.
    pub fn total_maps(&self) -> u64 {
        self.state.lock().total_maps
    }

    /// Returns `true` if a live mapping starts at `address`.
    pub fn is_mapped(&self, address: usize) -> bool {
        self.state
            .lock()
            .mappings
            .values()
            .any(|m| m.address == address)
    }

    /// Returns the direction of the live mapping starting at `address`.
    pub fn direction_of(&self, address: usize) -> Option<DmaDirection> {
        self.state
            .lock()
            .mappings
            .values()
            .find(|m| m.address == address)
            .map(|m| m.direction)
    }
}

impl DmaMapper for VirtualDevice {
    fn handle(&self) -> DeviceHandle {
        self.handle
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn map(
        &self,
        address: usize,
        len: usize,
        direction: DmaDirection,
    ) -> Result<MappingId, MappingError> {
        if len == 0 {
            return Err(MappingError::ZeroSized);
        }

        let mut state = self.state.lock();
        if !state.open {
            return Err(MappingError::SessionClosed(self.handle));
        }
        if let Some(limit) = self.mapping_limit {
            if state.mappings.len() >= limit {
                return Err(MappingError::LimitReached {
                    device: self.handle,
                    limit,
                });
            }
        }
        if state.mappings.values().any(|m| m.address == address) {
            return Err(MappingError::AlreadyMapped {
                address,
                device: self.handle,
            });
        }

        let id = MappingId(state.next_id);
        state.next_id += 1;
        state.total_maps += 1;
        state.mappings.insert(
            id,
            MappingRecord {
                address,
                len,
                direction,
            },
        );
        Ok(id)
    }

    fn unmap(&self, id: MappingId) -> Result<(), MappingError> {
        self.state
            .lock()
            .mappings
            .remove(&id)
            .map(|_| ())
            .ok_or(MappingError::UnknownMapping {
                id,
                device: self.handle,
            })
    }
}
