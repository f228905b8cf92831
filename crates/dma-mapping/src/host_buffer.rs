// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Page-aligned host memory for DMA transfers.
//!
//! Frames are backed by anonymous memory maps rather than `Vec<u8>`: the
//! region starts on a page boundary, is zero-filled by the kernel, and its
//! address never changes while the [`HostBuffer`] is moved around. Both
//! properties are what a device mapping relies on.

use crate::MappingError;
use std::fmt;
use std::ptr::NonNull;

/// An owned, page-aligned, zero-initialised host memory region.
pub struct HostBuffer {
    mmap: memmap2::MmapMut,
}

impl HostBuffer {
    /// Allocates `size` bytes of anonymous memory.
    pub fn allocate(size: usize) -> Result<Self, MappingError> {
        if size == 0 {
            return Err(MappingError::ZeroSized);
        }
        let mmap = memmap2::MmapMut::map_anon(size)
            .map_err(|source| MappingError::Allocation { size, source })?;
        Ok(Self { mmap })
    }

    /// Returns the start address of the region.
    pub fn address(&self) -> usize {
        self.mmap.as_ptr() as usize
    }

    /// Returns the length of the region in bytes.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Always `false`; zero-sized buffers cannot be allocated.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Returns an immutable view of the region.
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    /// Returns a mutable view of the region.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    /// Returns a writable pointer to the start of the region. It stays valid
    /// for as long as the buffer lives, wherever the buffer is moved.
    pub(crate) fn data_ptr(&mut self) -> NonNull<u8> {
        NonNull::from(self.as_mut_slice()).cast::<u8>()
    }
}

impl fmt::Debug for HostBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBuffer")
            .field("address", &format_args!("{:#x}", self.address()))
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_zeroed() {
        let buf = HostBuffer::allocate(4096).unwrap();
        assert_eq!(buf.len(), 4096);
        assert!(!buf.is_empty());
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(HostBuffer::allocate(0), Err(MappingError::ZeroSized)));
    }

    #[test]
    fn test_page_aligned() {
        let buf = HostBuffer::allocate(100).unwrap();
        assert_eq!(buf.address() % 4096, 0);
    }

    #[test]
    fn test_address_stable_across_moves() {
        let mut buf = HostBuffer::allocate(64).unwrap();
        buf.as_mut_slice()[3] = 9;
        let address = buf.address();

        let moved = vec![buf];
        assert_eq!(moved[0].address(), address);
        assert_eq!(moved[0].as_slice()[3], 9);
    }
}
