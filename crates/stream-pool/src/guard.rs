// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII handle to a buffer taken from a stream pool.
//!
//! [`PooledBuffer`] gives its holder exclusive access to one frame. It is
//! move-only, so a buffer cannot be returned twice, and it remembers which
//! pool it came from. When dropped it goes back to that pool; if the pool is
//! gone the frame memory is released and its mapping reference dropped.

use crate::pool::PoolShared;
use crate::PoolId;
use dma_mapping::{DmaDirection, DmaMapping, MappedBuffer};
use std::fmt;
use std::sync::{Arc, Weak};

/// Exclusive handle to one pre-mapped frame buffer.
///
/// # Example
/// ```ignore
/// let mut frame = pool.acquire()?;
/// frame.as_mut_slice().copy_from_slice(&input);
/// pool.return_buffer(frame)?;   // or just drop(frame)
/// ```
pub struct PooledBuffer {
    /// `None` only after the buffer has been handed back.
    buffer: Option<MappedBuffer>,
    origin: Weak<PoolShared>,
    pool_id: PoolId,
}

impl PooledBuffer {
    pub(crate) fn new(buffer: MappedBuffer, origin: Weak<PoolShared>, pool_id: PoolId) -> Self {
        Self {
            buffer: Some(buffer),
            origin,
            pool_id,
        }
    }

    /// Returns the pool this buffer was acquired from.
    pub fn pool_id(&self) -> PoolId {
        self.pool_id
    }

    /// Returns `true` while the originating pool still exists.
    pub fn origin_alive(&self) -> bool {
        self.origin.strong_count() > 0
    }

    /// Returns the frame size in bytes.
    pub fn len(&self) -> usize {
        self.inner().len()
    }

    /// Always `false`; pools never hold zero-sized buffers.
    pub fn is_empty(&self) -> bool {
        self.inner().is_empty()
    }

    /// Returns the transfer direction of the frame.
    pub fn direction(&self) -> DmaDirection {
        self.inner().direction()
    }

    /// Returns the start address of the frame.
    pub fn address(&self) -> usize {
        self.inner().address()
    }

    /// Returns the mapping that owns the frame. Holding it keeps the frame
    /// allocated and bound to the device.
    pub fn mapping(&self) -> Arc<DmaMapping> {
        self.inner().mapping()
    }

    /// Returns an immutable view of the frame.
    pub fn as_slice(&self) -> &[u8] {
        self.inner().as_slice()
    }

    /// Returns a mutable view of the frame.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buffer
            .as_mut()
            .expect("pooled buffer accessed after release")
            .as_mut_slice()
    }

    /// Disarms the drop hook and hands out the underlying buffer.
    pub(crate) fn release(mut self) -> Option<MappedBuffer> {
        self.buffer.take()
    }

    fn inner(&self) -> &MappedBuffer {
        self.buffer
            .as_ref()
            .expect("pooled buffer accessed after release")
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let Some(buffer) = self.buffer.take() else {
            return;
        };
        match self.origin.upgrade() {
            Some(pool) => {
                if let Err(e) = pool.recycle(buffer) {
                    tracing::error!("stream '{}': dropped buffer not recycled: {e}", pool.stream_name());
                }
            }
            None => tracing::trace!("{} is gone, releasing orphaned buffer", self.pool_id),
        }
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("pool_id", &self.pool_id)
            .field("buffer", &self.buffer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{ShutdownEvent, StreamBufferPool};
    use dma_mapping::{DeviceHandle, DmaDirection, DmaMapper, MappedBuffer, VirtualDevice};
    use std::sync::Arc;

    fn pool(count: usize) -> (Arc<VirtualDevice>, StreamBufferPool) {
        let dev = Arc::new(VirtualDevice::new(DeviceHandle::new(9)));
        let mapper: Arc<dyn DmaMapper> = dev.clone();
        let buffers = (0..count)
            .map(|_| MappedBuffer::create(&mapper, 32, DmaDirection::DeviceToHost).unwrap())
            .collect();
        let pool = StreamBufferPool::new("output0", buffers, ShutdownEvent::new()).unwrap();
        (dev, pool)
    }

    #[test]
    fn test_drop_returns_to_pool() {
        let (_dev, pool) = pool(2);
        let buf = pool.acquire().unwrap();
        assert_eq!(pool.available(), 1);
        drop(buf);
        assert_eq!(pool.available(), 2);
        assert_eq!(pool.stats().total_returns, 1);
    }

    #[test]
    fn test_contents_survive_round_trip() {
        let (_dev, pool) = pool(1);
        let mut buf = pool.acquire().unwrap();
        buf.as_mut_slice().fill(0xAB);
        drop(buf);

        // Pools do not scrub frames between uses.
        let again = pool.acquire().unwrap();
        assert!(again.as_slice().iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_accessors() {
        let (dev, pool) = pool(1);
        let buf = pool.acquire().unwrap();
        assert_eq!(buf.len(), 32);
        assert!(!buf.is_empty());
        assert_eq!(buf.direction(), DmaDirection::DeviceToHost);
        assert_eq!(buf.pool_id(), pool.id());
        assert!(dev.is_mapped(buf.address()));
        assert_eq!(buf.mapping().address(), buf.address());
        assert!(buf.origin_alive());
    }

    #[test]
    fn test_orphaned_buffer_releases_mapping() {
        let (dev, pool) = pool(2);
        let buf = pool.acquire().unwrap();
        drop(pool);

        assert!(!buf.origin_alive());
        assert_eq!(dev.active_mappings(), 1);
        drop(buf);
        assert_eq!(dev.active_mappings(), 0);
    }

    #[test]
    fn test_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<super::PooledBuffer>();
    }
}
