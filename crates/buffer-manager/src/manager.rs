// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The per-network-group buffer pool manager.
//!
//! ```text
//!            NetworkGroupBufferPool
//!   ┌──────────────────────────────────────────┐
//!   │ Mutex<ManagerState>                      │
//!   │   mapped_buffers: [Arc<DmaMapping>; n]   │──► keeps every frame alive
//!   │   streams: name ──► StreamBufferPool     │
//!   │   is_shutdown                            │
//!   └──────────────────────────────────────────┘
//!          │ acquire_buffer("input0")
//!          ▼
//!   StreamBufferPool ──► PooledBuffer ──(drop / return_to_pool)──► free list
//!          ▲
//!          └── ShutdownEvent::signal() wakes every blocked acquirer
//! ```
//!
//! The manager lock is never held while blocking in a pool. Acquire clones
//! the pool handle out of the table, releases the lock and then waits inside
//! the pool, so shutdown and other streams never queue behind a waiter.

use crate::{ManagerError, ManagerStats, NetworkGroupConfig, StreamPoolInfo};
use dma_mapping::{DeviceHandle, DmaDirection, DmaMapper, DmaMapping, MappedBuffer};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use stream_pool::{PoolError, PooledBuffer, ShutdownEvent, StreamBufferPool};

// ── State ──────────────────────────────────────────────────────

/// A mapping kept alive on behalf of one stream.
struct MappingRecord {
    stream: String,
    mapping: Arc<DmaMapping>,
}

struct ManagerState {
    // Each record keeps one frame allocated and mapped until the manager drops.
    mapped_buffers: Vec<MappingRecord>,
    streams: HashMap<String, StreamBufferPool>,
    rebuilding: HashSet<String>,
    is_shutdown: bool,
}

/// Marks a stream as being rebuilt; the mark is cleared on drop.
struct RebuildGuard<'a> {
    manager: &'a NetworkGroupBufferPool,
    name: String,
}

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.manager.state.lock().rebuilding.remove(&self.name);
        self.manager.cv.notify_all();
    }
}

// ── Manager ────────────────────────────────────────────────────

/// Owns the buffer pools of every stream of one network group.
///
/// Safe to share across threads: typically one thread per stream loops over
/// acquire, I/O and return while another thread eventually calls
/// [`shutdown`](Self::shutdown).
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use buffer_manager::{DeviceHandle, DmaDirection, NetworkGroupBufferPool, VirtualDevice};
///
/// # fn main() -> Result<(), buffer_manager::ManagerError> {
/// let device = Arc::new(VirtualDevice::new(DeviceHandle::new(0)));
/// let manager = NetworkGroupBufferPool::create(device)?;
/// manager.allocate_pool("input0", DmaDirection::HostToDevice, 4096, 4)?;
///
/// let mut frame = manager.acquire_buffer("input0")?;
/// frame.as_mut_slice()[0] = 1;
/// manager.return_to_pool("input0", frame)?;
///
/// manager.shutdown()?;
/// assert!(manager.acquire_buffer("input0").unwrap_err().is_shutdown());
/// # Ok(())
/// # }
/// ```
pub struct NetworkGroupBufferPool {
    device: Arc<dyn DmaMapper>,
    shutdown_event: ShutdownEvent,
    state: Mutex<ManagerState>,
    cv: Condvar,
}

impl NetworkGroupBufferPool {
    /// Creates a manager bound to `device` with its own shutdown event.
    pub fn create(device: Arc<dyn DmaMapper>) -> Result<Arc<Self>, ManagerError> {
        Self::new(ShutdownEvent::new(), device).map(Arc::new)
    }

    /// Creates a manager bound to `device` that stops when `shutdown_event`
    /// fires, whether through [`shutdown`](Self::shutdown) or directly.
    pub fn new(shutdown_event: ShutdownEvent, device: Arc<dyn DmaMapper>) -> Result<Self, ManagerError> {
        if !device.is_open() {
            return Err(ManagerError::DeviceUnavailable(device.handle()));
        }
        tracing::info!("buffer pool manager created for {}", device.handle());
        Ok(Self {
            device,
            shutdown_event,
            state: Mutex::new(ManagerState {
                mapped_buffers: Vec::new(),
                streams: HashMap::new(),
                rebuilding: HashSet::new(),
                is_shutdown: false,
            }),
            cv: Condvar::new(),
        })
    }

    /// Allocates and maps `pool_size` frames of `frame_size` bytes for a new
    /// stream.
    ///
    /// On failure nothing is recorded and every frame mapped by this call is
    /// unmapped again.
    pub fn allocate_pool(
        &self,
        name: &str,
        direction: DmaDirection,
        frame_size: usize,
        pool_size: usize,
    ) -> Result<(), ManagerError> {
        if frame_size == 0 {
            return Err(ManagerError::InvalidArgument(format!(
                "stream '{name}': frame size must be non-zero"
            )));
        }
        if pool_size == 0 {
            return Err(ManagerError::InvalidArgument(format!(
                "stream '{name}': pool size must be at least 1"
            )));
        }

        let (_rebuild, ()) = self.begin_rebuild(name, |state| {
            if state.streams.contains_key(name) {
                Err(ManagerError::StreamExists(name.to_string()))
            } else {
                Ok(())
            }
        })?;

        let (pool, mappings) = self.build_stream_pool(name, direction, frame_size, pool_size)?;

        let mut state = self.state.lock();
        if self.shutdown_requested(&state) {
            return Err(ManagerError::ShutdownSignaled);
        }
        state.mapped_buffers.extend(mappings.into_iter().map(|mapping| MappingRecord {
            stream: name.to_string(),
            mapping,
        }));
        state.streams.insert(name.to_string(), pool);
        drop(state);

        tracing::info!("stream '{name}': allocated {pool_size} x {frame_size} B buffers ({direction})");
        Ok(())
    }

    /// Replaces the pool of an existing stream with one of a new frame size,
    /// keeping the number of frames.
    ///
    /// The new pool is built before the old one is touched, so on failure the
    /// old pool stays installed. Callers blocked on the old pool move to the
    /// new one; buffers still held from the old pool stay valid until dropped.
    pub fn reallocate_pool(
        &self,
        name: &str,
        direction: DmaDirection,
        frame_size: usize,
    ) -> Result<(), ManagerError> {
        if frame_size == 0 {
            return Err(ManagerError::InvalidArgument(format!(
                "stream '{name}': frame size must be non-zero"
            )));
        }

        let (_rebuild, pool_size) = self.begin_rebuild(name, |state| {
            state
                .streams
                .get(name)
                .map(StreamBufferPool::capacity)
                .ok_or_else(|| ManagerError::StreamNotFound(name.to_string()))
        })?;

        let (pool, mappings) = self.build_stream_pool(name, direction, frame_size, pool_size)?;

        let old = {
            let mut state = self.state.lock();
            if self.shutdown_requested(&state) {
                return Err(ManagerError::ShutdownSignaled);
            }
            state.mapped_buffers.retain(|record| record.stream != name);
            state.mapped_buffers.extend(mappings.into_iter().map(|mapping| MappingRecord {
                stream: name.to_string(),
                mapping,
            }));
            state.streams.insert(name.to_string(), pool)
        };

        if let Some(old) = old {
            tracing::debug!(
                "stream '{name}': retiring {} with {} buffers still in use",
                old.id(),
                old.in_use(),
            );
            old.retire();
        }

        tracing::info!("stream '{name}': reallocated {pool_size} x {frame_size} B buffers ({direction})");
        Ok(())
    }

    /// Takes a free buffer of `stream_name`, blocking until one is returned.
    ///
    /// Returns [`ManagerError::ShutdownSignaled`] once shutdown is requested,
    /// including for threads already blocked here. Shutdown is checked before
    /// the stream lookup.
    pub fn acquire_buffer(&self, stream_name: &str) -> Result<PooledBuffer, ManagerError> {
        loop {
            let pool = self.lookup(stream_name)?;
            match pool.acquire() {
                Err(PoolError::Retired { .. }) => {
                    tracing::debug!("stream '{stream_name}': pool replaced while waiting, retrying");
                }
                result => return result.map_err(ManagerError::from),
            }
        }
    }

    /// Takes a free buffer of `stream_name` if one is available.
    pub fn try_acquire_buffer(&self, stream_name: &str) -> Result<Option<PooledBuffer>, ManagerError> {
        loop {
            let pool = self.lookup(stream_name)?;
            match pool.try_acquire() {
                Err(PoolError::Retired { .. }) => continue,
                result => return result.map_err(ManagerError::from),
            }
        }
    }

    /// Gives `buffer` back to the pool of `stream_name`.
    ///
    /// Works after shutdown. A buffer acquired from another pool, including
    /// the previous pool of a reallocated stream, is rejected and goes back to
    /// its own pool when the rejected handle is dropped.
    pub fn return_to_pool(&self, stream_name: &str, buffer: PooledBuffer) -> Result<(), ManagerError> {
        let pool = self
            .state
            .lock()
            .streams
            .get(stream_name)
            .cloned()
            .ok_or_else(|| ManagerError::StreamNotFound(stream_name.to_string()))?;
        pool.return_buffer(buffer)?;
        tracing::trace!("stream '{stream_name}': buffer returned");
        Ok(())
    }

    /// Stops the manager and wakes every thread blocked in any of its pools.
    ///
    /// Idempotent.
    pub fn shutdown(&self) -> Result<(), ManagerError> {
        {
            let mut state = self.state.lock();
            if state.is_shutdown {
                return Ok(());
            }
            state.is_shutdown = true;
        }
        self.cv.notify_all();
        self.shutdown_event.signal();
        tracing::info!("buffer pool manager for {} shut down", self.device.handle());
        Ok(())
    }

    /// Blocks until shutdown is requested.
    pub fn wait_for_shutdown(&self) {
        self.shutdown_event.wait();
    }

    /// Blocks until every buffer of `stream_name` is back in its pool.
    ///
    /// Returns `Ok(false)` if `timeout` elapses first.
    pub fn wait_for_stream_idle(&self, stream_name: &str, timeout: Duration) -> Result<bool, ManagerError> {
        loop {
            let pool = self.lookup(stream_name)?;
            match pool.wait_idle(timeout) {
                Err(PoolError::Retired { .. }) => continue,
                result => return result.map_err(ManagerError::from),
            }
        }
    }

    /// Allocates a pool for every stream of `config`.
    ///
    /// The description is validated before any memory is mapped. Pools
    /// allocated before a failing stream are kept.
    pub fn allocate_from_config(&self, config: &NetworkGroupConfig) -> Result<(), ManagerError> {
        config.validate()?;
        for stream in &config.streams {
            let frame_size = stream.parse_frame_size()?;
            self.allocate_pool(
                &stream.name,
                stream.direction,
                frame_size.as_bytes(),
                config.pool_size_for(stream),
            )?;
        }
        tracing::info!(
            "network group '{}': {} streams allocated on {}",
            config.name,
            config.streams.len(),
            self.device.handle(),
        );
        Ok(())
    }

    // ── Inspection ─────────────────────────────────────────────

    /// Returns the names of all streams with a pool, sorted.
    pub fn stream_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().streams.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns a snapshot of one stream's pool.
    pub fn pool_info(&self, stream_name: &str) -> Result<StreamPoolInfo, ManagerError> {
        let pool = self
            .state
            .lock()
            .streams
            .get(stream_name)
            .cloned()
            .ok_or_else(|| ManagerError::StreamNotFound(stream_name.to_string()))?;
        Ok(StreamPoolInfo::from_pool(&pool))
    }

    /// Returns the number of mapping records held by the manager.
    pub fn mapped_buffer_count(&self) -> usize {
        self.state.lock().mapped_buffers.len()
    }

    /// Returns `true` once shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_requested(&self.state.lock())
    }

    /// Returns the device the pools are mapped to.
    pub fn device_handle(&self) -> DeviceHandle {
        self.device.handle()
    }

    /// Returns the shutdown event shared with every pool.
    pub fn shutdown_event(&self) -> &ShutdownEvent {
        &self.shutdown_event
    }

    /// Returns a snapshot of every pool.
    pub fn stats(&self) -> ManagerStats {
        let (pools, mapped_buffers, is_shutdown) = {
            let state = self.state.lock();
            let pools: Vec<StreamBufferPool> = state.streams.values().cloned().collect();
            (pools, state.mapped_buffers.len(), self.shutdown_requested(&state))
        };
        let mut streams: Vec<StreamPoolInfo> = pools.iter().map(StreamPoolInfo::from_pool).collect();
        streams.sort_by(|a, b| a.stream_name.cmp(&b.stream_name));
        ManagerStats {
            device: self.device.handle(),
            streams,
            mapped_buffers,
            is_shutdown,
        }
    }

    // ── Internals ──────────────────────────────────────────────

    fn shutdown_requested(&self, state: &ManagerState) -> bool {
        state.is_shutdown || self.shutdown_event.is_signaled()
    }

    /// Clones the pool handle of `name` out of the table.
    fn lookup(&self, name: &str) -> Result<StreamBufferPool, ManagerError> {
        let state = self.state.lock();
        if self.shutdown_requested(&state) {
            return Err(ManagerError::ShutdownSignaled);
        }
        state
            .streams
            .get(name)
            .cloned()
            .ok_or_else(|| ManagerError::StreamNotFound(name.to_string()))
    }

    /// Waits until no other rebuild of `name` is in flight, runs `check` and
    /// marks `name` as being rebuilt.
    fn begin_rebuild<T>(
        &self,
        name: &str,
        check: impl FnOnce(&ManagerState) -> Result<T, ManagerError>,
    ) -> Result<(RebuildGuard<'_>, T), ManagerError> {
        let mut state = self.state.lock();
        loop {
            if self.shutdown_requested(&state) {
                return Err(ManagerError::ShutdownSignaled);
            }
            if !state.rebuilding.contains(name) {
                break;
            }
            self.cv.wait(&mut state);
        }
        let value = check(&state)?;
        state.rebuilding.insert(name.to_string());
        Ok((
            RebuildGuard {
                manager: self,
                name: name.to_string(),
            },
            value,
        ))
    }

    /// Allocates, maps and pools `pool_size` frames without touching the
    /// manager state.
    fn build_stream_pool(
        &self,
        name: &str,
        direction: DmaDirection,
        frame_size: usize,
        pool_size: usize,
    ) -> Result<(StreamBufferPool, Vec<Arc<DmaMapping>>), ManagerError> {
        let mut buffers = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            match MappedBuffer::create(&self.device, frame_size, direction) {
                Ok(buffer) => buffers.push(buffer),
                Err(e) => {
                    tracing::warn!(
                        "stream '{name}': mapping buffer {} of {pool_size} failed, \
                         releasing {} mapped buffers: {e}",
                        buffers.len() + 1,
                        buffers.len(),
                    );
                    return Err(e.into());
                }
            }
        }
        tracing::debug!("stream '{name}': mapped {pool_size} buffers to {}", self.device.handle());

        let mappings = buffers.iter().map(MappedBuffer::mapping).collect();
        let pool = StreamBufferPool::new(name, buffers, self.shutdown_event.clone())?;
        Ok((pool, mappings))
    }
}

impl fmt::Debug for NetworkGroupBufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("NetworkGroupBufferPool")
            .field("device", &self.device.handle())
            .field("streams", &state.streams.len())
            .field("mapped_buffers", &state.mapped_buffers.len())
            .field("is_shutdown", &state.is_shutdown)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreamConfig;
    use dma_mapping::{MappingError, VirtualDevice};
    use stream_pool::FrameSize;

    fn manager() -> (Arc<VirtualDevice>, NetworkGroupBufferPool) {
        manager_on(VirtualDevice::new(DeviceHandle::new(0)))
    }

    fn manager_on(device: VirtualDevice) -> (Arc<VirtualDevice>, NetworkGroupBufferPool) {
        let device = Arc::new(device);
        let mapper: Arc<dyn DmaMapper> = device.clone();
        let manager = NetworkGroupBufferPool::new(ShutdownEvent::new(), mapper).unwrap();
        (device, manager)
    }

    #[test]
    fn test_create_requires_open_device() {
        let device = Arc::new(VirtualDevice::new(DeviceHandle::new(4)));
        device.close();
        let err = NetworkGroupBufferPool::create(device).unwrap_err();
        assert!(matches!(err, ManagerError::DeviceUnavailable(h) if h.raw() == 4));
    }

    #[test]
    fn test_new_manager_is_empty() {
        let (_dev, m) = manager();
        assert!(m.stream_names().is_empty());
        assert_eq!(m.mapped_buffer_count(), 0);
        assert!(!m.is_shutdown());
        assert_eq!(m.device_handle(), DeviceHandle::new(0));
    }

    #[test]
    fn test_allocate_maps_every_buffer() {
        let (dev, m) = manager();
        m.allocate_pool("input0", DmaDirection::HostToDevice, 4096, 4).unwrap();

        assert_eq!(m.stream_names(), vec!["input0".to_string()]);
        assert_eq!(m.mapped_buffer_count(), 4);
        assert_eq!(dev.active_mappings(), 4);
        assert_eq!(dev.mapped_bytes(), 4 * 4096);

        let info = m.pool_info("input0").unwrap();
        assert_eq!(info.capacity, 4);
        assert_eq!(info.available, 4);
        assert_eq!(info.frame_size, 4096);
        assert_eq!(info.direction, DmaDirection::HostToDevice);
    }

    #[test]
    fn test_allocate_rejects_zero_sizes() {
        let (dev, m) = manager();
        assert!(matches!(
            m.allocate_pool("s", DmaDirection::Both, 0, 4),
            Err(ManagerError::InvalidArgument(_))
        ));
        assert!(matches!(
            m.allocate_pool("s", DmaDirection::Both, 64, 0),
            Err(ManagerError::InvalidArgument(_))
        ));
        assert_eq!(dev.active_mappings(), 0);
    }

    #[test]
    fn test_allocate_twice_is_rejected() {
        let (dev, m) = manager();
        m.allocate_pool("input0", DmaDirection::HostToDevice, 64, 2).unwrap();
        let err = m
            .allocate_pool("input0", DmaDirection::HostToDevice, 128, 2)
            .unwrap_err();
        assert!(matches!(err, ManagerError::StreamExists(ref s) if s == "input0"));
        assert_eq!(m.pool_info("input0").unwrap().frame_size, 64);
        assert_eq!(dev.active_mappings(), 2);
    }

    #[test]
    fn test_allocate_failure_rolls_back() {
        let (dev, m) = manager_on(VirtualDevice::new(DeviceHandle::new(0)).with_mapping_limit(3));
        let err = m
            .allocate_pool("input0", DmaDirection::HostToDevice, 64, 5)
            .unwrap_err();
        assert!(matches!(
            err,
            ManagerError::Mapping(MappingError::LimitReached { limit: 3, .. })
        ));
        assert!(m.stream_names().is_empty());
        assert_eq!(m.mapped_buffer_count(), 0);
        assert_eq!(dev.active_mappings(), 0);
        assert_eq!(dev.total_maps(), 3);
    }

    #[test]
    fn test_allocate_after_shutdown() {
        let (dev, m) = manager();
        m.shutdown().unwrap();
        let err = m.allocate_pool("input0", DmaDirection::HostToDevice, 64, 2).unwrap_err();
        assert!(err.is_shutdown());
        assert_eq!(dev.active_mappings(), 0);
    }

    #[test]
    fn test_reallocate_preserves_capacity() {
        let (dev, m) = manager();
        m.allocate_pool("output0", DmaDirection::DeviceToHost, 64, 3).unwrap();
        m.reallocate_pool("output0", DmaDirection::DeviceToHost, 256).unwrap();

        let info = m.pool_info("output0").unwrap();
        assert_eq!(info.capacity, 3);
        assert_eq!(info.frame_size, 256);
        assert_eq!(m.mapped_buffer_count(), 3);
        assert_eq!(dev.active_mappings(), 3);
        assert_eq!(dev.mapped_bytes(), 3 * 256);

        let buf = m.acquire_buffer("output0").unwrap();
        assert_eq!(buf.len(), 256);
    }

    #[test]
    fn test_reallocate_unknown_stream() {
        let (_dev, m) = manager();
        assert!(matches!(
            m.reallocate_pool("missing", DmaDirection::Both, 64),
            Err(ManagerError::StreamNotFound(_))
        ));
    }

    #[test]
    fn test_reallocate_failure_keeps_old_pool() {
        let (dev, m) = manager_on(VirtualDevice::new(DeviceHandle::new(0)).with_mapping_limit(3));
        m.allocate_pool("input0", DmaDirection::HostToDevice, 64, 2).unwrap();

        let err = m.reallocate_pool("input0", DmaDirection::HostToDevice, 128).unwrap_err();
        assert!(matches!(err, ManagerError::Mapping(_)));

        assert_eq!(m.pool_info("input0").unwrap().frame_size, 64);
        assert_eq!(dev.active_mappings(), 2);
        let buf = m.acquire_buffer("input0").unwrap();
        assert_eq!(buf.len(), 64);
    }

    #[test]
    fn test_reallocate_keeps_outstanding_buffer_mapped() {
        let (dev, m) = manager();
        m.allocate_pool("input0", DmaDirection::HostToDevice, 64, 2).unwrap();
        let mut old = m.acquire_buffer("input0").unwrap();
        let old_address = old.address();

        m.reallocate_pool("input0", DmaDirection::HostToDevice, 128).unwrap();
        // One old frame outstanding, two new frames.
        assert_eq!(dev.active_mappings(), 3);
        assert!(dev.is_mapped(old_address));
        old.as_mut_slice().fill(7);

        // The old frame belongs to the retired pool.
        let err = m.return_to_pool("input0", old).unwrap_err();
        assert!(matches!(err, ManagerError::Pool(PoolError::ForeignBuffer { .. })));
        assert!(!dev.is_mapped(old_address));
        assert_eq!(dev.active_mappings(), 2);
    }

    #[test]
    fn test_acquire_unknown_stream() {
        let (_dev, m) = manager();
        assert!(matches!(
            m.acquire_buffer("missing"),
            Err(ManagerError::StreamNotFound(ref s)) if s == "missing"
        ));
    }

    #[test]
    fn test_shutdown_checked_before_lookup() {
        let (_dev, m) = manager();
        m.shutdown().unwrap();
        assert!(m.acquire_buffer("missing").unwrap_err().is_shutdown());
        assert!(m.try_acquire_buffer("missing").unwrap_err().is_shutdown());
    }

    #[test]
    fn test_try_acquire() {
        let (_dev, m) = manager();
        m.allocate_pool("input0", DmaDirection::HostToDevice, 64, 1).unwrap();
        let first = m.try_acquire_buffer("input0").unwrap().unwrap();
        assert!(m.try_acquire_buffer("input0").unwrap().is_none());
        m.return_to_pool("input0", first).unwrap();
        assert!(m.try_acquire_buffer("input0").unwrap().is_some());
    }

    #[test]
    fn test_return_to_unknown_stream() {
        let (_dev, m) = manager();
        m.allocate_pool("input0", DmaDirection::HostToDevice, 64, 2).unwrap();
        let buf = m.acquire_buffer("input0").unwrap();
        let err = m.return_to_pool("output0", buf).unwrap_err();
        assert!(matches!(err, ManagerError::StreamNotFound(_)));
        // The handle went back to its own pool when dropped.
        assert_eq!(m.pool_info("input0").unwrap().available, 2);
    }

    #[test]
    fn test_return_to_wrong_stream() {
        let (_dev, m) = manager();
        m.allocate_pool("input0", DmaDirection::HostToDevice, 64, 1).unwrap();
        m.allocate_pool("output0", DmaDirection::DeviceToHost, 64, 1).unwrap();
        let buf = m.acquire_buffer("input0").unwrap();

        let err = m.return_to_pool("output0", buf).unwrap_err();
        assert!(matches!(err, ManagerError::Pool(PoolError::ForeignBuffer { .. })));
        assert_eq!(m.pool_info("input0").unwrap().available, 1);
        assert_eq!(m.pool_info("output0").unwrap().stats.foreign_returns, 1);
    }

    #[test]
    fn test_return_after_shutdown() {
        let (_dev, m) = manager();
        m.allocate_pool("input0", DmaDirection::HostToDevice, 64, 1).unwrap();
        let buf = m.acquire_buffer("input0").unwrap();
        m.shutdown().unwrap();
        m.return_to_pool("input0", buf).unwrap();
        assert_eq!(m.pool_info("input0").unwrap().available, 1);
        assert!(m.acquire_buffer("input0").unwrap_err().is_shutdown());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (_dev, m) = manager();
        m.shutdown().unwrap();
        m.shutdown().unwrap();
        assert!(m.is_shutdown());
        assert!(m.shutdown_event().is_signaled());
    }

    #[test]
    fn test_external_signal_stops_manager() {
        let (_dev, m) = manager();
        m.allocate_pool("input0", DmaDirection::HostToDevice, 64, 1).unwrap();
        m.shutdown_event().signal();
        assert!(m.is_shutdown());
        assert!(m.acquire_buffer("input0").unwrap_err().is_shutdown());
        m.wait_for_shutdown();
    }

    #[test]
    fn test_wait_for_stream_idle() {
        let (_dev, m) = manager();
        m.allocate_pool("input0", DmaDirection::HostToDevice, 64, 2).unwrap();
        assert!(m.wait_for_stream_idle("input0", Duration::from_millis(1)).unwrap());

        let buf = m.acquire_buffer("input0").unwrap();
        assert!(!m.wait_for_stream_idle("input0", Duration::from_millis(10)).unwrap());
        drop(buf);
        assert!(m.wait_for_stream_idle("input0", Duration::from_millis(1)).unwrap());
    }

    #[test]
    fn test_wait_for_stream_idle_without_deadline() {
        let (_dev, m) = manager();
        m.allocate_pool("input0", DmaDirection::HostToDevice, 64, 2).unwrap();
        assert!(m.wait_for_stream_idle("input0", Duration::MAX).unwrap());

        m.shutdown().unwrap();
        assert!(m
            .wait_for_stream_idle("input0", Duration::MAX)
            .unwrap_err()
            .is_shutdown());
    }

    #[test]
    fn test_kept_mapping_survives_reallocate() {
        let (dev, m) = manager();
        m.allocate_pool("input0", DmaDirection::HostToDevice, 4096, 1).unwrap();
        let buf = m.acquire_buffer("input0").unwrap();
        let kept = buf.mapping();

        m.reallocate_pool("input0", DmaDirection::HostToDevice, 4096).unwrap();
        drop(buf);

        // The kept record owns the frame: still mapped, still allocated.
        assert!(dev.is_mapped(kept.address()));
        assert_eq!(kept.len(), 4096);
        assert_eq!(dev.active_mappings(), 2);

        let address = kept.address();
        drop(kept);
        assert!(!dev.is_mapped(address));
        assert_eq!(dev.active_mappings(), 1);
    }

    #[test]
    fn test_stats_snapshot() {
        let (_dev, m) = manager();
        m.allocate_pool("output0", DmaDirection::DeviceToHost, 32, 2).unwrap();
        m.allocate_pool("input0", DmaDirection::HostToDevice, 64, 3).unwrap();
        let _held = m.acquire_buffer("input0").unwrap();

        let stats = m.stats();
        assert_eq!(stats.streams.len(), 2);
        assert_eq!(stats.streams[0].stream_name, "input0");
        assert_eq!(stats.total_buffers(), 5);
        assert_eq!(stats.total_in_use(), 1);
        assert_eq!(stats.mapped_buffers, 5);
        assert_eq!(stats.stream("input0").unwrap().stats.total_acquisitions, 1);
        assert!(!stats.is_shutdown);
    }

    #[test]
    fn test_allocate_from_config() {
        let (dev, m) = manager();
        let config = NetworkGroupConfig::new("group")
            .with_stream(StreamConfig::new(
                "input0",
                DmaDirection::HostToDevice,
                FrameSize::parse("4K").unwrap(),
            ))
            .with_stream(
                StreamConfig::new(
                    "output0",
                    DmaDirection::DeviceToHost,
                    FrameSize::parse("100").unwrap(),
                )
                .with_pool_size(2),
            );
        m.allocate_from_config(&config).unwrap();

        assert_eq!(m.stream_names(), vec!["input0".to_string(), "output0".to_string()]);
        assert_eq!(m.pool_info("input0").unwrap().capacity, crate::DEFAULT_POOL_SIZE);
        assert_eq!(m.pool_info("output0").unwrap().capacity, 2);
        assert_eq!(dev.active_mappings(), crate::DEFAULT_POOL_SIZE + 2);
    }

    #[test]
    fn test_invalid_config_maps_nothing() {
        let (dev, m) = manager();
        let stream = StreamConfig::new("s", DmaDirection::Both, FrameSize::parse("1K").unwrap());
        let config = NetworkGroupConfig::new("group")
            .with_stream(stream.clone())
            .with_stream(stream);
        assert!(matches!(m.allocate_from_config(&config), Err(ManagerError::Config(_))));
        assert_eq!(dev.active_mappings(), 0);
    }

    #[test]
    fn test_drop_unmaps_everything() {
        let (dev, m) = manager();
        m.allocate_pool("input0", DmaDirection::HostToDevice, 64, 3).unwrap();
        m.allocate_pool("output0", DmaDirection::DeviceToHost, 64, 2).unwrap();
        assert_eq!(dev.active_mappings(), 5);
        drop(m);
        assert_eq!(dev.active_mappings(), 0);
    }

    #[test]
    fn test_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NetworkGroupBufferPool>();
    }
}
