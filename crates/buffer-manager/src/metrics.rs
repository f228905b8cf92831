// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Snapshots of a network group's buffer pools.
//!
//! [`ManagerStats`] collects, for every stream, the pool's shape and its
//! [`PoolStats`] counters at one point in time. A stream with a high
//! contention ratio needs a larger pool.

use dma_mapping::{DeviceHandle, DmaDirection};
use stream_pool::{PoolStats, StreamBufferPool};

/// Shape and usage of one stream's pool.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StreamPoolInfo {
    /// Stream name.
    pub stream_name: String,
    /// Transfer direction of every frame in the pool.
    pub direction: DmaDirection,
    /// Frame size in bytes.
    pub frame_size: usize,
    /// Number of frames owned by the pool.
    pub capacity: usize,
    /// Frames currently free.
    pub available: usize,
    /// Frames currently held by callers.
    pub in_use: usize,
    /// Cumulative counters.
    pub stats: PoolStats,
}

impl StreamPoolInfo {
    pub(crate) fn from_pool(pool: &StreamBufferPool) -> Self {
        let available = pool.available();
        Self {
            stream_name: pool.stream_name().to_string(),
            direction: pool.direction(),
            frame_size: pool.frame_size(),
            capacity: pool.capacity(),
            available,
            in_use: pool.capacity().saturating_sub(available),
            stats: pool.stats(),
        }
    }

    /// Bytes of frame memory owned by the pool.
    pub fn pool_bytes(&self) -> usize {
        self.frame_size * self.capacity
    }
}

/// Snapshot of every pool of a network group.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ManagerStats {
    /// Device the pools are mapped to.
    pub device: DeviceHandle,
    /// Per-stream snapshots, sorted by stream name.
    pub streams: Vec<StreamPoolInfo>,
    /// Mapping records held by the manager.
    pub mapped_buffers: usize,
    /// Whether shutdown has been requested.
    pub is_shutdown: bool,
}

impl ManagerStats {
    /// Total frames across all pools.
    pub fn total_buffers(&self) -> usize {
        self.streams.iter().map(|s| s.capacity).sum()
    }

    /// Total frames currently held by callers.
    pub fn total_in_use(&self) -> usize {
        self.streams.iter().map(|s| s.in_use).sum()
    }

    /// Bytes of frame memory across all pools.
    pub fn total_bytes(&self) -> usize {
        self.streams.iter().map(StreamPoolInfo::pool_bytes).sum()
    }

    /// Returns the snapshot of one stream.
    pub fn stream(&self, name: &str) -> Option<&StreamPoolInfo> {
        self.streams.iter().find(|s| s.stream_name == name)
    }

    /// Returns a human-readable summary suitable for logs.
    pub fn summary(&self) -> String {
        let total_mb = self.total_bytes() as f64 / (1024.0 * 1024.0);
        let mut out = format!(
            "{}: {} streams, {} buffers ({:.2} MB), {} in use, {} mappings{}",
            self.device,
            self.streams.len(),
            self.total_buffers(),
            total_mb,
            self.total_in_use(),
            self.mapped_buffers,
            if self.is_shutdown { ", shut down" } else { "" },
        );
        for s in &self.streams {
            out.push_str(&format!(
                "\n  {} [{}] {} x {} B: {}",
                s.stream_name,
                s.direction,
                s.capacity,
                s.frame_size,
                s.stats.summary(),
            ));
        }
        out
    }
}
