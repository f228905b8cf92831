// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Usage statistics for one stream pool.
//!
//! [`PoolStats`] counts how buffers move through a pool: how often callers
//! had to wait, how many acquisitions were cut short by shutdown, and how
//! close the stream came to exhausting its buffers. A pool that blocks often
//! is undersized for its stream.

/// Cumulative statistics about a stream pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolStats {
    /// Buffers handed out.
    pub total_acquisitions: u64,
    /// Acquisitions that had to wait for a buffer to come back.
    pub blocked_acquisitions: u64,
    /// Acquisitions refused because shutdown was signaled.
    pub shutdown_aborts: u64,
    /// Buffers that came back to the pool.
    pub total_returns: u64,
    /// Returns rejected because the buffer belonged to another pool.
    pub foreign_returns: u64,
    /// Highest number of buffers out at the same time.
    pub peak_in_use: usize,
}

impl PoolStats {
    /// Fraction of acquisitions that had to wait, in `[0.0, 1.0]`.
    ///
    /// Returns `0.0` before the first acquisition.
    pub fn contention_ratio(&self) -> f64 {
        if self.total_acquisitions == 0 {
            return 0.0;
        }
        self.blocked_acquisitions as f64 / self.total_acquisitions as f64
    }

    pub(crate) fn record_acquisition(&mut self, in_use: usize) {
        self.total_acquisitions += 1;
        self.peak_in_use = self.peak_in_use.max(in_use);
    }

    pub(crate) fn record_blocked(&mut self) {
        self.blocked_acquisitions += 1;
    }

    pub(crate) fn record_shutdown_abort(&mut self) {
        self.shutdown_aborts += 1;
    }

    pub(crate) fn record_return(&mut self) {
        self.total_returns += 1;
    }

    pub(crate) fn record_foreign_return(&mut self) {
        self.foreign_returns += 1;
    }

    /// Returns a one-line human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{} acquired ({} blocked, {:.0}% contention), {} returned, \
             {} aborted by shutdown, {} foreign, peak {} in use",
            self.total_acquisitions,
            self.blocked_acquisitions,
            self.contention_ratio() * 100.0,
            self.total_returns,
            self.shutdown_aborts,
            self.foreign_returns,
            self.peak_in_use,
        )
    }
}
