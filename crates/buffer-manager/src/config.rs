// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Network-group descriptions loaded from TOML files or built programmatically.
//!
//! # TOML Format
//! ```toml
//! name = "yolov5m"
//! default_pool_size = 4
//!
//! [[streams]]
//! name = "input0"
//! direction = "h2d"
//! frame_size = "600K"
//!
//! [[streams]]
//! name = "output0"
//! direction = "d2h"
//! frame_size = "4096"
//! pool_size = 8
//! ```

use crate::ManagerError;
use dma_mapping::DmaDirection;
use std::collections::HashSet;
use std::path::Path;
use stream_pool::FrameSize;

/// Pool size used for streams that do not set their own.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// One stream of a network group.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StreamConfig {
    /// Stream name, unique within the network group.
    pub name: String,
    /// Transfer direction: `"h2d"`, `"d2h"` or `"both"`.
    pub direction: DmaDirection,
    /// Frame size (human-readable, e.g., `"600K"`).
    pub frame_size: String,
    /// Number of frames; falls back to the group's `default_pool_size`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<usize>,
}

impl StreamConfig {
    /// Creates a stream description with the group's default pool size.
    pub fn new(name: impl Into<String>, direction: DmaDirection, frame_size: FrameSize) -> Self {
        Self {
            name: name.into(),
            direction,
            frame_size: frame_size.as_bytes().to_string(),
            pool_size: None,
        }
    }

    /// Sets an explicit pool size for this stream.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    /// Parses the frame size string into a [`FrameSize`].
    pub fn parse_frame_size(&self) -> Result<FrameSize, ManagerError> {
        FrameSize::parse(&self.frame_size).map_err(|e| {
            ManagerError::Config(format!("stream '{}': {e}", self.name))
        })
    }
}

/// Buffer layout of one network group.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NetworkGroupConfig {
    /// Network group name, used in logs.
    pub name: String,
    /// Pool size for streams without an explicit `pool_size`.
    #[serde(default = "default_pool_size")]
    pub default_pool_size: usize,
    /// Streams to allocate pools for.
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

impl NetworkGroupConfig {
    /// Creates an empty description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_pool_size: DEFAULT_POOL_SIZE,
            streams: Vec::new(),
        }
    }

    /// Appends a stream.
    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.streams.push(stream);
        self
    }

    /// Loads a description from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ManagerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ManagerError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses a description from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ManagerError> {
        toml::from_str(toml_str)
            .map_err(|e| ManagerError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises the description to TOML.
    pub fn to_toml(&self) -> Result<String, ManagerError> {
        toml::to_string_pretty(self)
            .map_err(|e| ManagerError::Config(format!("TOML serialise error: {e}")))
    }

    /// Returns the pool size to allocate for `stream`.
    pub fn pool_size_for(&self, stream: &StreamConfig) -> usize {
        stream.pool_size.unwrap_or(self.default_pool_size)
    }

    /// Checks names, sizes and uniqueness without touching any device.
    pub fn validate(&self) -> Result<(), ManagerError> {
        let mut seen = HashSet::new();
        for stream in &self.streams {
            if stream.name.is_empty() {
                return Err(ManagerError::Config(format!(
                    "network group '{}': stream with empty name",
                    self.name
                )));
            }
            if !seen.insert(stream.name.as_str()) {
                return Err(ManagerError::Config(format!(
                    "network group '{}': duplicate stream '{}'",
                    self.name, stream.name
                )));
            }
            stream.parse_frame_size()?;
            if self.pool_size_for(stream) == 0 {
                return Err(ManagerError::Config(format!(
                    "stream '{}': pool size must be at least 1",
                    stream.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for NetworkGroupConfig {
    fn default() -> Self {
        Self::new("default")
    }
}
