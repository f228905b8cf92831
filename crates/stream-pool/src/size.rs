// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Frame sizes and their human-readable form.
//!
//! A [`FrameSize`] is the number of bytes one buffer of a stream holds. Network
//! group descriptions spell it the way people do (`"600K"`, `"1M"`), so it
//! parses binary-suffixed strings as well as plain byte counts.

use crate::PoolError;
use std::fmt;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;
const GIB: usize = 1024 * MIB;

/// Size of one frame buffer in bytes. Never zero.
///
/// # Parsing
/// - `"4096"` or `"4096B"` → 4096 bytes
/// - `"600K"`, `"600KB"`, `"600KiB"` → 600 × 1024 bytes
/// - `"2M"`, `"2MB"`, `"2MiB"` → 2 × 1024² bytes
/// - `"1G"`, `"1GB"`, `"1GiB"` → 1024³ bytes
///
/// Suffixes are case-insensitive; surrounding whitespace is ignored.
///
/// # Examples
/// ```
/// use stream_pool::FrameSize;
///
/// assert_eq!(FrameSize::parse("4K").unwrap().as_bytes(), 4096);
/// assert_eq!(FrameSize::parse("1920").unwrap().as_bytes(), 1920);
/// assert!(FrameSize::parse("0").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct FrameSize {
    bytes: usize,
}

impl FrameSize {
    /// Creates a frame size from a byte count, rejecting zero.
    pub fn from_bytes(bytes: usize) -> Result<Self, PoolError> {
        if bytes == 0 {
            return Err(PoolError::InvalidSize("frame size must be non-zero".into()));
        }
        Ok(Self { bytes })
    }

    /// Returns the size in bytes.
    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Parses a human-readable size string.
    pub fn parse(s: &str) -> Result<Self, PoolError> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, suffix) = s.split_at(split);

        if digits.is_empty() {
            return Err(PoolError::InvalidSize(format!(
                "'{s}': expected a number with an optional K, M or G suffix"
            )));
        }

        let multiplier = match suffix.trim().to_ascii_uppercase().as_str() {
            "" | "B" => 1,
            "K" | "KB" | "KIB" => KIB,
            "M" | "MB" | "MIB" => MIB,
            "G" | "GB" | "GIB" => GIB,
            other => {
                return Err(PoolError::InvalidSize(format!("'{s}': unknown suffix '{other}'")))
            }
        };

        let value: usize = digits
            .parse()
            .map_err(|e| PoolError::InvalidSize(format!("'{s}': {e}")))?;
        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| PoolError::InvalidSize(format!("'{s}': overflows usize")))?;

        Self::from_bytes(bytes)
    }
}

impl From<FrameSize> for usize {
    fn from(size: FrameSize) -> Self {
        size.bytes
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bytes {
            b if b % GIB == 0 => write!(f, "{} GiB", b / GIB),
            b if b % MIB == 0 => write!(f, "{} MiB", b / MIB),
            b if b % KIB == 0 => write!(f, "{} KiB", b / KIB),
            b => write!(f, "{b} B"),
        }
    }
}

impl TryFrom<usize> for FrameSize {
    type Error = PoolError;

    fn try_from(bytes: usize) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}
