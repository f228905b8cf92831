// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The device boundary: session handles, transfer directions and the
//! [`DmaMapper`] trait.

use crate::MappingError;
use std::fmt;

/// Opaque identifier of an accelerator session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct DeviceHandle(u32);

impl DeviceHandle {
    /// Wraps a raw session identifier.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw session identifier.
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vdevice#{}", self.0)
    }
}

/// Direction of the transfers a mapped region takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DmaDirection {
    /// The host writes frames the device reads (stream inputs).
    #[serde(rename = "h2d", alias = "host-to-device")]
    HostToDevice,
    /// The device writes frames the host reads (stream outputs).
    #[serde(rename = "d2h", alias = "device-to-host")]
    DeviceToHost,
    /// Both directions.
    #[serde(rename = "both")]
    Both,
}

impl DmaDirection {
    /// Returns the short name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HostToDevice => "h2d",
            Self::DeviceToHost => "d2h",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for DmaDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of one mapping on one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MappingId(pub(crate) u64);

impl MappingId {
    /// Wraps a raw identifier handed out by a [`DmaMapper`] implementation.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MappingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mapping#{}", self.0)
    }
}

/// A device session that can bind host memory for DMA.
///
/// Implementations must be thread-safe: mappings are created while pools
/// are being built and released from whichever thread drops the last
/// buffer that uses them.
pub trait DmaMapper: Send + Sync + fmt::Debug {
    /// Returns the session this mapper is bound to.
    fn handle(&self) -> DeviceHandle;

    /// Returns `true` while the session accepts new mappings.
    fn is_open(&self) -> bool;

    /// Binds `len` bytes at `address` to the device for `direction`.
    fn map(
        &self,
        address: usize,
        len: usize,
        direction: DmaDirection,
    ) -> Result<MappingId, MappingError>;

    /// Releases a mapping previously returned by [`map`](Self::map).
    fn unmap(&self, id: MappingId) -> Result<(), MappingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display() {
        assert_eq!(DeviceHandle::new(7).to_string(), "vdevice#7");
        assert_eq!(DeviceHandle::new(7).raw(), 7);
    }

    #[test]
    fn test_direction_names() {
        assert_eq!(DmaDirection::HostToDevice.to_string(), "h2d");
        assert_eq!(DmaDirection::DeviceToHost.to_string(), "d2h");
        assert_eq!(DmaDirection::Both.to_string(), "both");
    }

    #[test]
    fn test_direction_serde() {
        let json = serde_json::to_string(&DmaDirection::DeviceToHost).unwrap();
        assert_eq!(json, "\"d2h\"");

        let d: DmaDirection = serde_json::from_str("\"host-to-device\"").unwrap();
        assert_eq!(d, DmaDirection::HostToDevice);

        assert!(serde_json::from_str::<DmaDirection>("\"sideways\"").is_err());
    }
}
