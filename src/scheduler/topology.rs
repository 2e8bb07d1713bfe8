//! Device list and per-device slot capacities, validated once at construction.

use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque compute device identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Device(pub u32);

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("No devices given")]
    NoDevices,

    #[error("Got {devices} devices but {capacities} capacities")]
    LengthMismatch { devices: usize, capacities: usize },

    #[error("Device {device} has zero capacity; capacities must be positive")]
    ZeroCapacity { device: u32 },

    #[error("Device {device} listed more than once")]
    DuplicateDevice { device: u32 },
}

/// Serialized form; every deserialization goes back through validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTopology {
    devices: Vec<u32>,
    capacities: Vec<usize>,
}

/// Fixed set of devices with their slot capacities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTopology", into = "RawTopology")]
pub struct Topology {
    devices: Vec<Device>,
    capacities: Vec<NonZeroUsize>,
}

impl Topology {
    /// Validate `devices` against the parallel `capacities` list.
    pub fn new(devices: Vec<u32>, capacities: Vec<usize>) -> Result<Self, TopologyError> {
        if devices.len() != capacities.len() {
            return Err(TopologyError::LengthMismatch {
                devices: devices.len(),
                capacities: capacities.len(),
            });
        }
        if devices.is_empty() {
            return Err(TopologyError::NoDevices);
        }
        let mut seen = HashSet::with_capacity(devices.len());
        if let Some(&device) = devices.iter().find(|&&d| !seen.insert(d)) {
            return Err(TopologyError::DuplicateDevice { device });
        }
        let capacities = devices
            .iter()
            .zip(&capacities)
            .map(|(&device, &cap)| {
                NonZeroUsize::new(cap).ok_or(TopologyError::ZeroCapacity { device })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            devices: devices.into_iter().map(Device).collect(),
            capacities,
        })
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Device at row `index`.
    pub fn device(&self, index: usize) -> Device {
        self.devices[index]
    }

    pub fn capacity(&self, index: usize) -> usize {
        self.capacities[index].get()
    }

    /// Number of device rows.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Always false for a validated topology.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Largest capacity of any device.
    pub fn max_capacity(&self) -> usize {
        self.capacities.iter().map(|c| c.get()).max().unwrap_or(0)
    }

    /// Upper bound on concurrently running tasks.
    pub fn total_capacity(&self) -> usize {
        self.capacities.iter().map(|c| c.get()).sum()
    }

    /// `(device, capacity)` pairs in row order.
    pub fn iter(&self) -> impl Iterator<Item = (Device, usize)> + '_ {
        self.devices
            .iter()
            .copied()
            .zip(self.capacities.iter().map(|c| c.get()))
    }
}

impl TryFrom<RawTopology> for Topology {
    type Error = TopologyError;

    fn try_from(raw: RawTopology) -> Result<Self, Self::Error> {
        Self::new(raw.devices, raw.capacities)
    }
}

impl From<Topology> for RawTopology {
    fn from(t: Topology) -> Self {
        Self {
            devices: t.devices.iter().map(|d| d.0).collect(),
            capacities: t.capacities.iter().map(|c| c.get()).collect(),
        }
    }
}
