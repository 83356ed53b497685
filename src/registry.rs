//! Table of ranging peers
//!
//! Aggregates the stream of ranging callbacks into a list with at most one
//! entry per peer. The most recent reading for a peer always replaces the
//! previous one; readings are never rejected as stale.

use core::fmt;

use heapless::Vec;
use serde::{Serialize, Serializer, ser::SerializeStruct as _};

use crate::mac::ShortAddress;


/// Default number of peers the registry can track
///
/// The DW1000 ranging firmware keeps a handful of peers at most, so this
/// leaves plenty of headroom while keeping a snapshot within one datagram.
/// A snapshot of this many peers fits into
/// [`PAYLOAD_CAPACITY`](crate::telemetry::PAYLOAD_CAPACITY).
pub const MAX_DEVICES: usize = 16;


/// The latest range reading for one peer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceRecord {
    /// The peer's short radio address
    pub short_address: ShortAddress,

    /// Measured distance in meters
    pub range: f32,

    /// Received signal power in dBm
    pub rx_power: f32,
}

// `ShortAddress` doesn't implement `Serialize`. On the wire, the address is a
// plain integer.
impl Serialize for DeviceRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where S: Serializer
    {
        let mut record = serializer.serialize_struct("DeviceRecord", 3)?;
        record.serialize_field("address", &self.short_address.0)?;
        record.serialize_field("range", &self.range)?;
        record.serialize_field("rx_power", &self.rx_power)?;
        record.end()
    }
}


/// What [`Registry::upsert`] did
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Upsert {
    /// The peer was not known before
    Inserted,

    /// An existing record was overwritten
    Updated,
}

/// The registry is full and the peer is not in it
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegistryFull {
    /// How many peers the registry can hold
    pub capacity: usize,
}

impl fmt::Display for RegistryFull {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "device registry full ({} peers)", self.capacity)
    }
}


/// Ordered collection of [`DeviceRecord`]s, unique by short address
///
/// Holds at most `N` peers. The storage is fixed at compile time, so there
/// is no allocation, and a snapshot of the whole registry has a known upper
/// size. Once full, readings from known peers still update their records,
/// but a new peer is only taken in after another one was removed. Pick `N`
/// for the largest number of peers expected in range at the same time.
#[derive(Clone, Debug, Default)]
pub struct Registry<const N: usize = MAX_DEVICES> {
    devices: Vec<DeviceRecord, N>,
}

impl<const N: usize> Registry<N> {
    /// Creates an empty registry
    pub fn new() -> Self {
        Registry { devices: Vec::new() }
    }

    /// Inserts the record, or overwrites the one with the same address
    ///
    /// Overwriting always succeeds. Inserting fails, if the registry is full.
    pub fn upsert(&mut self, record: DeviceRecord) -> Result<Upsert, RegistryFull> {
        if let Some(existing) = self.devices
            .iter_mut()
            .find(|d| d.short_address == record.short_address)
        {
            *existing = record;
            return Ok(Upsert::Updated);
        }

        self.devices
            .push(record)
            .map(|()| Upsert::Inserted)
            .map_err(|_| RegistryFull { capacity: N })
    }

    /// Removes the record for `address`
    ///
    /// Returns the removed record. Removing an unknown address is not an
    /// error, it just returns `None`.
    pub fn remove(&mut self, address: ShortAddress) -> Option<DeviceRecord> {
        let index = self.devices
            .iter()
            .position(|d| d.short_address == address)?;

        // Keeps insertion order of the remaining peers
        Some(self.devices.remove(index))
    }

    /// Returns the record for `address`, if present
    pub fn get(&self, address: ShortAddress) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| d.short_address == address)
    }

    /// All records, in insertion order
    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    /// Number of peers currently tracked
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no peer is tracked
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Whether the registry can't take in another peer
    pub fn is_full(&self) -> bool {
        self.devices.len() == N
    }

    /// How many peers the registry can hold
    pub fn capacity(&self) -> usize {
        N
    }
}
