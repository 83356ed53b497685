//! Receiving side of the telemetry protocol
//!
//! Used by the monitoring host. [`Report::decode`] turns a datagram back into
//! one of the three message kinds, and [`Monitor`] keeps track of which role
//! each node is in.

use core::fmt;

use heapless::{LinearMap, String, Vec};
use serde::Deserialize;

use crate::{
    config::MAX_DEVICE_ADDRESS_LEN,
    registry::MAX_DEVICES,
    role::Role,
    telemetry::SYNC_TIME_ACTION,
    time::Instant,
};


/// Ranges outside of this window (in meters) are considered bogus
pub const PLAUSIBLE_RANGE: core::ops::RangeInclusive<f32> = 0.0..=100.0;

/// Longest node identifier the monitor can track
pub const MAX_ADDRESS_LEN: usize = MAX_DEVICE_ADDRESS_LEN;


/// One entry of a range snapshot
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct RangeEntry {
    /// The peer's short radio address
    pub address: u16,
    /// Measured distance in meters
    pub range: f32,
    /// Received signal power in dBm
    pub rx_power: f32,
}

impl RangeEntry {
    /// Whether the range lies within [`PLAUSIBLE_RANGE`]
    pub fn is_plausible(&self) -> bool {
        PLAUSIBLE_RANGE.contains(&self.range)
    }
}


/// A decoded telemetry message
#[derive(Clone, Debug, PartialEq)]
pub enum Report<'a> {
    /// A node switched role
    RoleChange {
        /// The node's identifier
        device_address: &'a str,
        /// The node's new role
        role: Role,
        /// The node's clock when sending
        timestamp: Instant,
    },

    /// A node's periodic time-sync ping
    TimeSync {
        /// The node's identifier
        device_address: &'a str,
        /// The node's clock when sending
        timestamp: Instant,
    },

    /// A node's device table
    RangeSnapshot {
        /// The node's identifier
        device_address: &'a str,
        /// The node's role
        role: Role,
        /// The node's clock when sending
        timestamp: Instant,
        /// The peers the node is ranging with
        range_data: Vec<RangeEntry, MAX_DEVICES>,
    },
}

// All three message kinds share one flat layout. Which fields are present
// tells them apart.
#[derive(Deserialize)]
struct Wire<'a> {
    device_address: &'a str,
    #[serde(default)]
    role: Option<Role>,
    #[serde(default, borrow)]
    action: Option<&'a str>,
    timestamp: Instant,
    #[serde(default)]
    range_data: Option<Vec<RangeEntry, MAX_DEVICES>>,
}

impl<'a> Report<'a> {
    /// Decodes a datagram
    pub fn decode(datagram: &'a [u8]) -> Result<Self, Error> {
        let (wire, _) = serde_json_core::from_slice::<Wire>(datagram)?;

        let Wire { device_address, role, action, timestamp, range_data } = wire;

        match (role, action, range_data) {
            (Some(role), None, Some(range_data)) => Ok(Report::RangeSnapshot {
                device_address,
                role,
                timestamp,
                range_data,
            }),
            (Some(role), None, None) => Ok(Report::RoleChange {
                device_address,
                role,
                timestamp,
            }),
            (None, Some(SYNC_TIME_ACTION), None) => Ok(Report::TimeSync {
                device_address,
                timestamp,
            }),
            _ => Err(Error::UnknownMessage),
        }
    }

    /// The identifier of the node that sent the message
    pub fn device_address(&self) -> &'a str {
        match self {
            Report::RoleChange { device_address, .. }
            | Report::TimeSync { device_address, .. }
            | Report::RangeSnapshot { device_address, .. } => device_address,
        }
    }

    /// The role the message reports, if any
    pub fn role(&self) -> Option<Role> {
        match self {
            Report::RoleChange { role, .. }
            | Report::RangeSnapshot { role, .. } => Some(*role),
            Report::TimeSync { .. } => None,
        }
    }
}


/// An error that can occur when processing a datagram
#[derive(Debug)]
pub enum Error {
    /// The datagram is not valid JSON, or a field has the wrong type
    Json(serde_json_core::de::Error),

    /// Valid JSON, but not one of the known message kinds
    UnknownMessage,

    /// The node identifier is longer than [`MAX_ADDRESS_LEN`]
    AddressTooLong,

    /// The monitor already tracks as many nodes as it can
    TooManyNodes,
}

impl From<serde_json_core::de::Error> for Error {
    fn from(error: serde_json_core::de::Error) -> Self {
        Error::Json(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Json(error) => write!(f, "invalid message: {}", error),
            Error::UnknownMessage => f.write_str("unknown message kind"),
            Error::AddressTooLong => f.write_str("device address too long"),
            Error::TooManyNodes => f.write_str("too many nodes"),
        }
    }
}


/// What the monitor learned from one report
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    /// Set if the node was known in another role before: `(from, to)`
    pub role_change: Option<(Role, Role)>,

    /// The first plausible range in a snapshot
    pub range: Option<RangeEntry>,
}

/// Tracks the last known role of every reporting node
#[derive(Debug, Default)]
pub struct Monitor<const N: usize = MAX_DEVICES> {
    roles: LinearMap<String<MAX_ADDRESS_LEN>, Role, N>,
}

impl<const N: usize> Monitor<N> {
    /// Creates a monitor that doesn't know any nodes yet
    pub fn new() -> Self {
        Monitor { roles: LinearMap::new() }
    }

    /// The last role reported by `device_address`
    pub fn role_of(&self, device_address: &str) -> Option<Role> {
        self.roles
            .iter()
            .find(|(address, _)| address.as_str() == device_address)
            .map(|(_, role)| *role)
    }

    /// Number of nodes seen so far
    pub fn nodes(&self) -> usize {
        self.roles.len()
    }

    /// Updates the monitor with a decoded report
    pub fn observe(&mut self, report: &Report) -> Result<Observation, Error> {
        let mut observation = Observation {
            role_change: None,
            range: None,
        };

        if let Some(role) = report.role() {
            let mut address = String::new();
            address
                .push_str(report.device_address())
                .map_err(|()| Error::AddressTooLong)?;

            match self.roles.get_mut(&address) {
                Some(known) => {
                    if *known != role {
                        observation.role_change = Some((*known, role));
                        *known = role;
                    }
                }
                None => {
                    self.roles
                        .insert(address, role)
                        .map_err(|_| Error::TooManyNodes)?;
                }
            }
        }

        if let Report::RangeSnapshot { range_data, .. } = report {
            observation.range = range_data.iter().copied().find(RangeEntry::is_plausible);
        }

        Ok(observation)
    }

    /// Decodes a datagram and updates the monitor with it
    pub fn ingest<'a>(&mut self, datagram: &'a [u8])
        -> Result<(Report<'a>, Observation), Error>
    {
        let report = Report::decode(datagram)?;
        let observation = self.observe(&report)?;
        Ok((report, observation))
    }
}
