//! Telemetry messages and the publisher that sends them
//!
//! Every message is a single JSON object in a single UDP datagram. There are
//! three kinds:
//!
//! - [`RoleChange`], sent whenever the node switches role
//! - [`SyncTime`], sent periodically so the host can line up clocks
//! - [`RangeSnapshot`], the full device table, sent on every new range
//!
//! Sending is fire-and-forget. If the link is down, the message is dropped.
//! Nothing is queued and nothing is retried.

use core::{fmt, net::SocketAddrV4};

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    config::MAX_DEVICE_ADDRESS_LEN,
    link::Link,
    registry::{DeviceRecord, MAX_DEVICES},
    role::Role,
    time::Instant,
};


/// Default size of the buffer messages are serialized into
///
/// Fits a snapshot of a registry holding [`MAX_DEVICES`] peers.
pub const PAYLOAD_CAPACITY: usize = snapshot_capacity(MAX_DEVICES);

/// Value of the `action` field of a time-sync ping
pub const SYNC_TIME_ACTION: &str = "sync_time";


/// Longest text of a `u16`
const U16_TEXT_LEN: usize = 5;

/// Longest text of a `u32`
const U32_TEXT_LEN: usize = 10;

/// Longest text of an `f32`, as formatted by `ryu` (`-1.17549435e-38`), or
/// `null` for non-finite values
const F32_TEXT_LEN: usize = 16;

/// Worst-case size of a range snapshot with `devices` peers, in bytes
///
/// Assumes the longest role name, the largest timestamp and a device address
/// of [`MAX_DEVICE_ADDRESS_LEN`] bytes that needs no escaping (see
/// [`Config::validate`](crate::config::Config::validate)). The other two
/// messages are always smaller than an empty snapshot.
pub const fn snapshot_capacity(devices: usize) -> usize {
    const FRAME: &str =
        r#"{"device_address":"","role":"ANCHOR","timestamp":,"range_data":[]}"#;
    // Includes the separating comma
    const RECORD: &str = r#"{"address":,"range":,"rx_power":},"#;

    FRAME.len() + MAX_DEVICE_ADDRESS_LEN + U32_TEXT_LEN
        + devices * (RECORD.len() + U16_TEXT_LEN + 2 * F32_TEXT_LEN)
}


/// Announces the role the node just switched to
#[derive(Debug, Serialize)]
pub struct RoleChange<'a> {
    /// The node's identifier
    pub device_address: &'a str,
    /// The new role
    pub role: Role,
    /// Milliseconds since the node started
    pub timestamp: Instant,
}

/// Periodic time-sync ping
#[derive(Debug, Serialize)]
pub struct SyncTime<'a> {
    /// The node's identifier
    pub device_address: &'a str,
    /// Always [`SYNC_TIME_ACTION`]
    pub action: &'a str,
    /// Milliseconds since the node started
    pub timestamp: Instant,
}

/// The node's current view of its ranging peers
#[derive(Debug, Serialize)]
pub struct RangeSnapshot<'a> {
    /// The node's identifier
    pub device_address: &'a str,
    /// The node's current role
    pub role: Role,
    /// Milliseconds since the node started
    pub timestamp: Instant,
    /// One entry per known peer
    pub range_data: &'a [DeviceRecord],
}


/// An error that can occur when publishing a message
#[derive(Debug)]
pub enum Error<E> {
    /// The link is down, the message was dropped
    NotConnected,

    /// The message didn't fit into the payload buffer
    Serialize(serde_json_core::ser::Error),

    /// The link reported an error
    Link(E),

    /// The link accepted fewer bytes than the payload has
    Incomplete {
        /// Bytes reported as sent
        sent: usize,
        /// Length of the payload
        len: usize,
    },
}

impl<E> From<serde_json_core::ser::Error> for Error<E> {
    fn from(error: serde_json_core::ser::Error) -> Self {
        Error::Serialize(error)
    }
}

/// Serializes telemetry messages and sends them to a fixed destination
///
/// `CAP` is the size of the payload buffer. Use [`snapshot_capacity`] to
/// size it for a given registry.
pub struct Publisher<const CAP: usize = PAYLOAD_CAPACITY> {
    device_address: &'static str,
    destination: SocketAddrV4,
    buf: [u8; CAP],
}

impl<const CAP: usize> Publisher<CAP> {
    /// Creates a publisher for the node `device_address`
    pub fn new(device_address: &'static str, destination: SocketAddrV4) -> Self {
        Publisher {
            device_address,
            destination,
            buf: [0; CAP],
        }
    }

    /// Where messages are sent
    pub fn destination(&self) -> SocketAddrV4 {
        self.destination
    }

    /// Announces a role change
    pub fn role_change<L>(&mut self, link: &mut L, role: Role, now: Instant)
        -> Result<usize, Error<L::Error>>
        where L: Link
    {
        let message = RoleChange {
            device_address: self.device_address,
            role,
            timestamp: now,
        };
        self.publish(link, &message)
    }

    /// Sends a time-sync ping
    pub fn sync_time<L>(&mut self, link: &mut L, now: Instant)
        -> Result<usize, Error<L::Error>>
        where L: Link
    {
        let message = SyncTime {
            device_address: self.device_address,
            action: SYNC_TIME_ACTION,
            timestamp: now,
        };
        self.publish(link, &message)
    }

    /// Sends the full device table
    pub fn range_snapshot<L>(&mut self,
        link:    &mut L,
        role:    Role,
        devices: &[DeviceRecord],
        now:     Instant,
    )
        -> Result<usize, Error<L::Error>>
        where L: Link
    {
        let message = RangeSnapshot {
            device_address: self.device_address,
            role,
            timestamp: now,
            range_data: devices,
        };
        self.publish(link, &message)
    }

    fn publish<L, T>(&mut self, link: &mut L, message: &T)
        -> Result<usize, Error<L::Error>>
        where
            L: Link,
            T: Serialize,
    {
        if !link.is_connected() {
            return Err(Error::NotConnected);
        }

        let len = serde_json_core::to_slice(message, &mut self.buf)?;
        let payload = &self.buf[..len];

        if let Ok(text) = core::str::from_utf8(payload) {
            debug!("JSON data: {}", text);
        }

        let sent = nb::block!(link.send_to(self.destination, payload))
            .map_err(Error::Link)?;

        if sent < len {
            return Err(Error::Incomplete { sent, len });
        }

        Ok(sent)
    }
}


/// Logs the outcome of a publish attempt
///
/// Publishing never takes corrective action. This is the only thing that
/// happens with its result.
pub fn log_result<E>(what: &str, result: &Result<usize, Error<E>>)
    where E: fmt::Debug
{
    match result {
        Ok(sent) => info!("{} sent via UDP ({} bytes)", what, sent),
        Err(Error::NotConnected) => warn!("Not connected. Cannot send {}.", what),
        Err(error) => warn!("Failed to send {} via UDP: {:?}", what, error),
    }
}
