//! Node configuration
//!
//! Everything that is fixed for the lifetime of a node: its identity, where
//! telemetry goes, how to join the network, and the timing of the polling
//! loop. [`Config::default`] carries the reference values.

use core::{
    fmt,
    net::{Ipv4Addr, SocketAddrV4},
};

use crate::{role::Role, time::Duration};


/// Longest [`Config::device_address`] a node accepts, in bytes
///
/// Telemetry payloads are sized for this. See
/// [`snapshot_capacity`](crate::telemetry::snapshot_capacity).
pub const MAX_DEVICE_ADDRESS_LEN: usize = 32;


/// Node configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// The node's identifier
    ///
    /// Passed to the ranging library when starting a role, and sent as the
    /// `device_address` field of every telemetry message.
    pub device_address: &'static str,

    /// Network name used when (re)connecting the link
    pub ssid: &'static str,

    /// Network passphrase used when (re)connecting the link
    pub password: &'static str,

    /// Where telemetry datagrams are sent
    pub destination: SocketAddrV4,

    /// The role the node starts in
    pub initial_role: Role,

    /// How long the node stays an anchor before switching to tag
    pub anchor_interval: Duration,

    /// How long the node stays a tag before switching to anchor
    pub tag_interval: Duration,

    /// Period of the measurement marker
    pub measurement_interval: Duration,

    /// Period of the time-sync ping
    pub sync_interval: Duration,

    /// Blocking pause after the ranging library was switched to a new role
    pub role_settle: Duration,

    /// How many times link status is checked while connecting
    pub connect_attempts: u8,

    /// Pause between two link status checks while connecting
    pub connect_retry_delay: Duration,

    /// Radio preset handed to the ranging library on every role start
    pub radio_mode: RadioMode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device_address: "7D:00:22:EA:82:60:3B:9C",
            ssid: "your_wifi_ssid",
            password: "your_wifi_password",
            destination: SocketAddrV4::new(Ipv4Addr::new(192, 168, 0, 10), 3333),
            initial_role: Role::Anchor,
            anchor_interval: Duration::from_millis(5_000),
            tag_interval: Duration::from_millis(15_000),
            measurement_interval: Duration::from_millis(100),
            sync_interval: Duration::from_millis(5_000),
            role_settle: Duration::from_millis(100),
            connect_attempts: 20,
            connect_retry_delay: Duration::from_millis(500),
            radio_mode: RadioMode::default(),
        }
    }
}

impl Config {
    /// Checks the parts of the configuration that telemetry relies on
    ///
    /// The device address must be at most [`MAX_DEVICE_ADDRESS_LEN`] bytes of
    /// printable ASCII, without quotes or backslashes. Those are the
    /// characters that end up in JSON verbatim, so the address can't make a
    /// payload outgrow its buffer.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        let address = self.device_address;

        if address.len() > MAX_DEVICE_ADDRESS_LEN {
            return Err(InvalidConfig::DeviceAddressTooLong { len: address.len() });
        }
        if let Some(c) = address.chars().find(|&c| !is_plain_json(c)) {
            return Err(InvalidConfig::DeviceAddressCharacter(c));
        }

        Ok(())
    }

    /// Returns the switch interval of the given role
    pub fn role_interval(&self, role: Role) -> Duration {
        match role {
            Role::Anchor => self.anchor_interval,
            Role::Tag => self.tag_interval,
        }
    }
}


fn is_plain_json(c: char) -> bool {
    (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\'
}


/// A configuration the node can't run with
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InvalidConfig {
    /// The device address is longer than [`MAX_DEVICE_ADDRESS_LEN`]
    DeviceAddressTooLong {
        /// Length of the configured address, in bytes
        len: usize,
    },

    /// The device address contains a character JSON would escape
    DeviceAddressCharacter(char),
}

impl fmt::Display for InvalidConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InvalidConfig::DeviceAddressTooLong { len } => write!(
                f,
                "device address is {} bytes long, at most {} are supported",
                len, MAX_DEVICE_ADDRESS_LEN,
            ),
            InvalidConfig::DeviceAddressCharacter(c) =>
                write!(f, "device address contains unsupported character {:?}", c),
        }
    }
}


#[derive(Copy, Clone, Debug, Eq, PartialEq)]
/// Radio preset used for ranging
///
/// These are the trade-offs the DW1000 ranging firmware offers between data
/// rate, pulse repetition frequency and preamble length. Long-data modes use
/// 110 kbps, short-data modes 6.8 Mbps. Range modes use the longer preamble.
pub enum RadioMode {
    /// 110 kbps, 16 MHz PRF, 2048 symbol preamble
    LongDataRangeLowPower,
    /// 6.8 Mbps, 16 MHz PRF, 128 symbol preamble
    ShortDataFastLowPower,
    /// 110 kbps, 16 MHz PRF, 1024 symbol preamble
    LongDataFastLowPower,
    /// 6.8 Mbps, 64 MHz PRF, 128 symbol preamble
    ShortDataFastAccuracy,
    /// 110 kbps, 64 MHz PRF, 1024 symbol preamble
    LongDataFastAccuracy,
    /// 110 kbps, 64 MHz PRF, 2048 symbol preamble
    LongDataRangeAccuracy,
}

impl Default for RadioMode {
    fn default() -> Self {
        RadioMode::LongDataRangeLowPower
    }
}

impl RadioMode {
    /// Data rate in kbps
    pub fn bitrate_kbps(&self) -> u32 {
        match self {
            RadioMode::ShortDataFastLowPower
            | RadioMode::ShortDataFastAccuracy => 6800,
            _ => 110,
        }
    }

    /// Pulse repetition frequency in MHz
    pub fn prf_mhz(&self) -> u8 {
        match self {
            RadioMode::LongDataRangeLowPower
            | RadioMode::ShortDataFastLowPower
            | RadioMode::LongDataFastLowPower => 16,
            _ => 64,
        }
    }

    /// Preamble length in symbols
    pub fn preamble_symbols(&self) -> u16 {
        match self {
            RadioMode::LongDataRangeLowPower
            | RadioMode::LongDataRangeAccuracy => 2048,
            RadioMode::LongDataFastLowPower
            | RadioMode::LongDataFastAccuracy => 1024,
            RadioMode::ShortDataFastLowPower
            | RadioMode::ShortDataFastAccuracy => 128,
        }
    }
}
