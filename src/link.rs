//! Network link and connectivity supervision
//!
//! The [`Link`] trait abstracts the network interface the node reports
//! through: joining the network, checking whether it is still joined, and
//! sending datagrams. [`ensure_connected`] is the level-triggered recovery the
//! polling loop runs on every iteration.

use core::{fmt, net::{Ipv4Addr, SocketAddrV4}};

use embedded_hal::blocking::delay::DelayMs;
use log::{info, warn};

use crate::config::Config;


/// Implemented by the network interface
pub trait Link {
    /// Error reported by the network interface
    type Error: fmt::Debug;

    /// Starts joining the network
    ///
    /// Doesn't have to wait for the connection to be established. Progress is
    /// observed through [`Link::is_connected`].
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Whether the link is currently up
    fn is_connected(&mut self) -> bool;

    /// The node's own address, if the link is up
    fn local_ip(&self) -> Option<Ipv4Addr>;

    /// Sends `payload` as a single datagram to `destination`
    ///
    /// Returns the number of bytes that were handed to the network.
    fn send_to(&mut self, destination: SocketAddrV4, payload: &[u8])
        -> nb::Result<usize, Self::Error>;
}


/// Result of a connection attempt
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Connection {
    /// The link was already up, nothing was done
    AlreadyUp,

    /// The link came up after the given number of status checks
    Established {
        /// Number of status checks that found the link down
        attempts: u8,
    },

    /// The link didn't come up within the configured number of checks
    Failed,
}

/// Joins the network, blocking until connected or out of attempts
///
/// Checks the link status up to `config.connect_attempts` times, pausing
/// `config.connect_retry_delay` before each check.
pub fn connect<L, D>(link: &mut L, delay: &mut D, config: &Config) -> Connection
    where
        L: Link,
        D: DelayMs<u32>,
{
    info!("Connecting to {}...", config.ssid);

    if let Err(error) = link.begin(config.ssid, config.password) {
        warn!("Failed to start connecting: {:?}", error);
    }

    let mut attempts = 0;
    while !link.is_connected() && attempts < config.connect_attempts {
        delay.delay_ms(config.connect_retry_delay.as_millis());
        attempts += 1;
    }

    if link.is_connected() {
        match link.local_ip() {
            Some(ip) => info!("Connected, IP address: {}", ip),
            None => info!("Connected"),
        }
        Connection::Established { attempts }
    }
    else {
        warn!(
            "Failed to connect after {} attempts. Please check your credentials.",
            attempts,
        );
        Connection::Failed
    }
}

/// Reconnects, if the link is down
///
/// Called once per loop iteration. Does nothing if the link is up.
pub fn ensure_connected<L, D>(link: &mut L, delay: &mut D, config: &Config) -> Connection
    where
        L: Link,
        D: DelayMs<u32>,
{
    if link.is_connected() {
        return Connection::AlreadyUp;
    }

    warn!("Connection lost. Reconnecting...");
    connect(link, delay, config)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockClock, MockDelay, MockLink};

    #[test]
    fn up_link_is_left_alone() {
        let clock = MockClock::new();
        let mut delay = MockDelay::new(&clock);
        let mut link = MockLink::connected();

        let result = ensure_connected(&mut link, &mut delay, &Config::default());

        assert_eq!(result, Connection::AlreadyUp);
        assert_eq!(link.begin_calls, 0);
        assert_eq!(delay.total_ms, 0);
    }

    #[test]
    fn reconnects_after_some_attempts() {
        let clock = MockClock::new();
        let mut delay = MockDelay::new(&clock);
        let mut link = MockLink::disconnected();
        link.connect_after = Some(3);

        let result = ensure_connected(&mut link, &mut delay, &Config::default());

        assert_eq!(result, Connection::Established { attempts: 3 });
        assert_eq!(link.begin_calls, 1);
        assert_eq!(delay.total_ms, 1_500);
    }

    #[test]
    fn gives_up_after_configured_attempts() {
        let clock = MockClock::new();
        let mut delay = MockDelay::new(&clock);
        let mut link = MockLink::disconnected();

        let config = Config::default();
        let result = ensure_connected(&mut link, &mut delay, &config);

        assert_eq!(result, Connection::Failed);
        assert_eq!(delay.total_ms, 20 * 500);
        assert_eq!(clock.millis(), 20 * 500);
    }
}
