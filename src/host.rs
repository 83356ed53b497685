//! Adapters for running a node on a workstation
//!
//! Only available with the `std` feature. The link is a plain UDP socket:
//! "joining the network" binds the socket, and the link counts as up for as
//! long as the socket exists.

use std::{
    io,
    net::{Ipv4Addr, SocketAddrV4, UdpSocket},
    thread,
    time,
};

use embedded_hal::blocking::delay::DelayMs;

use crate::{
    link::Link,
    time::{Clock, Instant},
};


/// A [`Link`] backed by a UDP socket
#[derive(Debug)]
pub struct UdpLink {
    bind: SocketAddrV4,
    socket: Option<UdpSocket>,
}

impl UdpLink {
    /// Creates a link that binds to `bind` when connecting
    ///
    /// Use port 0 to let the operating system pick one.
    pub fn new(bind: SocketAddrV4) -> Self {
        UdpLink { bind, socket: None }
    }

    /// Drops the socket, so the link reads as disconnected
    pub fn disconnect(&mut self) {
        self.socket = None;
    }
}

impl Link for UdpLink {
    type Error = io::Error;

    fn begin(&mut self, _ssid: &str, _password: &str) -> Result<(), Self::Error> {
        let socket = UdpSocket::bind(self.bind)?;
        socket.set_nonblocking(true)?;
        self.socket = Some(socket);
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.socket.is_some()
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        match self.socket.as_ref()?.local_addr().ok()? {
            std::net::SocketAddr::V4(address) => Some(*address.ip()),
            std::net::SocketAddr::V6(_) => None,
        }
    }

    fn send_to(&mut self, destination: SocketAddrV4, payload: &[u8])
        -> nb::Result<usize, Self::Error>
    {
        let socket = self.socket
            .as_ref()
            .ok_or_else(|| nb::Error::Other(io::ErrorKind::NotConnected.into()))?;

        socket.send_to(payload, destination).map_err(|error| {
            if error.kind() == io::ErrorKind::WouldBlock {
                nb::Error::WouldBlock
            }
            else {
                nb::Error::Other(error)
            }
        })
    }
}


/// A [`Clock`] counting milliseconds since it was created
///
/// Wraps around like the 32-bit tick of a microcontroller.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    start: time::Instant,
}

impl SystemClock {
    /// Starts the clock at zero
    pub fn new() -> Self {
        SystemClock { start: time::Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&mut self) -> Instant {
        // Truncation is the wrap-around.
        Instant(self.start.elapsed().as_millis() as u32)
    }
}


/// A blocking delay that puts the current thread to sleep
#[derive(Clone, Copy, Debug, Default)]
pub struct StdDelay;

impl DelayMs<u32> for StdDelay {
    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(time::Duration::from_millis(ms.into()));
    }
}
