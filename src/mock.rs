//! In-memory stand-ins for the node's collaborators, used by the tests

use std::{
    cell::Cell,
    net::{Ipv4Addr, SocketAddrV4},
    rc::Rc,
    string::String,
    vec::Vec,
};

use embedded_hal::blocking::delay::DelayMs;

use crate::{
    config::RadioMode,
    link::Link,
    mac::ShortAddress,
    ranging::{Ranging, RangingEvents},
    role::Role,
    time::{Clock, Instant},
};


/// A clock that only moves when told to
#[derive(Clone, Debug, Default)]
pub struct MockClock(Rc<Cell<u32>>);

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, millis: u32) {
        self.0.set(millis);
    }

    pub fn advance(&self, millis: u32) {
        self.0.set(self.0.get().wrapping_add(millis));
    }

    pub fn millis(&self) -> u32 {
        self.0.get()
    }
}

impl Clock for MockClock {
    fn now(&mut self) -> Instant {
        Instant(self.0.get())
    }
}


/// A delay that advances a [`MockClock`] instead of sleeping
#[derive(Debug)]
pub struct MockDelay {
    clock: MockClock,
    pub total_ms: u32,
}

impl MockDelay {
    pub fn new(clock: &MockClock) -> Self {
        MockDelay { clock: clock.clone(), total_ms: 0 }
    }
}

impl DelayMs<u32> for MockDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.clock.advance(ms);
        self.total_ms += ms;
    }
}


#[derive(Debug, Eq, PartialEq)]
pub struct MockLinkError;

/// A link that records every datagram it is asked to send
#[derive(Debug, Default)]
pub struct MockLink {
    pub connected: bool,
    /// Number of status checks after `begin` before the link comes up
    pub connect_after: Option<u8>,
    pending: Option<u8>,
    pub begin_calls: usize,
    /// Value reported as sent, instead of the payload length
    pub short_write: Option<usize>,
    pub fail_sends: bool,
    pub sent: Vec<(SocketAddrV4, String)>,
}

impl MockLink {
    pub fn connected() -> Self {
        MockLink { connected: true, ..Self::default() }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn payloads(&self) -> Vec<&str> {
        self.sent.iter().map(|(_, payload)| payload.as_str()).collect()
    }
}

impl Link for MockLink {
    type Error = MockLinkError;

    fn begin(&mut self, _ssid: &str, _password: &str) -> Result<(), Self::Error> {
        self.begin_calls += 1;
        self.pending = self.connect_after;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        if !self.connected {
            match self.pending {
                Some(0) => {
                    self.connected = true;
                    self.pending = None;
                }
                Some(n) => self.pending = Some(n - 1),
                None => (),
            }
        }
        self.connected
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        if self.connected {
            Some(Ipv4Addr::new(192, 168, 0, 42))
        }
        else {
            None
        }
    }

    fn send_to(&mut self, destination: SocketAddrV4, payload: &[u8])
        -> nb::Result<usize, Self::Error>
    {
        if self.fail_sends {
            return Err(nb::Error::Other(MockLinkError));
        }

        let text = String::from_utf8(payload.to_vec()).expect("payload is not UTF-8");
        self.sent.push((destination, text));

        Ok(self.short_write.unwrap_or(payload.len()))
    }
}


/// One ranging event, as queued on [`MockRanging`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    Range(u16, f32, f32),
    NewDevice(u16),
    Inactive(u16),
}

/// A ranging library that replays queued events on the next `poll`
#[derive(Debug, Default)]
pub struct MockRanging {
    pub initialized: bool,
    pub started: Vec<(Role, RadioMode)>,
    pub queued: Vec<Event>,
    pub polls: usize,
    pub fail_start: bool,
}

#[derive(Debug)]
pub struct MockRangingError;

impl MockRanging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.queued.push(event);
    }

    fn start(&mut self, role: Role, mode: RadioMode) -> Result<(), MockRangingError> {
        self.started.push((role, mode));
        if self.fail_start {
            Err(MockRangingError)
        }
        else {
            Ok(())
        }
    }
}

impl Ranging for MockRanging {
    type Error = MockRangingError;

    fn init(&mut self) -> Result<(), Self::Error> {
        self.initialized = true;
        Ok(())
    }

    fn start_as_anchor(&mut self, _address: &str, mode: RadioMode) -> Result<(), Self::Error> {
        self.start(Role::Anchor, mode)
    }

    fn start_as_tag(&mut self, _address: &str, mode: RadioMode) -> Result<(), Self::Error> {
        self.start(Role::Tag, mode)
    }

    fn poll<E>(&mut self, events: &mut E) -> Result<(), Self::Error>
        where E: RangingEvents
    {
        self.polls += 1;
        for event in self.queued.drain(..) {
            match event {
                Event::Range(address, range, rx_power) =>
                    events.on_new_range(ShortAddress(address), range, rx_power),
                Event::NewDevice(address) =>
                    events.on_new_device(ShortAddress(address)),
                Event::Inactive(address) =>
                    events.on_device_inactive(ShortAddress(address)),
            }
        }
        Ok(())
    }
}
