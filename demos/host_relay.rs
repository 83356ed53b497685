//! Runs a node on a workstation, against a simulated ranging library
//!
//! Telemetry goes out as real UDP datagrams, so this can be pointed at the
//! `monitor` demo:
//!
//! ``` text
//! cargo run --features std --example monitor -- 127.0.0.1:3333
//! cargo run --features std --example host_relay -- 127.0.0.1:3333 tag
//! ```
//!
//! Both arguments are optional. The second one selects the initial role.

use std::{
    env,
    net::{Ipv4Addr, SocketAddrV4},
};

use log::{error, info, warn};

use uwb_relay::{
    host::{StdDelay, SystemClock, UdpLink},
    mac::ShortAddress,
    time::{Duration, Ticker},
    Clock,
    Config,
    Node,
    RadioMode,
    Ranging,
    RangingEvents,
    Role,
};


/// Peers of the simulated ranging library, with their distance in meters
const PEERS: [(u16, f32); 3] = [
    (0x1A2B, 1.25),
    (0x2C3D, 3.5),
    (0x4E5F, 7.75),
];


/// Produces a range sample every 250 ms, cycling through `PEERS`
///
/// Every 20th step, the peer that's up next goes inactive instead, and is
/// announced again the next time it's ranged with.
struct SimulatedRanging {
    clock: SystemClock,
    ticker: Ticker,
    step: u32,
    seen: [bool; 3],
    role: Option<Role>,
}

impl SimulatedRanging {
    fn new() -> Self {
        let mut clock = SystemClock::new();
        let now = clock.now();

        SimulatedRanging {
            clock,
            ticker: Ticker::new(Duration::from_millis(250), now),
            step: 0,
            seen: [false; 3],
            role: None,
        }
    }
}

impl Ranging for SimulatedRanging {
    type Error = ();

    fn init(&mut self) -> Result<(), Self::Error> {
        info!("Simulated ranging library ready");
        Ok(())
    }

    fn start_as_anchor(&mut self, address: &str, mode: RadioMode) -> Result<(), Self::Error> {
        info!("{} ranging as anchor ({:?})", address, mode);
        self.role = Some(Role::Anchor);
        Ok(())
    }

    fn start_as_tag(&mut self, address: &str, mode: RadioMode) -> Result<(), Self::Error> {
        info!("{} ranging as tag ({:?})", address, mode);
        self.role = Some(Role::Tag);
        Ok(())
    }

    fn poll<E>(&mut self, events: &mut E) -> Result<(), Self::Error>
        where E: RangingEvents
    {
        let now = self.clock.now();
        if self.role.is_none() || !self.ticker.poll(now) {
            return Ok(());
        }

        self.step += 1;
        let index = self.step as usize % PEERS.len();
        let (address, distance) = PEERS[index];
        let address = ShortAddress(address);

        if self.step % 20 == 0 {
            self.seen[index] = false;
            events.on_device_inactive(address);
            return Ok(());
        }

        if !self.seen[index] {
            self.seen[index] = true;
            events.on_new_device(address);
        }

        // A few centimeters of jitter, and weaker signal further away
        let jitter = (self.step % 7) as f32 * 0.01;
        events.on_new_range(address, distance + jitter, -70.0 - distance * 2.0);

        Ok(())
    }
}


fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let mut config = Config::default();

    if let Some(destination) = args.next() {
        match destination.parse() {
            Ok(destination) => config.destination = destination,
            Err(_) => warn!("Invalid destination {}, using {}", destination, config.destination),
        }
    }

    if let Some(role) = args.next() {
        match role.parse::<Role>() {
            Ok(role) => config.initial_role = role,
            Err(error) => warn!("{}: {}, starting as {}", error, role, config.initial_role),
        }
    }

    // Shorter cycle than the reference setup, so there's something to watch
    config.anchor_interval = Duration::from_millis(3_000);
    config.tag_interval = Duration::from_millis(6_000);

    let link = UdpLink::new(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));

    let node = Node::<_, _, _, _>::new(
        config,
        SimulatedRanging::new(),
        link,
        SystemClock::new(),
        StdDelay,
    );

    match node {
        Ok(node) => node.run(),
        Err(err) => error!("Invalid configuration: {}", err),
    }
}
