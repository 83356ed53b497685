//! The node and its polling loop
//!
//! A [`Node`] owns everything: configuration, role state, device registry,
//! telemetry publisher, and the collaborators (ranging library, link, clock,
//! delay). There is no other state. The loop is cooperative and
//! single-threaded: [`Node::poll`] runs one iteration, and the ranging
//! library's callbacks execute synchronously inside it.

use embedded_hal::blocking::delay::DelayMs;
use log::{debug, info, warn};

use crate::{
    bridge::EventBridge,
    config::{Config, InvalidConfig},
    link::{self, Connection, Link},
    ranging::Ranging,
    registry::{Registry, MAX_DEVICES},
    role::{Role, RoleState},
    telemetry::{self, Publisher, PAYLOAD_CAPACITY},
    time::{Clock, Instant, Ticker},
};


/// A role-switching ranging node
///
/// `N` is the registry capacity and `CAP` the size of the telemetry payload
/// buffer. `CAP` must be at least
/// [`snapshot_capacity(N)`](crate::telemetry::snapshot_capacity), otherwise
/// [`Node::new`] fails to compile.
pub struct Node<R, L, C, D,
    const N:   usize = MAX_DEVICES,
    const CAP: usize = PAYLOAD_CAPACITY,
> {
    config: Config,
    role: RoleState,
    registry: Registry<N>,
    publisher: Publisher<CAP>,
    measurement: Ticker,
    sync: Ticker,
    ranging: R,
    link: L,
    clock: C,
    delay: D,
}

impl<R, L, C, D, const N: usize, const CAP: usize> Node<R, L, C, D, N, CAP>
    where
        R: Ranging,
        L: Link,
        C: Clock,
        D: DelayMs<u32>,
{
    const SNAPSHOT_FITS: () = assert!(
        telemetry::snapshot_capacity(N) <= CAP,
        "payload buffer too small for a snapshot of a full registry",
    );

    /// Sets up the node
    ///
    /// Joins the network, initializes the ranging library and starts it in
    /// the configured initial role. All loop timers, including both role
    /// timers, start at the instant setup finishes.
    ///
    /// Fails without touching any collaborator, if `config` doesn't pass
    /// [`Config::validate`].
    pub fn new(config: Config, mut ranging: R, mut link: L, mut clock: C, mut delay: D)
        -> Result<Self, InvalidConfig>
    {
        let () = Self::SNAPSHOT_FITS;
        config.validate()?;

        info!("Setup started");

        link::connect(&mut link, &mut delay, &config);

        info!("Initializing UWB...");
        if let Err(error) = ranging.init() {
            warn!("Failed to initialize ranging: {:?}", error);
        }
        start_role(&mut ranging, &mut delay, &config, config.initial_role);
        info!("UWB initialized");

        let now = clock.now();
        let publisher = Publisher::new(config.device_address, config.destination);

        info!("Setup completed");

        Ok(Node {
            role: RoleState::new(config.initial_role, now),
            registry: Registry::new(),
            publisher,
            measurement: Ticker::new(config.measurement_interval, now),
            sync: Ticker::new(config.sync_interval, now),
            config,
            ranging,
            link,
            clock,
            delay,
        })
    }

    /// Runs the polling loop forever
    pub fn run(mut self) -> ! {
        loop {
            self.poll();
        }
    }

    /// Runs one iteration of the polling loop
    pub fn poll(&mut self) {
        let now = self.clock.now();

        if let Connection::Failed =
            link::ensure_connected(&mut self.link, &mut self.delay, &self.config)
        {
            debug!("Continuing without network");
        }

        self.check_role(now);

        if self.measurement.poll(now) {
            // Ranging happens inside the library's poll step. This only marks
            // the measurement cadence.
            debug!("Measuring distances...");
        }

        if self.sync.poll(now) {
            self.sync_time();
        }

        let mut bridge = EventBridge {
            registry: &mut self.registry,
            publisher: &mut self.publisher,
            link: &mut self.link,
            clock: &mut self.clock,
            role: self.role.current(),
            snapshots: 0,
        };
        if let Err(error) = self.ranging.poll(&mut bridge) {
            warn!("Ranging step failed: {:?}", error);
        }
    }

    /// Switches role, if the current role's interval has elapsed at `now`
    ///
    /// Returns the new role, if a switch happened.
    pub fn check_role(&mut self, now: Instant) -> Option<Role> {
        let config = &self.config;
        let new_role = self.role.poll(now, |role| config.role_interval(role))?;

        start_role(&mut self.ranging, &mut self.delay, &self.config, new_role);

        let timestamp = self.clock.now();
        let result = self.publisher.role_change(&mut self.link, new_role, timestamp);
        telemetry::log_result("role change", &result);

        Some(new_role)
    }

    fn sync_time(&mut self) {
        let now = self.clock.now();
        let result = self.publisher.sync_time(&mut self.link, now);
        telemetry::log_result("time sync", &result);
    }

    /// The node's configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The node's current role
    pub fn role(&self) -> Role {
        self.role.current()
    }

    /// The role state machine
    pub fn role_state(&self) -> &RoleState {
        &self.role
    }

    /// Peers the node currently knows about
    pub fn registry(&self) -> &Registry<N> {
        &self.registry
    }

    /// Provides access to the ranging library
    pub fn ranging(&mut self) -> &mut R {
        &mut self.ranging
    }

    /// Provides access to the link
    pub fn link(&mut self) -> &mut L {
        &mut self.link
    }

    /// Gives back the collaborators
    pub fn free(self) -> (R, L, C, D) {
        (self.ranging, self.link, self.clock, self.delay)
    }
}


/// Starts the ranging library in `role`, then waits for it to settle
///
/// Ranging errors are logged. The role is considered set either way.
fn start_role<R, D>(ranging: &mut R, delay: &mut D, config: &Config, role: Role)
    where
        R: Ranging,
        D: DelayMs<u32>,
{
    let mode = config.radio_mode;
    info!(
        "Setting role to: {} ({:?}: {} kbps, {} MHz PRF, {} symbol preamble)",
        role, mode, mode.bitrate_kbps(), mode.prf_mhz(), mode.preamble_symbols(),
    );

    let result = match role {
        Role::Anchor => ranging.start_as_anchor(config.device_address, config.radio_mode),
        Role::Tag => ranging.start_as_tag(config.device_address, config.radio_mode),
    };
    if let Err(error) = result {
        warn!("Ranging library failed to start as {}: {:?}", role, error);
    }

    delay.delay_ms(config.role_settle.as_millis());
    info!("Role set successfully");
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::RadioMode,
        mock::{Event, MockClock, MockDelay, MockLink, MockRanging},
    };

    type TestNode = Node<MockRanging, MockLink, MockClock, MockDelay>;

    fn node_with(config: Config, link: MockLink) -> (TestNode, MockClock) {
        let clock = MockClock::new();
        let delay = MockDelay::new(&clock);
        let node = Node::new(config, MockRanging::new(), link, clock.clone(), delay).unwrap();
        (node, clock)
    }

    /// A node whose setup took no time, so the loop starts at t=0
    fn node() -> (TestNode, MockClock) {
        let config = Config {
            role_settle: crate::time::Duration(0),
            ..Config::default()
        };
        node_with(config, MockLink::connected())
    }

    fn role_changes(link: &MockLink) -> std::vec::Vec<&str> {
        link.payloads()
            .into_iter()
            .filter(|p| p.contains(r#""role""#) && !p.contains("range_data"))
            .collect()
    }

    #[test]
    fn setup_starts_initial_role() {
        let (mut node, clock) = node_with(Config::default(), MockLink::connected());

        assert!(node.ranging().initialized);
        assert_eq!(
            node.ranging().started,
            [(Role::Anchor, RadioMode::LongDataRangeLowPower)],
        );
        assert_eq!(node.role(), Role::Anchor);
        // Settle delay
        assert_eq!(clock.millis(), 100);
        // Both role timers are seeded with the end of setup.
        assert_eq!(node.role_state().last_switch(Role::Anchor), Instant(100));
        assert_eq!(node.role_state().last_switch(Role::Tag), Instant(100));
    }

    #[test]
    fn setup_connects_link() {
        let mut link = MockLink::disconnected();
        link.connect_after = Some(2);

        let (mut node, clock) = node_with(Config::default(), link);

        assert!(node.link().connected);
        assert_eq!(clock.millis(), 2 * 500 + 100);
    }

    #[test]
    fn role_switch_scenario() {
        let (mut node, clock) = node();

        clock.set(4_999);
        node.poll();
        assert_eq!(node.role(), Role::Anchor);

        clock.set(5_001);
        node.poll();
        assert_eq!(node.role(), Role::Tag);
        assert_eq!(node.ranging().started.last(), Some(&(Role::Tag, RadioMode::default())));

        let changes = role_changes(&node.link);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].contains(r#""role":"TAG","timestamp":5001"#));

        clock.set(5_001 + 15_000 - 1);
        node.poll();
        assert_eq!(node.role(), Role::Tag);

        clock.set(5_001 + 15_001);
        node.poll();
        assert_eq!(node.role(), Role::Anchor);

        let changes = role_changes(&node.link);
        assert_eq!(changes.len(), 2);
        assert!(changes[1].contains(r#""role":"ANCHOR""#));
    }

    #[test]
    fn back_in_anchor_waits_full_anchor_interval() {
        let (mut node, clock) = node();

        clock.set(5_000);
        assert_eq!(node.check_role(Instant(5_000)), Some(Role::Tag));
        clock.set(20_000);
        assert_eq!(node.check_role(Instant(20_000)), Some(Role::Anchor));

        assert_eq!(node.check_role(Instant(24_999)), None);
        assert_eq!(node.check_role(Instant(25_000)), Some(Role::Tag));
    }

    #[test]
    fn role_switch_blocks_for_settle_delay() {
        let (mut node, clock) = node_with(Config::default(), MockLink::connected());
        let start = clock.millis();

        clock.set(start + 5_000);
        node.poll();

        assert_eq!(node.role(), Role::Tag);
        assert_eq!(clock.millis(), start + 5_100);
        // The announcement is stamped after the settle delay.
        let changes = role_changes(&node.link);
        assert!(changes[0].contains(&std::format!(r#""timestamp":{}"#, start + 5_100)));
    }

    #[test]
    fn failing_ranging_library_still_switches() {
        let (mut node, clock) = node();
        node.ranging().fail_start = true;

        clock.set(5_000);
        node.poll();

        assert_eq!(node.role(), Role::Tag);
        assert_eq!(role_changes(&node.link).len(), 1);
    }

    #[test]
    fn periodic_time_sync() {
        let (mut node, clock) = node();

        for t in (0..=10_000).step_by(100) {
            clock.set(t);
            node.poll();
        }

        let syncs = node.link.payloads()
            .into_iter()
            .filter(|p| p.contains(r#""action":"sync_time""#))
            .count();
        assert_eq!(syncs, 2);
    }

    #[test]
    fn each_range_produces_one_snapshot() {
        let (mut node, clock) = node();
        clock.set(10);

        node.ranging().push(Event::NewDevice(0x1A2B));
        node.ranging().push(Event::Range(0x1A2B, 1.23, -75.0));
        node.ranging().push(Event::Range(0x1A2B, 1.30, -74.0));
        node.ranging().push(Event::Range(0x0042, 7.5, -90.0));
        node.poll();

        let snapshots: std::vec::Vec<_> = node.link.payloads()
            .into_iter()
            .filter(|p| p.contains("range_data"))
            .collect();
        assert_eq!(snapshots.len(), 3);
        assert!(snapshots[2].contains(r#"{"address":6699,"range":1.3,"rx_power":-74.0}"#));
        assert!(snapshots[2].contains(r#"{"address":66,"range":7.5,"rx_power":-90.0}"#));

        assert_eq!(node.registry().len(), 2);
        assert_eq!(node.registry().get(crate::mac::ShortAddress(0x1A2B)).unwrap().range, 1.30);

        node.ranging().push(Event::Inactive(0x1A2B));
        node.ranging().push(Event::Inactive(0x1A2B));
        node.poll();
        assert_eq!(node.registry().len(), 1);
    }

    #[test]
    fn snapshot_reports_current_role() {
        let (mut node, clock) = node();

        clock.set(5_000);
        node.ranging().push(Event::Range(1, 1.0, -80.0));
        node.poll();

        let payloads = node.link.payloads();
        let snapshot = payloads.iter().find(|p| p.contains("range_data")).unwrap();
        assert!(snapshot.contains(r#""role":"TAG""#));
    }

    #[test]
    fn lost_link_is_recovered_in_loop() {
        let (mut node, clock) = node();

        node.link().connected = false;
        node.link().connect_after = Some(1);
        clock.set(50);
        node.poll();

        assert!(node.link().connected);
        // Once during setup, once to recover
        assert_eq!(node.link().begin_calls, 2);
        assert_eq!(clock.millis(), 50 + 500);
    }

    #[test]
    fn no_sends_while_link_stays_down() {
        let config = Config {
            role_settle: crate::time::Duration(0),
            connect_attempts: 1,
            ..Config::default()
        };
        let (mut node, clock) = node_with(config, MockLink::disconnected());

        clock.set(6_000);
        node.ranging().push(Event::Range(3, 2.0, -85.0));
        node.poll();

        // Everything was dropped, but the node kept going.
        assert_eq!(node.role(), Role::Tag);
        assert_eq!(node.registry().len(), 1);
        assert!(node.link.sent.is_empty());
        assert_eq!(node.ranging().polls, 1);

        // Coming back up doesn't replay anything.
        node.link().connected = true;
        node.poll();
        assert!(node.link.sent.is_empty());
    }

    #[test]
    fn unusable_device_address_fails_setup() {
        let config = Config {
            device_address: "7D:00:22:EA:82:60:3B:9C:7D:00:22:EA",
            ..Config::default()
        };
        let clock = MockClock::new();
        let delay = MockDelay::new(&clock);
        let link = MockLink::connected();

        let result: Result<TestNode, _> =
            Node::new(config, MockRanging::new(), link, clock.clone(), delay);

        assert!(matches!(result, Err(InvalidConfig::DeviceAddressTooLong { len: 35 })));
        assert_eq!(clock.millis(), 0);
    }

    #[test]
    fn larger_registry_with_matching_buffer() {
        const PEERS: usize = 40;
        type BigNode = Node<
            MockRanging, MockLink, MockClock, MockDelay,
            PEERS, { telemetry::snapshot_capacity(PEERS) },
        >;

        let clock = MockClock::new();
        let delay = MockDelay::new(&clock);
        let config = Config {
            role_settle: crate::time::Duration(0),
            ..Config::default()
        };
        let mut node: BigNode =
            Node::new(config, MockRanging::new(), MockLink::connected(), clock.clone(), delay)
                .unwrap();

        for address in 0..PEERS as u16 {
            node.ranging().push(Event::Range(0xF000 + address, 12.345679, -81.234566));
        }
        clock.set(4_000_000_000);
        node.poll();

        assert_eq!(node.registry().len(), PEERS);
        let payloads = node.link.payloads();
        let last = payloads.iter().rev().find(|p| p.contains("range_data")).unwrap();
        assert_eq!(last.matches(r#"{"address":"#).count(), PEERS);
    }
}
