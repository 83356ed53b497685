//! Glue between the ranging library's events and the device registry
//!
//! An [`EventBridge`] only lives for the duration of one
//! [`Ranging::poll`](crate::ranging::Ranging::poll) call. It borrows what it
//! needs from the node: the registry, the publisher, the link and the clock.
//! It has no access to the role state machine or the loop timers.

use log::{debug, info, warn};

use crate::{
    link::Link,
    mac::ShortAddress,
    ranging::RangingEvents,
    registry::{DeviceRecord, Registry},
    role::Role,
    telemetry::{self, Publisher, PAYLOAD_CAPACITY},
    time::Clock,
};


/// Applies ranging events to the registry and publishes the result
pub struct EventBridge<'r, L, C, const N: usize, const CAP: usize = PAYLOAD_CAPACITY> {
    /// Peers known to the node
    pub registry: &'r mut Registry<N>,

    /// Sends the range snapshots
    pub publisher: &'r mut Publisher<CAP>,

    /// Link the snapshots are sent through
    pub link: &'r mut L,

    /// Provides the snapshot timestamps
    pub clock: &'r mut C,

    /// The node's role, as reported in snapshots
    pub role: Role,

    /// Number of snapshot send attempts made through this bridge
    pub snapshots: usize,
}

impl<'r, L, C, const N: usize, const CAP: usize> EventBridge<'r, L, C, N, CAP>
    where
        L: Link,
        C: Clock,
{
    fn publish_snapshot(&mut self) {
        self.snapshots += 1;

        let now = self.clock.now();
        let result = self.publisher.range_snapshot(
            &mut *self.link,
            self.role,
            self.registry.devices(),
            now,
        );
        telemetry::log_result("range data", &result);
    }
}

impl<'r, L, C, const N: usize, const CAP: usize> RangingEvents
    for EventBridge<'r, L, C, N, CAP>
    where
        L: Link,
        C: Clock,
{
    fn on_new_range(&mut self, address: ShortAddress, range: f32, rx_power: f32) {
        let record = DeviceRecord {
            short_address: address,
            range,
            rx_power,
        };

        // A full registry is reported once per peer, in `on_new_device`.
        if let Err(error) = self.registry.upsert(record) {
            debug!("Ignoring device {:04X}: {}", address.0, error);
        }

        info!(
            "Device: {:04X}, Range: {} m, RX power: {} dBm",
            address.0, range, rx_power,
        );

        // One snapshot per range sample, even if the registry didn't change.
        self.publish_snapshot();
    }

    fn on_new_device(&mut self, address: ShortAddress) {
        info!("New device added: {:04X}", address.0);

        if self.registry.is_full() && self.registry.get(address).is_none() {
            warn!(
                "Device registry full ({} peers), not tracking {:04X}",
                self.registry.capacity(), address.0,
            );
        }
    }

    fn on_device_inactive(&mut self, address: ShortAddress) {
        info!("Device inactive: {:04X}", address.0);
        self.registry.remove(address);
    }
}
