//! Role-switching UWB ranging node
//!
//! A node alternates between the anchor and tag ranging roles on a fixed
//! schedule, keeps a table of the peers it ranges with, and reports role
//! changes, time-sync pings and range snapshots as JSON datagrams to a
//! monitoring host.
//!
//! The crate doesn't talk to hardware directly. Everything platform-specific
//! comes in through traits:
//!
//! - [`Ranging`]: the ranging library driving the UWB radio
//! - [`Link`]: the network interface telemetry goes out through
//! - [`Clock`]: the millisecond tick
//! - [`DelayMs`](embedded_hal::blocking::delay::DelayMs): blocking waits
//!
//! The entry point is [`Node`]. Construct it with a [`Config`], then call
//! [`Node::run`], or [`Node::poll`] from a loop of your own.
//!
//! The `std` feature adds adapters for running a node on a workstation, see
//! the `host` module.


#![cfg_attr(not(any(test, feature = "std")), no_std)]

#![deny(missing_docs)]
#![deny(warnings)]


pub mod bridge;
pub mod config;
pub mod link;
pub mod monitor;
pub mod node;
pub mod ranging;
pub mod registry;
pub mod role;
pub mod telemetry;
pub mod time;

#[cfg(feature = "std")]
pub mod host;

#[cfg(test)]
mod mock;


pub use ieee802154::mac;

pub use crate::{
    config::{Config, InvalidConfig, RadioMode},
    link::Link,
    node::Node,
    ranging::{Ranging, RangingEvents},
    registry::{DeviceRecord, Registry},
    role::Role,
    time::{Clock, Duration, Instant},
};
