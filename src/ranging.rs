//! Interface to the ranging library
//!
//! Two-way ranging itself (frame timing, distance computation, radio
//! registers) is not implemented here. The node drives an external ranging
//! library through the [`Ranging`] trait, and the library reports its results
//! back through [`RangingEvents`].
//!
//! There is no callback registration. Instead, whoever implements
//! [`RangingEvents`] is handed to [`Ranging::poll`], and the library calls it
//! synchronously from within that method, for as many events as it produced.

use core::fmt;

use crate::{config::RadioMode, mac::ShortAddress};


/// Implemented by the ranging library
pub trait Ranging {
    /// Error reported by the ranging library
    type Error: fmt::Debug;

    /// Brings up the radio
    ///
    /// Called once, before any role is started.
    fn init(&mut self) -> Result<(), Self::Error>;

    /// (Re)starts ranging as an anchor
    ///
    /// `address` is the node's identifier, as configured.
    fn start_as_anchor(&mut self, address: &str, mode: RadioMode) -> Result<(), Self::Error>;

    /// (Re)starts ranging as a tag
    fn start_as_tag(&mut self, address: &str, mode: RadioMode) -> Result<(), Self::Error>;

    /// Runs one step of the library's own state machine
    ///
    /// Must not block for long. Any events that occur during this step are
    /// reported to `events` before the method returns.
    fn poll<E>(&mut self, events: &mut E) -> Result<(), Self::Error>
        where E: RangingEvents;
}


/// Receives the results of the ranging library
///
/// Invoked by [`Ranging::poll`]. All methods run on the polling loop's
/// thread, so implementations don't need any synchronization, but they must
/// not re-enter the polling loop.
pub trait RangingEvents {
    /// A new range measurement to `address` is available
    ///
    /// `range` is in meters, `rx_power` in dBm.
    fn on_new_range(&mut self, address: ShortAddress, range: f32, rx_power: f32);

    /// A peer was heard for the first time
    fn on_new_device(&mut self, address: ShortAddress);

    /// A peer hasn't been heard from for a while and was dropped by the
    /// library
    fn on_device_inactive(&mut self, address: ShortAddress);
}
