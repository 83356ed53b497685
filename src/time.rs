//! Time-related types based on the node's millisecond tick
//!
//! Microcontroller millisecond counters are 32 bits wide and wrap around after
//! roughly 49.7 days. The types in this module keep that representation, so
//! all interval arithmetic has to take the overflow into account.


use core::ops::Add;

use serde::{
    Deserialize,
    Serialize,
};


/// The maximum value of the millisecond tick
pub const TICK_MAX: u32 = u32::MAX;


/// Source of the current time
///
/// Implemented by whatever provides the millisecond tick on the target
/// platform. On a workstation, see `host::SystemClock`.
pub trait Clock {
    /// Returns the current instant
    fn now(&mut self) -> Instant;
}


/// Represents an instant in time
///
/// Milliseconds since the node started. Serialized as a plain integer, which
/// is what goes into the `timestamp` field of outgoing messages.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
#[repr(C)]
pub struct Instant(pub u32);

impl Instant {
    /// Returns the raw millisecond value
    pub fn millis(&self) -> u32 {
        self.0
    }

    /// Returns the amount of time passed between the two `Instant`s
    ///
    /// Assumes that `&self` represents a later time than the argument
    /// `earlier`. The tick can overflow, so comparing the numerical values
    /// doesn't tell anything about order.
    ///
    /// # Example
    ///
    /// ``` rust
    /// use uwb_relay::time::{Duration, Instant, TICK_MAX};
    ///
    /// let instant_1 = Instant(TICK_MAX - 50);
    /// let instant_2 = Instant(TICK_MAX);
    /// let instant_3 = Instant(49);
    ///
    /// assert_eq!(instant_2.duration_since(instant_1), Duration(50));
    ///
    /// // Still works as expected, if the later timestamp is the numerically
    /// // smaller value.
    /// assert_eq!(instant_3.duration_since(instant_2), Duration(50));
    /// ```
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        Duration(self.0.wrapping_sub(earlier.0))
    }
}

/// A duration between two instants, in milliseconds
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
#[repr(C)]
pub struct Duration(pub u32);

impl Duration {
    /// Creates a duration from a number of milliseconds
    pub const fn from_millis(millis: u32) -> Self {
        Duration(millis)
    }

    /// Returns the duration in milliseconds
    pub fn as_millis(&self) -> u32 {
        self.0
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Self::Output {
        Instant(self.0.wrapping_add(rhs.0))
    }
}


/// A periodic timer driven by the polling loop
///
/// Does not run on its own. Every loop iteration asks [`Ticker::poll`]
/// whether the period has elapsed since the last time it fired.
#[derive(Clone, Copy, Debug)]
pub struct Ticker {
    period: Duration,
    last: Instant,
}

impl Ticker {
    /// Creates a ticker whose first period starts at `start`
    pub fn new(period: Duration, start: Instant) -> Self {
        Ticker { period, last: start }
    }

    /// Returns `true` and restarts the period, if it has elapsed at `now`
    pub fn poll(&mut self, now: Instant) -> bool {
        if now.duration_since(self.last) >= self.period {
            self.last = now;
            true
        }
        else {
            false
        }
    }

    /// The instant the ticker last fired, or was started
    pub fn last(&self) -> Instant {
        self.last
    }
}
